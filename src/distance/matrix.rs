use crate::types::IntegerWidth;
use std::io::{self, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cells {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

/// Square distance matrix over a sorted, duplicate-free sample list. Cells are
/// stored row-major in the configured integer width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMatrix {
    samples: Vec<String>,
    width: IntegerWidth,
    cells: Cells,
}

impl DistanceMatrix {
    pub(crate) fn zeroed(samples: Vec<String>, width: IntegerWidth) -> Self {
        let n = samples.len() * samples.len();
        let cells = match width {
            IntegerWidth::U8 => Cells::U8(vec![0; n]),
            IntegerWidth::U16 => Cells::U16(vec![0; n]),
            IntegerWidth::U32 => Cells::U32(vec![0; n]),
        };
        Self {
            samples,
            width,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn width(&self) -> IntegerWidth {
        self.width
    }

    pub fn index_of(&self, sample: &str) -> Option<usize> {
        self.samples
            .binary_search_by(|s| s.as_str().cmp(sample))
            .ok()
    }

    pub fn get(&self, i: usize, j: usize) -> u32 {
        let idx = i * self.samples.len() + j;
        match &self.cells {
            Cells::U8(v) => v[idx] as u32,
            Cells::U16(v) => v[idx] as u32,
            Cells::U32(v) => v[idx],
        }
    }

    /// Write one cell. `value` must already be clamped to the width maximum.
    pub(crate) fn set(&mut self, i: usize, j: usize, value: u32) {
        let idx = i * self.samples.len() + j;
        match &mut self.cells {
            Cells::U8(v) => v[idx] = value as u8,
            Cells::U16(v) => v[idx] = value as u16,
            Cells::U32(v) => v[idx] = value,
        }
    }

    /// Write both `[i][j]` and `[j][i]`.
    pub(crate) fn set_symmetric(&mut self, i: usize, j: usize, value: u32) {
        self.set(i, j, value);
        self.set(j, i, value);
    }

    pub fn row(&self, i: usize) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).map(move |j| self.get(i, j))
    }

    /// Tab-separated: a `sample` header followed by one row per sample.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write!(writer, "sample")?;
        for sample in &self.samples {
            write!(writer, "\t{}", sample)?;
        }
        writeln!(writer)?;

        for (i, sample) in self.samples.iter().enumerate() {
            write!(writer, "{}", sample)?;
            for value in self.row(i) {
                write!(writer, "\t{}", value)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsv_layout() {
        let mut m = DistanceMatrix::zeroed(vec!["a".into(), "b".into()], IntegerWidth::U16);
        m.set_symmetric(0, 1, 300);
        let mut out = Vec::new();
        m.write_tsv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "sample\ta\tb\na\t0\t300\nb\t300\t0\n"
        );
    }

    #[test]
    fn lookup_by_name() {
        let m = DistanceMatrix::zeroed(vec!["a".into(), "c".into(), "d".into()], IntegerWidth::U8);
        assert_eq!(m.index_of("c"), Some(1));
        assert_eq!(m.index_of("b"), None);
    }
}
