use super::{distance, DistanceMatrix};
use crate::context::RunContext;
use crate::error::{ClusterError, Result};
use crate::tree::PhyloTree;
use log::debug;

/// Output of one matrix build.
#[derive(Debug)]
pub struct MatrixBuild {
    pub matrix: DistanceMatrix,
    /// Index pairs `(i, j)`, `i < j`, with distance ≤ threshold, in row-major
    /// discovery order.
    pub neighbors: Vec<(usize, usize)>,
    /// Indices of samples with no other sample within the threshold.
    pub unclustered: Vec<usize>,
}

impl MatrixBuild {
    pub fn neighbor_names(&self) -> Vec<(&str, &str)> {
        let samples = self.matrix.samples();
        self.neighbors
            .iter()
            .map(|&(i, j)| (samples[i].as_str(), samples[j].as_str()))
            .collect()
    }

    pub fn unclustered_names(&self) -> Vec<String> {
        let samples = self.matrix.samples();
        self.unclustered.iter().map(|&i| samples[i].clone()).collect()
    }
}

/// Build the distance matrix for `samples` using one oracle call per pair.
///
/// Only the upper triangle is computed and each value is mirrored. With a
/// `threshold`, neighbor pairs and unclustered samples are collected as the
/// rows are filled; with `None` only the matrix is produced.
pub fn build_matrix<T: PhyloTree + ?Sized>(
    tree: &T,
    samples: &[String],
    threshold: Option<u32>,
    ctx: &mut RunContext,
) -> Result<MatrixBuild> {
    let mut sorted = samples.to_vec();
    sorted.sort();
    if let Some(dup) = sorted.windows(2).find(|w| w[0] == w[1]) {
        return Err(ClusterError::DuplicateSample {
            sample: dup[0].clone(),
            context: "distance matrix input".to_string(),
        });
    }

    let width = ctx.width();
    let max = width.max_value();
    let n = sorted.len();
    let mut matrix = DistanceMatrix::zeroed(sorted, width);
    let mut neighbors = Vec::new();
    let mut unclustered = Vec::new();

    let progress = ctx.row_progress(
        n,
        match threshold {
            Some(t) => format!("Building {}x{} matrix at threshold {}", n, n, t),
            None => format!("Building {}x{} matrix", n, n),
        },
    );

    for i in 0..n {
        let mut found_neighbor = false;
        for j in (i + 1)..n {
            let raw = distance(tree, &matrix.samples()[i], &matrix.samples()[j])?;
            let value = if raw > max as u64 {
                ctx.note_saturation(raw);
                max
            } else {
                raw as u32
            };
            matrix.set_symmetric(i, j, value);

            if let Some(t) = threshold {
                if value <= t {
                    neighbors.push((i, j));
                    found_neighbor = true;
                }
            }
        }

        // A sample can belong to a group found from an earlier row while
        // recording nothing in its own shrinking row, so look at the full row
        // (mirrored entries included) before calling it unclustered.
        if let Some(t) = threshold {
            if !found_neighbor {
                let nearest = (0..n).filter(|&j| j != i).map(|j| matrix.get(i, j)).min();
                match nearest {
                    Some(d) if d <= t => {}
                    _ => unclustered.push(i),
                }
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    debug!(
        "Matrix over {} samples: {} neighbor pairs, {} unclustered",
        n,
        neighbors.len(),
        unclustered.len()
    );

    Ok(MatrixBuild {
        matrix,
        neighbors,
        unclustered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ArenaTree;
    use crate::types::IntegerWidth;

    // Star tree: every leaf hangs off the root with the given branch length.
    fn star(leaves: &[(&str, f64)]) -> ArenaTree {
        let mut names = vec![String::new()];
        let mut parents = vec![None];
        let mut lengths = vec![0.0];
        for (name, len) in leaves {
            names.push(name.to_string());
            parents.push(Some(0));
            lengths.push(*len);
        }
        ArenaTree::from_parts(names, parents, lengths).unwrap()
    }

    // ((A:1,B:1):4,(C:2,D:3):1,E:40,F:200)
    fn layered() -> ArenaTree {
        ArenaTree::from_parts(
            vec![
                "".into(),
                "ab".into(),
                "A".into(),
                "B".into(),
                "cd".into(),
                "C".into(),
                "D".into(),
                "E".into(),
                "F".into(),
            ],
            vec![
                None,
                Some(0),
                Some(1),
                Some(1),
                Some(0),
                Some(4),
                Some(4),
                Some(0),
                Some(0),
            ],
            vec![0.0, 4.0, 1.0, 1.0, 1.0, 2.0, 3.0, 40.0, 200.0],
        )
        .unwrap()
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn symmetric_with_zero_diagonal() {
        let tree = layered();
        let mut ctx = RunContext::new(IntegerWidth::U16);
        let build = build_matrix(&tree, &names(&["F", "A", "E", "C", "B", "D"]), Some(10), &mut ctx)
            .unwrap();
        let m = &build.matrix;
        assert_eq!(m.samples(), &names(&["A", "B", "C", "D", "E", "F"])[..]);
        for i in 0..m.len() {
            assert_eq!(m.get(i, i), 0);
            for j in 0..m.len() {
                assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
    }

    #[test]
    fn triangular_fill_matches_naive_computation() {
        let tree = layered();
        let samples = names(&["A", "B", "C", "D", "E", "F"]);
        let mut ctx = RunContext::new(IntegerWidth::U32);
        let build = build_matrix(&tree, &samples, None, &mut ctx).unwrap();
        for (i, a) in samples.iter().enumerate() {
            for (j, b) in samples.iter().enumerate() {
                let naive = distance(&tree, a, b).unwrap() as u32;
                assert_eq!(build.matrix.get(i, j), naive, "{} vs {}", a, b);
            }
        }
        assert!(build.neighbors.is_empty());
        assert!(build.unclustered.is_empty());
    }

    #[test]
    fn neighbors_in_row_major_order() {
        let tree = layered();
        let mut ctx = RunContext::new(IntegerWidth::U8);
        let build = build_matrix(&tree, &names(&["A", "B", "C", "D", "E", "F"]), Some(10), &mut ctx)
            .unwrap();
        // A-B 2, A-C 8, A-D 9, B-C 8, B-D 9, C-D 5
        assert_eq!(
            build.neighbor_names(),
            vec![
                ("A", "B"),
                ("A", "C"),
                ("A", "D"),
                ("B", "C"),
                ("B", "D"),
                ("C", "D"),
            ]
        );
        assert_eq!(build.unclustered_names(), names(&["E", "F"]));
    }

    #[test]
    fn late_rows_use_mirrored_values() {
        // D only pairs with A, which is found in row A; row D itself is empty.
        let tree = star(&[("A", 1.0), ("B", 30.0), ("C", 30.0), ("D", 2.0)]);
        let mut ctx = RunContext::new(IntegerWidth::U8);
        let build = build_matrix(&tree, &names(&["A", "B", "C", "D"]), Some(5), &mut ctx).unwrap();
        assert_eq!(build.neighbor_names(), vec![("A", "D")]);
        assert_eq!(build.unclustered_names(), names(&["B", "C"]));
    }

    #[test]
    fn saturates_at_width_maximum() {
        let tree = layered();
        let mut ctx = RunContext::new(IntegerWidth::U8);
        let build = build_matrix(&tree, &names(&["A", "F"]), None, &mut ctx).unwrap();
        // 1 + 4 + 200 = 205 still fits in u8
        assert_eq!(build.matrix.get(0, 1), 205);

        let wide = star(&[("X", 60_000.0), ("Y", 70_000.0)]);
        let build = build_matrix(&wide, &names(&["X", "Y"]), None, &mut ctx).unwrap();
        assert_eq!(build.matrix.get(0, 1), 255);
        assert_eq!(ctx.saturated_cells(), 1);

        let mut ctx16 = RunContext::new(IntegerWidth::U16);
        let build = build_matrix(&wide, &names(&["X", "Y"]), None, &mut ctx16).unwrap();
        assert_eq!(build.matrix.get(0, 1), 65_535);
        let mut ctx32 = RunContext::new(IntegerWidth::U32);
        let build = build_matrix(&wide, &names(&["X", "Y"]), None, &mut ctx32).unwrap();
        assert_eq!(build.matrix.get(0, 1), 130_000);
        assert_eq!(ctx32.saturated_cells(), 0);
    }

    #[test]
    fn duplicate_input_is_fatal() {
        let tree = layered();
        let mut ctx = RunContext::new(IntegerWidth::U8);
        let err = build_matrix(&tree, &names(&["A", "B", "A"]), Some(5), &mut ctx).unwrap_err();
        assert!(matches!(err, ClusterError::DuplicateSample { sample, .. } if sample == "A"));
    }

    #[test]
    fn unknown_sample_is_fatal() {
        let tree = layered();
        let mut ctx = RunContext::new(IntegerWidth::U8);
        let err = build_matrix(&tree, &names(&["A", "Z"]), Some(5), &mut ctx).unwrap_err();
        assert!(matches!(err, ClusterError::UnknownSample(s) if s == "Z"));
    }
}
