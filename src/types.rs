use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cell width used to store distance matrices. Distances above the width's
/// maximum are saturated to that maximum.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegerWidth {
    #[default]
    #[value(name = "u8")]
    U8,
    #[value(name = "u16")]
    U16,
    #[value(name = "u32")]
    U32,
}

impl IntegerWidth {
    pub fn max_value(&self) -> u32 {
        match self {
            IntegerWidth::U8 => u8::MAX as u32,
            IntegerWidth::U16 => u16::MAX as u32,
            IntegerWidth::U32 => u32::MAX,
        }
    }

    /// The smallest width saturates routinely on whole-tree matrices, so it
    /// does not warn about it.
    pub fn is_smallest(&self) -> bool {
        matches!(self, IntegerWidth::U8)
    }

    pub fn name(&self) -> &'static str {
        match self {
            IntegerWidth::U8 => "u8",
            IntegerWidth::U16 => "u16",
            IntegerWidth::U32 => "u32",
        }
    }
}

/// Distance cutoff a cluster was built at. `WholeTree` is the implicit root
/// cluster holding every input sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Threshold {
    WholeTree,
    Distance(u32),
}

impl Threshold {
    pub fn distance(&self) -> Option<u32> {
        match self {
            Threshold::WholeTree => None,
            Threshold::Distance(d) => Some(*d),
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::WholeTree => write!(f, "inf"),
            Threshold::Distance(d) => write!(f, "{}", d),
        }
    }
}

/// Ordered, strictly decreasing list of clustering thresholds, e.g. 20 → 10 → 5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdLevels {
    levels: Vec<u32>,
}

impl ThresholdLevels {
    pub fn new(levels: Vec<u32>) -> Result<Self> {
        if levels.is_empty() {
            return Err(ClusterError::InvalidLevels(
                "at least one threshold is required".to_string(),
            ));
        }
        if levels.windows(2).any(|w| w[0] <= w[1]) {
            return Err(ClusterError::InvalidLevels(format!(
                "thresholds must be strictly decreasing, got {:?}",
                levels
            )));
        }
        Ok(Self { levels })
    }

    /// Rejects levels whose largest cutoff cannot be told apart from a
    /// saturated cell at the given width.
    pub fn check_width(&self, width: IntegerWidth) -> Result<()> {
        let first = self.first();
        if first >= width.max_value() {
            return Err(ClusterError::InvalidLevels(format!(
                "threshold {} does not fit below the {} saturation value {}",
                first,
                width.name(),
                width.max_value()
            )));
        }
        Ok(())
    }

    pub fn first(&self) -> u32 {
        self.levels[0]
    }

    /// Level below `threshold`, or `None` at the terminal level.
    pub fn next(&self, threshold: Threshold) -> Option<u32> {
        match threshold {
            Threshold::WholeTree => Some(self.first()),
            Threshold::Distance(d) => {
                let pos = self.levels.iter().position(|&l| l == d)?;
                self.levels.get(pos + 1).copied()
            }
        }
    }

    pub fn is_terminal(&self, threshold: u32) -> bool {
        self.levels.last() == Some(&threshold)
    }

    pub fn contains(&self, threshold: u32) -> bool {
        self.levels.contains(&threshold)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels.iter().copied()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.levels
    }
}

impl Default for ThresholdLevels {
    fn default() -> Self {
        Self {
            levels: vec![20, 10, 5],
        }
    }
}
