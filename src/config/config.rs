use crate::types::{IntegerWidth, ThresholdLevels};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Defaults for the `cluster` and `matrix` commands. Command-line flags
/// override anything set here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Strictly decreasing clustering thresholds.
    pub thresholds: Vec<u32>,
    pub integer_width: IntegerWidth,
    /// Recurse below the first threshold.
    pub subclusters: bool,
    /// Minimum tree size passed to the subtree extractor.
    pub min_subtree_size: usize,
    pub write_whole_tree_matrix: bool,
    /// Subtree extraction program; extraction is skipped when unset.
    pub extractor: Option<String>,
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thresholds: ThresholdLevels::default().as_slice().to_vec(),
            integer_width: IntegerWidth::default(),
            subclusters: true,
            min_subtree_size: 500,
            write_whole_tree_matrix: false,
            extractor: None,
            show_progress: true,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "phylocluster", "phylocluster-tools")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// The platform config file if it exists, otherwise the defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No config file found; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn levels(&self) -> Result<ThresholdLevels> {
        ThresholdLevels::new(self.thresholds.clone()).context("Invalid `thresholds` in config")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
