//! Errors raised by the clustering core.
//!
//! Command-level code wraps these in `anyhow` with file context; the core
//! keeps them typed so callers can tell an invariant violation from I/O.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// A sample was requested that is not a leaf of the tree.
    #[error("Sample not found in tree: {0}")]
    UnknownSample(String),

    /// The same sample appeared twice where members must be unique.
    #[error("Duplicate sample '{sample}' in {context}")]
    DuplicateSample { sample: String, context: String },

    /// A non-root cluster was created with fewer than two members.
    #[error("Cluster {sequence_id} has {size} sample(s); clusters need at least 2")]
    ClusterTooSmall { sequence_id: u32, size: usize },

    /// An output file already exists. Artifacts are never overwritten.
    #[error("Refusing to overwrite existing artifact: {}", .0.display())]
    ArtifactExists(PathBuf),

    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    #[error("Invalid threshold levels: {0}")]
    InvalidLevels(String),

    /// A previous-run table could not be interpreted at all.
    #[error("Malformed cluster table: {0}")]
    MalformedTable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
