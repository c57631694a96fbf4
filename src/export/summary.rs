use super::create_artifact;
use crate::cluster::ClusterForest;
use crate::error::Result;
use crate::persistence::{AuditOutcome, PreviousClusterAudit, Reconciliation, Rename};
use crate::types::IntegerWidth;
use chrono::{DateTime, Utc};
use serde::ser::Serializer;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Machine-readable record of one clustering run, written as `run_summary.json`.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub tool_version: String,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime<Utc>,
    pub tree: TreeInput,
    pub integer_width: IntegerWidth,
    pub thresholds: Vec<u32>,
    pub sample_count: usize,
    pub unclustered: usize,
    pub saturated_cells: u64,
    pub levels: Vec<LevelSummary>,
    pub clusters: Vec<ClusterSummary>,
    pub reconciliation: ReconciliationSummary,
}

#[derive(Debug, Serialize)]
pub struct TreeInput {
    pub path: PathBuf,
    pub sha256: String,
}

#[derive(Debug, Serialize)]
pub struct LevelSummary {
    pub threshold: u32,
    pub clusters: usize,
    /// Samples evaluated at this level.
    pub evaluated: usize,
    /// Samples that ended up in a cluster at this level.
    pub clustered: usize,
}

#[derive(Debug, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: String,
    pub threshold: u32,
    pub parent_id: Option<String>,
    pub sample_count: usize,
    /// SHA-256 of the sorted member names joined by newlines.
    pub membership_sha256: String,
}

#[derive(Debug, Serialize)]
pub struct ReconciliationSummary {
    pub inherited: usize,
    pub fresh: usize,
    pub matched: usize,
    pub orphaned_but_present: usize,
    pub near_decimated: usize,
    pub decimated: usize,
    pub renames: Vec<Rename>,
    pub ambiguous: Vec<PreviousClusterAudit>,
    pub retired: Vec<String>,
}

fn serialize_datetime<S>(date: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&date.to_rfc3339())
}

/// Hex SHA-256 of a file's raw bytes.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn membership_digest(samples: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(samples.join("\n").as_bytes());
    format!("{:x}", hasher.finalize())
}

impl RunSummary {
    pub fn new(
        tree: TreeInput,
        width: IntegerWidth,
        saturated_cells: u64,
        forest: &ClusterForest,
        reconciliation: &Reconciliation,
        retired: &[String],
    ) -> Self {
        let levels = forest
            .levels
            .iter()
            .map(|threshold| {
                let clusters = forest.clusters_at(threshold);
                LevelSummary {
                    threshold,
                    clusters: clusters.len(),
                    evaluated: forest.universe_at(threshold).map_or(0, |u| u.len()),
                    clustered: clusters.iter().map(|c| c.len()).sum(),
                }
            })
            .collect();

        let clusters = forest
            .clusters()
            .into_iter()
            .filter_map(|c| {
                Some(ClusterSummary {
                    cluster_id: c.display_id.clone()?,
                    threshold: c.threshold.distance()?,
                    parent_id: c.parent.and_then(|p| forest.display_id(p)).map(str::to_string),
                    sample_count: c.len(),
                    membership_sha256: membership_digest(&c.samples),
                })
            })
            .collect();

        let reconciliation = ReconciliationSummary {
            inherited: reconciliation.inherited,
            fresh: reconciliation.fresh,
            matched: reconciliation.count(AuditOutcome::Matched),
            orphaned_but_present: reconciliation.count(AuditOutcome::OrphanedButPresent),
            near_decimated: reconciliation.count(AuditOutcome::NearDecimated),
            decimated: reconciliation.count(AuditOutcome::Decimated),
            renames: reconciliation.renames.clone(),
            ambiguous: reconciliation.ambiguous().cloned().collect(),
            retired: retired.to_vec(),
        };

        Self {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            tree,
            integer_width: width,
            thresholds: forest.levels.as_slice().to_vec(),
            sample_count: forest.root.len(),
            unclustered: forest.unclustered.len(),
            saturated_cells,
            levels,
            clusters,
            reconciliation,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = create_artifact(path)?;
        serde_json::to_writer_pretty(&mut writer, self).map_err(io::Error::from)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
