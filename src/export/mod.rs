//! Files written by a clustering run.
//!
//! Every artifact is created with `create_new`: a name that already exists on
//! disk means two outputs collided, and the run fails instead of overwriting.

pub mod summary;
mod tables;

pub use tables::{
    write_cluster_table, write_membership_table, write_renames, write_unclustered,
};

use crate::cluster::Cluster;
use crate::distance::DistanceMatrix;
use crate::error::{ClusterError, Result};
use log::debug;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Receives per-cluster artifacts as soon as each cluster is finalized.
pub trait ArtifactSink {
    fn write_cluster(&mut self, cluster: &Cluster, matrix: &DistanceMatrix) -> Result<()>;
    fn write_whole_tree(&mut self, matrix: &DistanceMatrix) -> Result<()>;
}

/// Create `path` for writing, failing if it already exists.
pub fn create_artifact(path: &Path) -> Result<BufWriter<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(BufWriter::new(file)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(ClusterError::ArtifactExists(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Writes matrices under `matrices/` and member lists under `samples/`.
pub struct DirectorySink {
    matrix_dir: PathBuf,
    sample_dir: PathBuf,
    sample_lists: BTreeMap<u32, PathBuf>,
}

impl DirectorySink {
    pub fn new(root: &Path) -> Result<Self> {
        let matrix_dir = root.join("matrices");
        let sample_dir = root.join("samples");
        fs::create_dir_all(&matrix_dir)?;
        fs::create_dir_all(&sample_dir)?;
        Ok(Self {
            matrix_dir,
            sample_dir,
            sample_lists: BTreeMap::new(),
        })
    }

    /// Newline-delimited member list written for cluster `sequence_id`.
    pub fn sample_list(&self, sequence_id: u32) -> Option<&Path> {
        self.sample_lists.get(&sequence_id).map(|p| p.as_path())
    }

    fn stem(cluster: &Cluster) -> String {
        format!("c{:05}_d{}", cluster.sequence_id, cluster.threshold)
    }
}

impl ArtifactSink for DirectorySink {
    fn write_cluster(&mut self, cluster: &Cluster, matrix: &DistanceMatrix) -> Result<()> {
        let stem = Self::stem(cluster);

        let matrix_path = self.matrix_dir.join(format!("{}_dmtrx.tsv", stem));
        let mut writer = create_artifact(&matrix_path)?;
        matrix.write_tsv(&mut writer)?;
        writer.flush()?;

        let list_path = self.sample_dir.join(format!("{}_samples.txt", stem));
        let mut writer = create_artifact(&list_path)?;
        for sample in &cluster.samples {
            writeln!(writer, "{}", sample)?;
        }
        writer.flush()?;

        debug!("Wrote artifacts for cluster {} ({})", cluster.sequence_id, stem);
        self.sample_lists.insert(cluster.sequence_id, list_path);
        Ok(())
    }

    fn write_whole_tree(&mut self, matrix: &DistanceMatrix) -> Result<()> {
        let path = self.matrix_dir.join("whole_tree_dmtrx.tsv");
        let mut writer = create_artifact(&path)?;
        matrix.write_tsv(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Counts artifacts without writing anything.
#[derive(Debug, Default)]
pub struct DiscardSink {
    pub clusters: usize,
    pub whole_tree: usize,
}

impl ArtifactSink for DiscardSink {
    fn write_cluster(&mut self, _cluster: &Cluster, _matrix: &DistanceMatrix) -> Result<()> {
        self.clusters += 1;
        Ok(())
    }

    fn write_whole_tree(&mut self, _matrix: &DistanceMatrix) -> Result<()> {
        self.whole_tree += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntegerWidth, Threshold};
    use tempfile::tempdir;

    #[test]
    fn existing_artifact_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("taken.tsv");
        fs::write(&path, "keep me").unwrap();

        let err = create_artifact(&path).unwrap_err();
        assert!(matches!(err, ClusterError::ArtifactExists(p) if p == path));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");
    }

    #[test]
    fn directory_sink_writes_matrix_and_sample_list() {
        let dir = tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path()).unwrap();
        let cluster = Cluster::new(
            7,
            Threshold::Distance(10),
            vec!["s2".to_string(), "s1".to_string()],
            Some(1),
        )
        .unwrap();
        let matrix = DistanceMatrix::zeroed(cluster.samples.clone(), IntegerWidth::U8);

        sink.write_cluster(&cluster, &matrix).unwrap();

        let list = sink.sample_list(7).unwrap();
        assert_eq!(fs::read_to_string(list).unwrap(), "s1\ns2\n");
        let matrix_text =
            fs::read_to_string(dir.path().join("matrices/c00007_d10_dmtrx.tsv")).unwrap();
        assert!(matrix_text.starts_with("sample\ts1\ts2\n"));

        // same cluster again collides
        assert!(matches!(
            sink.write_cluster(&cluster, &matrix),
            Err(ClusterError::ArtifactExists(_))
        ));
    }
}
