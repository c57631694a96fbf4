use super::create_artifact;
use crate::cluster::{Cluster, ClusterForest};
use crate::error::Result;
use crate::persistence::Rename;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

fn label(cluster: &Cluster) -> String {
    cluster
        .display_id
        .clone()
        .unwrap_or_else(|| cluster.sequence_id.to_string())
}

/// `sample_id / cluster_distance / cluster_id`, one row per sample and level.
///
/// Samples left unclustered at the first level get a single `NA` row, so the
/// table lists every input. The output is readable as a previous-run table.
pub fn write_membership_table(path: &Path, forest: &ClusterForest) -> Result<()> {
    let mut rows: BTreeMap<&str, Vec<(u32, String)>> = BTreeMap::new();
    for sample in &forest.root.samples {
        rows.insert(sample, Vec::new());
    }
    for cluster in forest.clusters() {
        let Some(threshold) = cluster.threshold.distance() else {
            continue;
        };
        for sample in &cluster.samples {
            rows.entry(sample)
                .or_default()
                .push((threshold, label(cluster)));
        }
    }

    let mut writer = create_artifact(path)?;
    writeln!(writer, "sample_id\tcluster_distance\tcluster_id")?;
    for (sample, mut memberships) in rows {
        if memberships.is_empty() {
            writeln!(writer, "{}\tNA\tNA", sample)?;
            continue;
        }
        memberships.sort_by(|a, b| b.0.cmp(&a.0));
        for (threshold, id) in memberships {
            writeln!(writer, "{}\t{}\t{}", sample, threshold, id)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// `cluster_id / cluster_distance / sample_count / parent_id / samples`, with
/// members comma-joined.
pub fn write_cluster_table(path: &Path, forest: &ClusterForest) -> Result<()> {
    let mut writer = create_artifact(path)?;
    writeln!(writer, "cluster_id\tcluster_distance\tsample_count\tparent_id\tsamples")?;
    for cluster in forest.clusters() {
        let parent = cluster
            .parent
            .and_then(|p| forest.display_id(p))
            .map(str::to_string)
            .or_else(|| cluster.parent.map(|p| p.to_string()))
            .unwrap_or_default();
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            label(cluster),
            cluster.threshold,
            cluster.len(),
            parent,
            cluster.samples.join(",")
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_renames(path: &Path, renames: &[Rename]) -> Result<()> {
    let mut writer = create_artifact(path)?;
    writeln!(writer, "old_id\tnew_id\tcluster_distance\treason")?;
    for rename in renames {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            rename.old_id, rename.new_id, rename.threshold, rename.reason
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_unclustered(path: &Path, samples: &[String]) -> Result<()> {
    let mut writer = create_artifact(path)?;
    for sample in samples {
        writeln!(writer, "{}", sample)?;
    }
    writer.flush()?;
    Ok(())
}
