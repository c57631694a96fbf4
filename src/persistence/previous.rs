use crate::error::{ClusterError, Result};
use crate::utils::reader::open_input;
use anyhow::Context;
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::Path;

const SAMPLE_COLUMNS: &[&str] = &["sample_id", "sample"];
const DISTANCE_COLUMNS: &[&str] = &["cluster_distance", "distance", "threshold"];
const CLUSTER_COLUMNS: &[&str] = &["cluster_id", "cluster"];

/// Cluster memberships recorded by an earlier run, keyed by threshold and
/// then by cluster identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviousRun {
    pub clusters: BTreeMap<u32, BTreeMap<String, BTreeSet<String>>>,
}

impl PreviousRun {
    /// Previous clusters at `threshold`; empty when none were recorded.
    pub fn at(&self, threshold: u32) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.clusters.get(&threshold).into_iter().flatten()
    }

    pub fn thresholds(&self) -> impl Iterator<Item = u32> + '_ {
        self.clusters.keys().copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.clusters.values().flat_map(|level| level.keys())
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.values().map(|level| level.len()).sum()
    }
}

/// Read a previous membership table, compressed or not.
pub fn read_previous(path: &Path) -> anyhow::Result<PreviousRun> {
    let reader = open_input(path)?;
    let previous = parse_previous(reader)
        .with_context(|| format!("Failed to read previous clusters from {}", path.display()))?;
    info!(
        "Loaded {} previous cluster(s) from {}",
        previous.cluster_count(),
        path.display()
    );
    Ok(previous)
}

fn find_column(header: &[&str], names: &[&str]) -> Result<usize> {
    header
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
        .ok_or_else(|| ClusterError::MalformedTable(format!("missing column '{}'", names[0])))
}

/// Parse a tab-separated `sample_id / cluster_distance / cluster_id` table.
///
/// Only a missing header is fatal. Rows that cannot be used are skipped with
/// a warning; rows without a distance (`NA`, `-1`, empty) are unclustered
/// samples and are skipped silently.
pub fn parse_previous<R: BufRead>(reader: R) -> Result<PreviousRun> {
    let mut lines = reader.lines();
    let header_line = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => return Err(ClusterError::MalformedTable("empty table".to_string())),
        }
    };
    let header: Vec<&str> = header_line.split('\t').map(str::trim).collect();
    let sample_col = find_column(&header, SAMPLE_COLUMNS)?;
    let distance_col = find_column(&header, DISTANCE_COLUMNS)?;
    let cluster_col = find_column(&header, CLUSTER_COLUMNS)?;
    let width = sample_col.max(distance_col).max(cluster_col) + 1;

    let mut previous = PreviousRun::default();
    let mut seen: BTreeMap<u32, BTreeMap<String, String>> = BTreeMap::new();
    let mut id_threshold: BTreeMap<String, u32> = BTreeMap::new();

    for (idx, line) in lines.enumerate() {
        let line = line?;
        let line_no = idx + 2;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() < width {
            warn!("Skipping line {}: expected {} columns, found {}", line_no, width, fields.len());
            continue;
        }

        let distance = fields[distance_col];
        if matches!(distance, "" | "NA" | "-1") {
            continue;
        }
        let Ok(threshold) = distance.parse::<u32>() else {
            warn!("Skipping line {}: invalid cluster distance '{}'", line_no, distance);
            continue;
        };

        let sample = fields[sample_col];
        let cluster = fields[cluster_col];
        if sample.is_empty() || cluster.is_empty() || cluster == "NA" {
            warn!("Skipping line {}: missing sample or cluster id", line_no);
            continue;
        }

        match id_threshold.get(cluster) {
            Some(&t) if t != threshold => {
                warn!(
                    "Skipping line {}: cluster {} already recorded at threshold {}",
                    line_no, cluster, t
                );
                continue;
            }
            Some(_) => {}
            None => {
                id_threshold.insert(cluster.to_string(), threshold);
            }
        }

        let owners = seen.entry(threshold).or_default();
        if let Some(owner) = owners.get(sample) {
            if owner != cluster {
                warn!(
                    "Skipping line {}: sample {} already in cluster {} at threshold {}",
                    line_no, sample, owner, threshold
                );
            }
            continue;
        }
        owners.insert(sample.to_string(), cluster.to_string());

        previous
            .clusters
            .entry(threshold)
            .or_default()
            .entry(cluster.to_string())
            .or_default()
            .insert(sample.to_string());
    }

    Ok(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn parse(text: &str) -> Result<PreviousRun> {
        parse_previous(Cursor::new(text.as_bytes()))
    }

    fn members(previous: &PreviousRun, threshold: u32, id: &str) -> Vec<String> {
        previous.clusters[&threshold][id].iter().cloned().collect()
    }

    #[test]
    fn parses_membership_table() {
        let previous = parse(
            "sample_id\tcluster_distance\tcluster_id\n\
             A\t20\t000001\n\
             B\t20\t000001\n\
             A\t10\t000002\n\
             B\t10\t000002\n\
             C\tNA\tNA\n",
        )
        .unwrap();

        assert_eq!(members(&previous, 20, "000001"), vec!["A", "B"]);
        assert_eq!(members(&previous, 10, "000002"), vec!["A", "B"]);
        assert_eq!(previous.cluster_count(), 2);
        assert_eq!(previous.at(5).count(), 0);
    }

    #[test]
    fn accepts_header_aliases_in_any_order() {
        let previous = parse("cluster\tsample\tthreshold\nx\tA\t5\nx\tB\t5\n").unwrap();
        assert_eq!(members(&previous, 5, "x"), vec!["A", "B"]);
    }

    #[test]
    fn missing_column_is_malformed() {
        let err = parse("sample_id\tcluster_id\nA\t1\n").unwrap_err();
        assert!(matches!(err, ClusterError::MalformedTable(m) if m.contains("cluster_distance")));
        assert!(matches!(parse(""), Err(ClusterError::MalformedTable(_))));
    }

    #[test]
    fn bad_rows_are_skipped() {
        let previous = parse(
            "sample_id\tcluster_distance\tcluster_id\n\
             A\t20\t000001\n\
             short row\n\
             B\ttwenty\t000001\n\
             C\t20\t000001\n\
             A\t20\t000009\n\
             D\t10\t000001\n\
             E\t-1\t\n",
        )
        .unwrap();

        // A keeps its first cluster; 000001 stays at 20 only
        assert_eq!(members(&previous, 20, "000001"), vec!["A", "C"]);
        assert!(!previous.clusters[&20].contains_key("000009"));
        assert!(!previous.clusters.contains_key(&10));
    }

    #[test]
    fn reads_gzip_compressed_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous.tsv.gz");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = niffler::get_writer(
            Box::new(file),
            niffler::compression::Format::Gzip,
            niffler::compression::Level::One,
        )
        .unwrap();
        writer
            .write_all(b"sample_id\tcluster_distance\tcluster_id\nA\t10\t7\nB\t10\t7\n")
            .unwrap();
        drop(writer);

        let previous = read_previous(&path).unwrap();
        assert_eq!(members(&previous, 10, "7"), vec!["A", "B"]);
    }
}
