//! Threshold clustering and the cluster hierarchy it produces.

mod assembler;
mod overlap;
mod subcluster;

pub use assembler::assemble;
pub use overlap::{has_overlap, resolve_overlaps};
pub use subcluster::Subclusterer;

use crate::error::{ClusterError, Result};
use crate::types::{Threshold, ThresholdLevels};
use std::collections::{BTreeMap, BTreeSet};

pub const WHOLE_TREE_ID: &str = "whole_tree";

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Run-local id, unique across every level of one run.
    pub sequence_id: u32,
    pub threshold: Threshold,
    /// Sorted, unique member samples.
    pub samples: Vec<String>,
    pub parent: Option<u32>,
    pub children: Vec<Cluster>,
    /// Stable identifier, assigned by reconciliation.
    pub display_id: Option<String>,
}

impl Cluster {
    /// Fails on duplicate members, and on fewer than two members for any
    /// cluster below the whole tree.
    pub fn new(
        sequence_id: u32,
        threshold: Threshold,
        mut samples: Vec<String>,
        parent: Option<u32>,
    ) -> Result<Self> {
        samples.sort();
        if let Some(dup) = samples.windows(2).find(|w| w[0] == w[1]) {
            return Err(ClusterError::DuplicateSample {
                sample: dup[0].clone(),
                context: format!("cluster {}", sequence_id),
            });
        }
        if threshold != Threshold::WholeTree && samples.len() < 2 {
            return Err(ClusterError::ClusterTooSmall {
                sequence_id,
                size: samples.len(),
            });
        }
        Ok(Self {
            sequence_id,
            threshold,
            samples,
            parent,
            children: Vec::new(),
            display_id: None,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn contains(&self, sample: &str) -> bool {
        self.samples
            .binary_search_by(|s| s.as_str().cmp(sample))
            .is_ok()
    }

    /// This cluster and all descendants, depth first.
    pub fn iter(&self) -> ClusterIter<'_> {
        ClusterIter { stack: vec![self] }
    }
}

pub struct ClusterIter<'a> {
    stack: Vec<&'a Cluster>,
}

impl<'a> Iterator for ClusterIter<'a> {
    type Item = &'a Cluster;

    fn next(&mut self) -> Option<Self::Item> {
        let cluster = self.stack.pop()?;
        self.stack.extend(cluster.children.iter().rev());
        Some(cluster)
    }
}

/// Every cluster of one run, rooted at the whole-tree cluster.
#[derive(Debug, Clone)]
pub struct ClusterForest {
    pub root: Cluster,
    pub levels: ThresholdLevels,
    /// Samples evaluated at each level: all inputs at the first level, the
    /// members of parent clusters below it.
    pub universe: BTreeMap<u32, BTreeSet<String>>,
    /// Samples with no neighbor at the first level.
    pub unclustered: Vec<String>,
}

impl ClusterForest {
    /// Clusters at `threshold`, ordered by sequence id.
    pub fn clusters_at(&self, threshold: u32) -> Vec<&Cluster> {
        let mut clusters: Vec<&Cluster> = self
            .root
            .iter()
            .filter(|c| c.threshold == Threshold::Distance(threshold))
            .collect();
        clusters.sort_by_key(|c| c.sequence_id);
        clusters
    }

    /// Every non-root cluster, ordered by sequence id.
    pub fn clusters(&self) -> Vec<&Cluster> {
        let mut clusters: Vec<&Cluster> = self
            .root
            .iter()
            .filter(|c| c.threshold != Threshold::WholeTree)
            .collect();
        clusters.sort_by_key(|c| c.sequence_id);
        clusters
    }

    pub fn universe_at(&self, threshold: u32) -> Option<&BTreeSet<String>> {
        self.universe.get(&threshold)
    }

    /// Copy reconciled identifiers onto the clusters. The root always gets
    /// [`WHOLE_TREE_ID`].
    pub fn apply_display_ids(&mut self, ids: &BTreeMap<u32, String>) {
        fn visit(cluster: &mut Cluster, ids: &BTreeMap<u32, String>) {
            cluster.display_id = match cluster.threshold {
                Threshold::WholeTree => Some(WHOLE_TREE_ID.to_string()),
                Threshold::Distance(_) => ids.get(&cluster.sequence_id).cloned(),
            };
            for child in &mut cluster.children {
                visit(child, ids);
            }
        }
        visit(&mut self.root, ids);
    }

    /// Display id of the cluster with `sequence_id`, if reconciled.
    pub fn display_id(&self, sequence_id: u32) -> Option<&str> {
        self.root
            .iter()
            .find(|c| c.sequence_id == sequence_id)
            .and_then(|c| c.display_id.as_deref())
    }
}
