use super::{assemble, has_overlap, resolve_overlaps, Cluster, ClusterForest};
use crate::context::RunContext;
use crate::distance::{build_matrix, MatrixBuild};
use crate::error::{ClusterError, Result};
use crate::export::ArtifactSink;
use crate::tree::PhyloTree;
use crate::types::{Threshold, ThresholdLevels};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

/// Recursively clusters a sample set down the threshold levels.
///
/// Each cluster's matrix is built over its own members at the next level,
/// handed to the sink together with the member list, and then dropped.
pub struct Subclusterer<'a, T: PhyloTree + ?Sized, S: ArtifactSink + ?Sized> {
    tree: &'a T,
    levels: &'a ThresholdLevels,
    sink: &'a mut S,
    subclusters: bool,
    whole_tree_matrix: bool,
}

impl<'a, T: PhyloTree + ?Sized, S: ArtifactSink + ?Sized> Subclusterer<'a, T, S> {
    pub fn new(tree: &'a T, levels: &'a ThresholdLevels, sink: &'a mut S) -> Self {
        Self {
            tree,
            levels,
            sink,
            subclusters: true,
            whole_tree_matrix: false,
        }
    }

    /// With `false`, only the first level is clustered.
    pub fn subclusters(mut self, enabled: bool) -> Self {
        self.subclusters = enabled;
        self
    }

    pub fn whole_tree_matrix(mut self, enabled: bool) -> Self {
        self.whole_tree_matrix = enabled;
        self
    }

    pub fn run(mut self, samples: Vec<String>, ctx: &mut RunContext) -> Result<ClusterForest> {
        self.levels.check_width(ctx.width())?;
        for sample in &samples {
            if self.tree.leaf(sample).is_none() {
                return Err(ClusterError::UnknownSample(sample.clone()));
            }
        }

        let mut root = Cluster::new(ctx.allocate_sequence_id(), Threshold::WholeTree, samples, None)?;
        let first = self.levels.first();
        info!(
            "Clustering {} samples at thresholds {:?}",
            root.len(),
            self.levels.as_slice()
        );

        let build = build_matrix(self.tree, &root.samples, Some(first), ctx)?;
        if self.whole_tree_matrix {
            self.sink.write_whole_tree(&build.matrix)?;
        }
        let unclustered = build.unclustered_names();

        let mut universe: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
        universe.insert(first, root.samples.iter().cloned().collect());

        root.children = self.spawn_children(root.sequence_id, build, first, ctx, &mut universe)?;

        let forest = ClusterForest {
            root,
            levels: self.levels.clone(),
            universe,
            unclustered,
        };
        for level in self.levels.iter() {
            info!(
                "Threshold {}: {} clusters",
                level,
                forest.clusters_at(level).len()
            );
        }
        Ok(forest)
    }

    /// Turn one level's neighbor pairs into child clusters and refine each.
    fn spawn_children(
        &mut self,
        parent: u32,
        build: MatrixBuild,
        threshold: u32,
        ctx: &mut RunContext,
        universe: &mut BTreeMap<u32, BTreeSet<String>>,
    ) -> Result<Vec<Cluster>> {
        let mut groups = assemble(&build.neighbors);
        if has_overlap(&groups) {
            let before = groups.len();
            groups = resolve_overlaps(groups);
            debug!(
                "Cluster {} at threshold {}: dropped {} overlapping group(s)",
                parent,
                threshold,
                before - groups.len()
            );
        }

        let samples = build.matrix.samples();
        let mut children = Vec::with_capacity(groups.len());
        for group in groups {
            let members = group.iter().map(|&i| samples[i].clone()).collect();
            children.push(Cluster::new(
                ctx.allocate_sequence_id(),
                Threshold::Distance(threshold),
                members,
                Some(parent),
            )?);
        }
        drop(build);

        for child in &mut children {
            self.refine(child, threshold, ctx, universe)?;
        }
        Ok(children)
    }

    fn refine(
        &mut self,
        cluster: &mut Cluster,
        threshold: u32,
        ctx: &mut RunContext,
        universe: &mut BTreeMap<u32, BTreeSet<String>>,
    ) -> Result<()> {
        let next = if self.subclusters {
            self.levels.next(Threshold::Distance(threshold))
        } else {
            None
        };

        if self.levels.is_terminal(threshold) {
            debug!(
                "Cluster {} ({} samples) is at the terminal level",
                cluster.sequence_id,
                cluster.len()
            );
        }

        let build = build_matrix(self.tree, &cluster.samples, next, ctx)?;
        self.sink.write_cluster(cluster, &build.matrix)?;

        if let Some(next) = next {
            universe
                .entry(next)
                .or_default()
                .extend(cluster.samples.iter().cloned());
            cluster.children = self.spawn_children(cluster.sequence_id, build, next, ctx, universe)?;
        }
        Ok(())
    }
}
