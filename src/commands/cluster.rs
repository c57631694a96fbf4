use super::input_samples;
use crate::cluster::{ClusterForest, Subclusterer};
use crate::config::Config;
use crate::context::RunContext;
use crate::error::ClusterError;
use crate::export::summary::{sha256_file, RunSummary, TreeInput};
use crate::export::{
    write_cluster_table, write_membership_table, write_renames, write_unclustered, DirectorySink,
};
use crate::persistence::{read_previous, reconcile, IdRegistry, PreviousRun};
use crate::tree::newick::load_newick;
use crate::types::{IntegerWidth, ThresholdLevels};
use crate::utils::external_tools::{
    CommandExtractor, SubtreeExtractor, SubtreeOutcome, SubtreeRequest,
};
use crate::utils::progress_bar_builder::ProgressBarBuilder;
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

pub const MEMBERSHIP_FILE: &str = "cluster_membership.tsv";
pub const CLUSTERS_FILE: &str = "clusters.tsv";
pub const RENAMES_FILE: &str = "renames.tsv";
pub const UNCLUSTERED_FILE: &str = "unclustered_samples.txt";
pub const SUMMARY_FILE: &str = "run_summary.json";
pub const DENYLIST_FILE: &str = "denylist.txt";

/// Everything the `cluster` command needs, after merging config and flags.
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    pub tree: PathBuf,
    pub outdir: PathBuf,
    pub samples: Option<PathBuf>,
    pub previous: Option<PathBuf>,
    pub denylist: Option<PathBuf>,
    pub levels: ThresholdLevels,
    pub width: IntegerWidth,
    pub subclusters: bool,
    pub whole_tree_matrix: bool,
    pub extractor: Option<String>,
    pub extract_from: Option<PathBuf>,
    pub min_subtree_size: usize,
    pub show_progress: bool,
}

impl ClusterOptions {
    /// Options for clustering `tree` into `outdir` with the config's defaults.
    pub fn from_config(config: &Config, tree: PathBuf, outdir: PathBuf) -> Result<Self> {
        Ok(Self {
            tree,
            outdir,
            samples: None,
            previous: None,
            denylist: None,
            levels: config.levels()?,
            width: config.integer_width,
            subclusters: config.subclusters,
            whole_tree_matrix: config.write_whole_tree_matrix,
            extractor: config.extractor.clone(),
            extract_from: None,
            min_subtree_size: config.min_subtree_size,
            show_progress: config.show_progress,
        })
    }

    /// Registry for this run.
    ///
    /// An explicit `--denylist` is read and appended to in place. Otherwise the
    /// denylist next to the previous table is carried forward into the output
    /// directory, so a chain of runs into fresh directories keeps every retired
    /// identifier. Without either, the denylist starts empty in `outdir`.
    fn open_registry(&self) -> Result<IdRegistry> {
        let target = self.outdir.join(DENYLIST_FILE);
        if let Some(path) = &self.denylist {
            return IdRegistry::with_denylist(path)
                .with_context(|| format!("Failed to load denylist {}", path.display()));
        }
        if let Some(previous) = &self.previous {
            let dir = previous
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let source = dir.join(DENYLIST_FILE);
            if source != target {
                return IdRegistry::carried_forward(&source, &target).with_context(|| {
                    format!("Failed to carry denylist {} forward", source.display())
                });
            }
        }
        IdRegistry::with_denylist(&target)
            .with_context(|| format!("Failed to load denylist {}", target.display()))
    }
}

pub fn run(options: &ClusterOptions) -> Result<()> {
    options.levels.check_width(options.width)?;
    fs::create_dir_all(&options.outdir)
        .with_context(|| format!("Failed to create {}", options.outdir.display()))?;
    for name in [MEMBERSHIP_FILE, CLUSTERS_FILE, RENAMES_FILE, UNCLUSTERED_FILE, SUMMARY_FILE] {
        let path = options.outdir.join(name);
        if path.exists() {
            return Err(ClusterError::ArtifactExists(path).into());
        }
    }

    let extractor = match &options.extractor {
        Some(program) => {
            let extractor = CommandExtractor::new(program.as_str());
            extractor.check()?;
            Some(extractor)
        }
        None => None,
    };

    let tree = load_newick(&options.tree)?;
    let samples = input_samples(&tree, options.samples.as_deref())?;
    let previous = match &options.previous {
        Some(path) => read_previous(path)?,
        None => PreviousRun::default(),
    };
    let mut registry = options.open_registry()?;

    let progress = ProgressBarBuilder::new(format!("Clustering {} samples...", samples.len()))
        .with_tick()
        .hidden(!options.show_progress)
        .build();

    let mut ctx = RunContext::new(options.width).with_progress(options.show_progress);
    let mut sink = DirectorySink::new(&options.outdir)?;
    let mut forest = Subclusterer::new(&tree, &options.levels, &mut sink)
        .subclusters(options.subclusters)
        .whole_tree_matrix(options.whole_tree_matrix)
        .run(samples, &mut ctx)
        .context("Clustering failed")?;

    progress.set_message("Reconciling cluster identifiers...");
    let reconciliation = reconcile(&forest, &previous, &mut registry);
    registry.persist().context("Failed to update denylist")?;
    forest.apply_display_ids(&reconciliation.assignments);

    progress.set_message("Writing tables...");
    let outdir = &options.outdir;
    write_membership_table(&outdir.join(MEMBERSHIP_FILE), &forest)?;
    write_cluster_table(&outdir.join(CLUSTERS_FILE), &forest)?;
    write_renames(&outdir.join(RENAMES_FILE), &reconciliation.renames)?;
    write_unclustered(&outdir.join(UNCLUSTERED_FILE), &forest.unclustered)?;

    if let Some(extractor) = &extractor {
        progress.set_message("Extracting subtrees...");
        let source = options.extract_from.as_deref().unwrap_or(&options.tree);
        extract_subtrees(extractor, &forest, &sink, source, outdir, options.min_subtree_size)?;
    }

    let tree_input = TreeInput {
        path: options.tree.clone(),
        sha256: sha256_file(&options.tree)
            .with_context(|| format!("Failed to hash {}", options.tree.display()))?,
    };
    let summary = RunSummary::new(
        tree_input,
        options.width,
        ctx.saturated_cells(),
        &forest,
        &reconciliation,
        registry.retired_this_run(),
    );
    summary.write(&outdir.join(SUMMARY_FILE))?;

    progress.finish_with_message(format!(
        "Clustered {} samples into {} clusters",
        forest.root.len(),
        forest.clusters().len()
    ));
    info!(
        "Finished: {} clusters, {} renamed, {} unclustered; results in {}",
        forest.clusters().len(),
        reconciliation.renames.len(),
        forest.unclustered.len(),
        outdir.display()
    );
    Ok(())
}

fn extract_subtrees<E: SubtreeExtractor + ?Sized>(
    extractor: &E,
    forest: &ClusterForest,
    sink: &DirectorySink,
    source: &Path,
    outdir: &Path,
    min_tree_size: usize,
) -> Result<()> {
    let subtree_dir = outdir.join("subtrees");
    fs::create_dir_all(&subtree_dir)
        .with_context(|| format!("Failed to create {}", subtree_dir.display()))?;

    let mut written = 0;
    let mut failed = 0;
    for cluster in forest.clusters() {
        let (Some(list), Some(id)) = (sink.sample_list(cluster.sequence_id), &cluster.display_id)
        else {
            continue;
        };
        let stem = subtree_dir.join(format!("{}_d{}", id, cluster.threshold));
        let request = SubtreeRequest {
            tree: source,
            sample_list: list,
            output_stem: &stem,
            min_tree_size,
        };
        match extractor.extract(&request) {
            SubtreeOutcome::Written { .. } => written += 1,
            SubtreeOutcome::Failed { .. } => failed += 1,
        }
    }

    if failed > 0 {
        warn!("{} of {} subtree extractions failed", failed, written + failed);
    }
    info!("Extracted {} subtrees into {}", written, subtree_dir.display());
    Ok(())
}
