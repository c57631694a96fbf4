use super::input_samples;
use crate::context::RunContext;
use crate::distance::build_matrix;
use crate::export::create_artifact;
use crate::tree::newick::load_newick;
use crate::types::IntegerWidth;
use anyhow::{Context, Result};
use log::info;
use std::io::Write;
use std::path::Path;

pub fn run(
    tree_path: &Path,
    samples_path: Option<&Path>,
    output: &Path,
    width: IntegerWidth,
    show_progress: bool,
) -> Result<()> {
    let tree = load_newick(tree_path)?;
    let samples = input_samples(&tree, samples_path)?;

    let mut ctx = RunContext::new(width).with_progress(show_progress);
    let build = build_matrix(&tree, &samples, None, &mut ctx)?;

    let mut writer = create_artifact(output)?;
    build
        .matrix
        .write_tsv(&mut writer)
        .and_then(|_| writer.flush())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Wrote {}x{} {} matrix to {} ({} saturated cells)",
        build.matrix.len(),
        build.matrix.len(),
        width.name(),
        output.display(),
        ctx.saturated_cells()
    );
    Ok(())
}
