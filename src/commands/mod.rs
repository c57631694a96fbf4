pub mod cluster;
pub mod matrix;

use crate::tree::{ArenaTree, PhyloTree};
use crate::utils::reader::read_sample_list;
use anyhow::Result;
use log::info;
use std::path::Path;

/// Samples from `list`, or every leaf of `tree` when no list is given.
fn input_samples(tree: &ArenaTree, list: Option<&Path>) -> Result<Vec<String>> {
    let samples = match list {
        Some(path) => read_sample_list(path)?,
        None => tree.leaves().into_iter().map(str::to_string).collect(),
    };
    info!("Using {} input samples", samples.len());
    Ok(samples)
}
