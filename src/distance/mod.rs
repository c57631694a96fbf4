//! SNP distances between tree leaves.

mod builder;
mod matrix;

pub use builder::{build_matrix, MatrixBuild};
pub use matrix::DistanceMatrix;

use crate::error::{ClusterError, Result};
use crate::tree::{NodeId, PhyloTree};

/// Summed branch length between two leaves through their LCA, truncated to an
/// integer. A sample's distance to itself is 0 without touching the tree.
pub fn distance<T: PhyloTree + ?Sized>(tree: &T, a: &str, b: &str) -> Result<u64> {
    if a == b {
        return Ok(0);
    }
    let lca = tree.lca(a, b)?;
    let node_a = tree
        .leaf(a)
        .ok_or_else(|| ClusterError::UnknownSample(a.to_string()))?;
    let node_b = tree
        .leaf(b)
        .ok_or_else(|| ClusterError::UnknownSample(b.to_string()))?;

    let total = path_length(tree, node_a, lca) + path_length(tree, node_b, lca);
    Ok(truncate(total))
}

fn path_length<T: PhyloTree + ?Sized>(tree: &T, from: NodeId, ancestor: NodeId) -> f64 {
    let mut sum = 0.0;
    let mut current = from;
    while current != ancestor {
        let node = tree.node(current);
        sum += node.branch_length;
        match node.parent {
            Some(parent) => current = parent,
            None => break,
        }
    }
    sum
}

// `as` saturates at u64::MAX and maps NaN to 0.
fn truncate(length: f64) -> u64 {
    if length > 0.0 {
        length as u64
    } else {
        0
    }
}
