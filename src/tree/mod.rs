//! Read-only access to a rooted phylogenetic tree with branch lengths.
//!
//! The clustering core only needs leaf lookup, lowest common ancestors and a
//! parent walk, so it talks to trees through [`PhyloTree`]. [`ArenaTree`] is
//! the in-memory implementation, built from Newick by [`newick`].

mod arena;
pub mod newick;

pub use arena::ArenaTree;

use crate::error::Result;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    /// Length of the branch leading from the parent to this node.
    pub branch_length: f64,
    pub parent: Option<NodeId>,
}

pub trait PhyloTree {
    /// Leaf names in tree order.
    fn leaves(&self) -> Vec<&str>;
    fn leaf(&self, sample: &str) -> Option<NodeId>;
    fn lca(&self, a: &str, b: &str) -> Result<NodeId>;
    fn node(&self, id: NodeId) -> TreeNode;
}
