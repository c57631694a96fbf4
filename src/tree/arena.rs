use super::{NodeId, PhyloTree, TreeNode};
use crate::error::{ClusterError, Result};
use std::collections::HashMap;

/// Tree stored as parallel node arrays. Node ids are indices into them.
#[derive(Debug, Clone)]
pub struct ArenaTree {
    names: Vec<String>,
    parents: Vec<Option<NodeId>>,
    branch_lengths: Vec<f64>,
    depths: Vec<usize>,
    leaf_order: Vec<NodeId>,
    leaf_index: HashMap<String, NodeId>,
    root: NodeId,
}

impl ArenaTree {
    /// Build a tree from per-node names, parent links and branch lengths.
    ///
    /// Exactly one node may lack a parent. Leaves are the nodes without
    /// children; their names must be non-empty and unique.
    pub fn from_parts(
        names: Vec<String>,
        parents: Vec<Option<NodeId>>,
        branch_lengths: Vec<f64>,
    ) -> Result<Self> {
        let n_nodes = names.len();
        if parents.len() != n_nodes || branch_lengths.len() != n_nodes {
            return Err(ClusterError::InvalidTree(
                "names, parents and branch lengths must have the same length".to_string(),
            ));
        }
        if n_nodes == 0 {
            return Err(ClusterError::InvalidTree("tree has no nodes".to_string()));
        }

        let mut has_children = vec![false; n_nodes];
        for (child, parent) in parents.iter().enumerate() {
            if let Some(p) = *parent {
                if p >= n_nodes {
                    return Err(ClusterError::InvalidTree(format!(
                        "node {} points at missing parent {}",
                        child, p
                    )));
                }
                has_children[p] = true;
            }
        }

        let roots: Vec<NodeId> = (0..n_nodes).filter(|&i| parents[i].is_none()).collect();
        let root = match roots.as_slice() {
            [root] => *root,
            [] => return Err(ClusterError::InvalidTree("no root node found".to_string())),
            _ => {
                return Err(ClusterError::InvalidTree(format!(
                    "expected one root, found {}",
                    roots.len()
                )))
            }
        };

        let depths = compute_depths(&parents, root)?;

        let mut leaf_order = Vec::new();
        let mut leaf_index = HashMap::new();
        for node in 0..n_nodes {
            if has_children[node] {
                continue;
            }
            let name = &names[node];
            if name.is_empty() {
                return Err(ClusterError::InvalidTree(format!("leaf node {} has no name", node)));
            }
            if leaf_index.insert(name.clone(), node).is_some() {
                return Err(ClusterError::DuplicateSample {
                    sample: name.clone(),
                    context: "tree leaves".to_string(),
                });
            }
            leaf_order.push(node);
        }

        Ok(Self {
            names,
            parents,
            branch_lengths,
            depths,
            leaf_order,
            leaf_index,
            root,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn up(&self, id: NodeId) -> NodeId {
        self.parents[id].unwrap_or(id)
    }
}

fn compute_depths(parents: &[Option<NodeId>], root: NodeId) -> Result<Vec<usize>> {
    let n_nodes = parents.len();
    let mut depths: Vec<Option<usize>> = vec![None; n_nodes];
    depths[root] = Some(0);

    for start in 0..n_nodes {
        let mut path = Vec::new();
        let mut current = start;
        let base = loop {
            if let Some(d) = depths[current] {
                break d;
            }
            if path.len() > n_nodes {
                return Err(ClusterError::InvalidTree(format!(
                    "cycle detected above node {}",
                    start
                )));
            }
            path.push(current);
            match parents[current] {
                Some(p) => current = p,
                None => {
                    return Err(ClusterError::InvalidTree(format!(
                        "node {} is disconnected from the root",
                        start
                    )))
                }
            }
        };
        for (offset, node) in path.iter().rev().enumerate() {
            depths[*node] = Some(base + offset + 1);
        }
    }

    Ok(depths.into_iter().map(|d| d.unwrap_or(0)).collect())
}

impl PhyloTree for ArenaTree {
    fn leaves(&self) -> Vec<&str> {
        self.leaf_order.iter().map(|&n| self.names[n].as_str()).collect()
    }

    fn leaf(&self, sample: &str) -> Option<NodeId> {
        self.leaf_index.get(sample).copied()
    }

    fn lca(&self, a: &str, b: &str) -> Result<NodeId> {
        let mut x = self
            .leaf(a)
            .ok_or_else(|| ClusterError::UnknownSample(a.to_string()))?;
        let mut y = self
            .leaf(b)
            .ok_or_else(|| ClusterError::UnknownSample(b.to_string()))?;

        while self.depths[x] > self.depths[y] {
            x = self.up(x);
        }
        while self.depths[y] > self.depths[x] {
            y = self.up(y);
        }
        while x != y {
            x = self.up(x);
            y = self.up(y);
        }
        Ok(x)
    }

    fn node(&self, id: NodeId) -> TreeNode {
        TreeNode {
            branch_length: self.branch_lengths[id],
            parent: self.parents[id],
        }
    }
}
