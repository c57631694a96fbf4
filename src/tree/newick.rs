use super::{ArenaTree, NodeId};
use crate::error::{ClusterError, Result};
use crate::utils::reader;
use log::info;
use std::path::Path;

/// Load a (possibly compressed) Newick file.
pub fn load_newick(path: &Path) -> anyhow::Result<ArenaTree> {
    let text = reader::read_to_string(path)?;
    let tree = parse_newick(&text)?;
    info!(
        "Loaded tree {} with {} nodes",
        path.display(),
        tree.len()
    );
    Ok(tree)
}

fn invalid(pos: usize, message: impl std::fmt::Display) -> ClusterError {
    ClusterError::InvalidTree(format!("Newick parse failed at byte {}: {}", pos, message))
}

/// Node arrays being filled while the text is scanned.
#[derive(Default)]
struct Nodes {
    names: Vec<String>,
    parents: Vec<Option<NodeId>>,
    lengths: Vec<f64>,
}

impl Nodes {
    fn push(&mut self, parent: Option<NodeId>) -> NodeId {
        self.names.push(String::new());
        self.parents.push(parent);
        self.lengths.push(0.0);
        self.names.len() - 1
    }
}

/// Parse one Newick tree.
///
/// Internal labels, quoted labels (`'a b'`, with `''` for a quote) and
/// bracketed comments are accepted. Missing branch lengths are 0. Nesting is
/// tracked with an explicit stack, so deep ladder-shaped trees are fine.
pub fn parse_newick(text: &str) -> Result<ArenaTree> {
    let bytes = text.as_bytes();
    let mut nodes = Nodes::default();
    let mut open: Vec<NodeId> = Vec::new();
    // Node that the next label or branch length belongs to.
    let mut current: Option<NodeId> = None;
    let mut pos = 0;
    let mut terminated = false;

    while pos < bytes.len() {
        let c = bytes[pos];
        if terminated {
            if !c.is_ascii_whitespace() {
                return Err(invalid(pos, "text after ';'"));
            }
            pos += 1;
            continue;
        }
        match c {
            b'(' => {
                if current.is_some() {
                    return Err(invalid(pos, "'(' after a completed node"));
                }
                if open.is_empty() && !nodes.names.is_empty() {
                    return Err(invalid(pos, "more than one root"));
                }
                let node = nodes.push(open.last().copied());
                open.push(node);
                pos += 1;
            }
            b',' => {
                if open.is_empty() {
                    return Err(invalid(pos, "',' outside parentheses"));
                }
                current = None;
                pos += 1;
            }
            b')' => {
                let node = open.pop().ok_or_else(|| invalid(pos, "unbalanced ')'"))?;
                current = Some(node);
                pos += 1;
            }
            b':' => {
                let node = current.ok_or_else(|| invalid(pos, "branch length without a node"))?;
                let start = pos + 1;
                let mut end = start;
                while end < bytes.len() && !b",();[".contains(&bytes[end]) {
                    end += 1;
                }
                let raw = text[start..end].trim();
                nodes.lengths[node] = raw
                    .parse::<f64>()
                    .map_err(|_| invalid(start, format!("invalid branch length '{}'", raw)))?;
                pos = end;
            }
            b';' => {
                if !open.is_empty() {
                    return Err(invalid(pos, "unclosed '('"));
                }
                terminated = true;
                pos += 1;
            }
            b'[' => {
                let close = text[pos..]
                    .find(']')
                    .ok_or_else(|| invalid(pos, "unterminated comment"))?;
                pos += close + 1;
            }
            c if c.is_ascii_whitespace() => pos += 1,
            _ => {
                let (label, next) = read_label(text, pos)?;
                let node = match current {
                    Some(node) if nodes.names[node].is_empty() => node,
                    Some(_) => return Err(invalid(pos, "node has two labels")),
                    None => {
                        if open.is_empty() && !nodes.names.is_empty() {
                            return Err(invalid(pos, "more than one root"));
                        }
                        let leaf = nodes.push(open.last().copied());
                        current = Some(leaf);
                        leaf
                    }
                };
                nodes.names[node] = label;
                pos = next;
            }
        }
    }

    if !terminated {
        return Err(invalid(bytes.len(), "missing ';'"));
    }
    ArenaTree::from_parts(nodes.names, nodes.parents, nodes.lengths)
}

/// Read a quoted or bare label starting at `pos`; returns it and the position
/// just past it.
fn read_label(text: &str, pos: usize) -> Result<(String, usize)> {
    let bytes = text.as_bytes();
    if bytes[pos] == b'\'' {
        let mut label = String::new();
        let mut i = pos + 1;
        loop {
            let rest = &text[i..];
            let quote = rest.find('\'').ok_or_else(|| invalid(pos, "unterminated quoted label"))?;
            label.push_str(&rest[..quote]);
            i += quote + 1;
            if bytes.get(i) == Some(&b'\'') {
                label.push('\'');
                i += 1;
            } else {
                return Ok((label, i));
            }
        }
    }

    let mut end = pos;
    while end < bytes.len() && !b"(),:;[".contains(&bytes[end]) {
        end += 1;
    }
    Ok((text[pos..end].trim().to_string(), end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::distance;
    use crate::tree::PhyloTree;

    #[test]
    fn parses_branch_lengths_into_distances() {
        let tree = parse_newick("((A:1,B:2):3,C:4);").unwrap();
        assert_eq!(tree.leaves(), vec!["A", "B", "C"]);
        assert_eq!(distance(&tree, "A", "B").unwrap(), 3);
        assert_eq!(distance(&tree, "A", "C").unwrap(), 8);
        assert_eq!(distance(&tree, "B", "C").unwrap(), 9);
    }

    #[test]
    fn accepts_labels_comments_and_whitespace() {
        let tree = parse_newick(
            "(\n  ('sample one':1.5, B_2:2.5e0)node_7:1 [&support=0.9],\n  C\n)root;\n",
        )
        .unwrap();
        assert_eq!(tree.leaves(), vec!["sample one", "B_2", "C"]);
        assert_eq!(distance(&tree, "sample one", "B_2").unwrap(), 4);
        // C has no branch length
        assert_eq!(distance(&tree, "B_2", "C").unwrap(), 3);
        assert!(tree.leaf("node_7").is_none());
    }

    #[test]
    fn quoted_label_keeps_escaped_quote() {
        let tree = parse_newick("('it''s':1,x:1);").unwrap();
        assert_eq!(tree.leaves(), vec!["it's", "x"]);
    }

    #[test]
    fn deep_ladder_does_not_recurse() {
        let depth = 20_000;
        let mut text = String::new();
        for _ in 0..depth {
            text.push('(');
        }
        text.push_str("L0:1");
        for i in 1..=depth {
            text.push_str(&format!(",L{}:1):1", i));
        }
        text.push(';');

        let tree = parse_newick(&text).unwrap();
        assert_eq!(tree.leaves().len(), depth + 1);
        assert_eq!(distance(&tree, "L0", "L1").unwrap(), 2);
    }

    #[test]
    fn garbage_is_an_invalid_tree() {
        for bad in ["((A:1,B:2", "(A:1,B:2));", "(A:x,B:1);", "(A,B)", "(A,B); C", "A;B;"] {
            assert!(
                matches!(parse_newick(bad), Err(ClusterError::InvalidTree(_))),
                "{} should fail",
                bad
            );
        }
    }
}
