use std::collections::{BTreeMap, BTreeSet};

/// Group neighbor pairs into sample sets by transitive closure.
///
/// Pairs are consumed in order. A pair whose members are both new starts a
/// set; otherwise `b` joins every set holding `a` and `a` joins every set
/// holding `b`. When `a` and `b` already sit in different sets both sets grow,
/// so the output can overlap; callers resolve that with
/// [`resolve_overlaps`](super::resolve_overlaps).
pub fn assemble<T: Ord + Clone>(pairs: &[(T, T)]) -> Vec<BTreeSet<T>> {
    let mut sets: Vec<BTreeSet<T>> = Vec::new();
    let mut membership: BTreeMap<T, Vec<usize>> = BTreeMap::new();

    for (a, b) in pairs {
        let with_a = membership.get(a).cloned().unwrap_or_default();
        let with_b = membership.get(b).cloned().unwrap_or_default();

        if with_a.is_empty() && with_b.is_empty() {
            let idx = sets.len();
            sets.push([a.clone(), b.clone()].into_iter().collect());
            membership.entry(a.clone()).or_default().push(idx);
            if a != b {
                membership.entry(b.clone()).or_default().push(idx);
            }
            continue;
        }

        for idx in with_a {
            if sets[idx].insert(b.clone()) {
                membership.entry(b.clone()).or_default().push(idx);
            }
        }
        for idx in with_b {
            if sets[idx].insert(a.clone()) {
                membership.entry(a.clone()).or_default().push(idx);
            }
        }
    }

    sets
}
