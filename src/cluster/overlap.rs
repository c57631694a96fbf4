use std::collections::{BTreeMap, BTreeSet};

/// True when at least one member appears in more than one group.
pub fn has_overlap<T: Ord>(groups: &[BTreeSet<T>]) -> bool {
    let total: usize = groups.iter().map(|g| g.len()).sum();
    let union: BTreeSet<&T> = groups.iter().flatten().collect();
    union.len() != total
}

/// Make groups pairwise disjoint by dropping whole groups.
///
/// Groups that share no member with another group are kept as-is. Among the
/// conflicting ones, larger groups win (ties go to the earlier group); a group
/// touching a member already claimed by a kept group is discarded entirely,
/// never trimmed. Kept groups stay in their original order.
pub fn resolve_overlaps<T: Ord + Clone>(groups: Vec<BTreeSet<T>>) -> Vec<BTreeSet<T>> {
    let mut holders: BTreeMap<&T, Vec<usize>> = BTreeMap::new();
    for (idx, group) in groups.iter().enumerate() {
        for member in group {
            holders.entry(member).or_default().push(idx);
        }
    }

    let mut conflicting: BTreeSet<usize> = BTreeSet::new();
    for indices in holders.values() {
        if indices.len() > 1 {
            conflicting.extend(indices.iter().copied());
        }
    }

    let mut order: Vec<usize> = conflicting.into_iter().collect();
    order.sort_by(|&a, &b| groups[b].len().cmp(&groups[a].len()).then(a.cmp(&b)));

    let mut claimed: BTreeSet<&T> = BTreeSet::new();
    let mut discarded: BTreeSet<usize> = BTreeSet::new();
    for idx in order {
        if groups[idx].iter().any(|m| claimed.contains(m)) {
            discarded.insert(idx);
        } else {
            claimed.extend(groups[idx].iter());
        }
    }

    let keep: Vec<bool> = (0..groups.len()).map(|i| !discarded.contains(&i)).collect();
    groups
        .into_iter()
        .zip(keep)
        .filter_map(|(group, keep)| keep.then_some(group))
        .collect()
}
