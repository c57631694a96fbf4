use super::{IdRegistry, PreviousRun};
use crate::cluster::{Cluster, ClusterForest};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// What happened to a previous-run cluster in the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditOutcome {
    /// Two or more of its samples are clustered again at this threshold.
    Matched,
    /// Exactly one of its samples is clustered again.
    OrphanedButPresent,
    /// None of its samples are clustered; exactly one was evaluated and left
    /// unclustered.
    NearDecimated,
    /// None of its samples are clustered, and not exactly one was evaluated.
    Decimated,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Matched => "matched",
            AuditOutcome::OrphanedButPresent => "orphaned-but-present",
            AuditOutcome::NearDecimated => "near-decimated",
            AuditOutcome::Decimated => "decimated",
        }
    }

    pub fn retires(&self) -> bool {
        matches!(self, AuditOutcome::NearDecimated | AuditOutcome::Decimated)
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviousClusterAudit {
    pub previous_id: String,
    pub threshold: u32,
    pub outcome: AuditOutcome,
    /// Previous members evaluated again at this threshold.
    pub surviving: Vec<String>,
    /// Surviving members that sit in a current cluster at this threshold.
    pub clustered: Vec<String>,
    /// Identifier allocated when the previous one was retired.
    pub successor: Option<String>,
    /// Current identifier carrying on this cluster's name, if any.
    pub inherited_by: Option<u32>,
    /// The lone survivor sits in a cluster that kept a different identifier.
    pub ambiguous: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rename {
    pub old_id: String,
    pub new_id: String,
    pub threshold: u32,
    pub reason: AuditOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Sequence id to display id for every non-root cluster.
    pub assignments: BTreeMap<u32, String>,
    pub audits: Vec<PreviousClusterAudit>,
    pub renames: Vec<Rename>,
    /// Clusters that carried on a previous identifier.
    pub inherited: usize,
    /// Clusters given a never-issued identifier.
    pub fresh: usize,
}

impl Reconciliation {
    pub fn ambiguous(&self) -> impl Iterator<Item = &PreviousClusterAudit> {
        self.audits.iter().filter(|a| a.ambiguous)
    }

    pub fn count(&self, outcome: AuditOutcome) -> usize {
        self.audits.iter().filter(|a| a.outcome == outcome).count()
    }
}

/// Assign stable identifiers to every cluster of `forest`.
///
/// Each level is handled on its own: current clusters first inherit the
/// previous identifiers they overlap most, the rest get fresh ones, and then
/// every previous cluster is audited against the samples clustered at that
/// level. Previous identifiers already on the denylist are neither inherited
/// nor audited again. Decimated and near-decimated identifiers are retired into
/// `registry`; persisting the denylist is left to the caller.
pub fn reconcile(
    forest: &ClusterForest,
    previous: &PreviousRun,
    registry: &mut IdRegistry,
) -> Reconciliation {
    for id in previous.ids() {
        registry.reserve(id);
    }
    for threshold in previous.thresholds() {
        if !forest.levels.contains(threshold) {
            warn!(
                "Ignoring previous clusters at threshold {}: not a configured level",
                threshold
            );
        }
    }

    let mut result = Reconciliation::default();
    for level in forest.levels.iter() {
        reconcile_level(forest, previous, registry, level, &mut result);
    }

    info!(
        "Reconciled {} cluster(s): {} inherited, {} fresh, {} renamed",
        result.assignments.len(),
        result.inherited,
        result.fresh,
        result.renames.len()
    );
    result
}

fn reconcile_level(
    forest: &ClusterForest,
    previous: &PreviousRun,
    registry: &mut IdRegistry,
    level: u32,
    result: &mut Reconciliation,
) {
    let current = forest.clusters_at(level);
    let prev: Vec<(&String, &BTreeSet<String>)> = previous
        .at(level)
        .filter(|(id, _)| {
            let retired = registry.is_retired(id);
            if retired {
                warn!("Previous cluster {} is already retired; not inherited", id);
            }
            !retired
        })
        .collect();

    let mut assigned = continuity(&current, &prev);
    result.inherited += assigned.len();
    for cluster in &current {
        if !assigned.contains_key(&cluster.sequence_id) {
            let id = registry.allocate();
            debug!("Cluster {} at {} is new: {}", cluster.sequence_id, level, id);
            assigned.insert(cluster.sequence_id, id);
            result.fresh += 1;
        }
    }

    match forest.universe_at(level) {
        Some(universe) => {
            let clustered: BTreeSet<&String> =
                current.iter().flat_map(|c| c.samples.iter()).collect();
            for &(prev_id, members) in &prev {
                let audit = audit(prev_id, members, level, universe, &clustered, &current, &assigned);
                let audit = retire_if_needed(audit, registry, &mut assigned, result);
                if audit.ambiguous {
                    warn!(
                        "Previous cluster {} at {}: surviving sample {} joined a cluster with a different identifier",
                        audit.previous_id,
                        level,
                        audit.clustered.join(",")
                    );
                }
                result.audits.push(audit);
            }
        }
        None if previous.at(level).next().is_some() => {
            warn!(
                "Threshold {} was not evaluated this run; previous clusters there are not audited",
                level
            );
        }
        None => {}
    }

    result.assignments.extend(assigned);
}

/// Greedy best-overlap pairing of current clusters with previous ones.
fn continuity(
    current: &[&Cluster],
    previous: &[(&String, &BTreeSet<String>)],
) -> BTreeMap<u32, String> {
    let mut candidates: Vec<(usize, u32, &String)> = Vec::new();
    for cluster in current {
        for &(id, members) in previous {
            let shared = cluster.samples.iter().filter(|s| members.contains(*s)).count();
            if shared > 0 {
                candidates.push((shared, cluster.sequence_id, id));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(b.2)));

    let mut taken: BTreeSet<&String> = BTreeSet::new();
    let mut assigned = BTreeMap::new();
    for (_, sequence_id, id) in candidates {
        if assigned.contains_key(&sequence_id) || taken.contains(id) {
            continue;
        }
        taken.insert(id);
        assigned.insert(sequence_id, id.clone());
    }
    assigned
}

fn audit(
    prev_id: &str,
    members: &BTreeSet<String>,
    level: u32,
    universe: &BTreeSet<String>,
    clustered: &BTreeSet<&String>,
    current: &[&Cluster],
    assigned: &BTreeMap<u32, String>,
) -> PreviousClusterAudit {
    let surviving: Vec<String> = members.intersection(universe).cloned().collect();
    let in_clusters: Vec<String> = surviving
        .iter()
        .filter(|s| clustered.contains(s))
        .cloned()
        .collect();
    let inherited_by = assigned
        .iter()
        .find(|(_, id)| id.as_str() == prev_id)
        .map(|(&seq, _)| seq);

    let mut ambiguous = false;
    let outcome = match in_clusters.as_slice() {
        [] if surviving.len() == 1 => AuditOutcome::NearDecimated,
        [] => AuditOutcome::Decimated,
        [sample] => {
            let home = current.iter().find(|c| c.contains(sample));
            ambiguous = home.and_then(|c| assigned.get(&c.sequence_id)).map(String::as_str)
                != Some(prev_id);
            AuditOutcome::OrphanedButPresent
        }
        _ => AuditOutcome::Matched,
    };

    PreviousClusterAudit {
        previous_id: prev_id.to_string(),
        threshold: level,
        outcome,
        surviving,
        clustered: in_clusters,
        successor: None,
        inherited_by,
        ambiguous,
    }
}

fn retire_if_needed(
    mut audit: PreviousClusterAudit,
    registry: &mut IdRegistry,
    assigned: &mut BTreeMap<u32, String>,
    result: &mut Reconciliation,
) -> PreviousClusterAudit {
    if !audit.outcome.retires() {
        return audit;
    }

    let successor = registry.allocate();
    registry.retire(&audit.previous_id);
    info!(
        "Previous cluster {} at {} is {}; retired in favour of {}",
        audit.previous_id, audit.threshold, audit.outcome, successor
    );

    for id in assigned.values_mut() {
        if *id == audit.previous_id {
            *id = successor.clone();
        }
    }
    audit.inherited_by = None;
    result.renames.push(Rename {
        old_id: audit.previous_id.clone(),
        new_id: successor.clone(),
        threshold: audit.threshold,
        reason: audit.outcome,
    });
    audit.successor = Some(successor);
    audit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Threshold, ThresholdLevels};

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn set(v: &[&str]) -> BTreeSet<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    /// Root over `all`, with `groups` as clusters at 20 and `inner` as
    /// clusters at 10 under the first group.
    fn forest(all: &[&str], groups: &[&[&str]], inner: &[&[&str]]) -> ClusterForest {
        let mut root = Cluster::new(0, Threshold::WholeTree, names(all), None).unwrap();
        let mut next = 1;
        let mut universe = BTreeMap::new();
        universe.insert(20, set(all));
        for group in groups {
            root.children
                .push(Cluster::new(next, Threshold::Distance(20), names(group), Some(0)).unwrap());
            next += 1;
            universe.entry(10).or_insert_with(BTreeSet::new).extend(set(group));
        }
        for group in inner {
            let parent = &mut root.children[0];
            let parent_id = parent.sequence_id;
            parent
                .children
                .push(Cluster::new(next, Threshold::Distance(10), names(group), Some(parent_id)).unwrap());
            next += 1;
        }
        ClusterForest {
            root,
            levels: ThresholdLevels::new(vec![20, 10]).unwrap(),
            universe,
            unclustered: Vec::new(),
        }
    }

    fn previous(rows: &[(u32, &str, &[&str])]) -> PreviousRun {
        let mut previous = PreviousRun::default();
        for (threshold, id, members) in rows {
            previous
                .clusters
                .entry(*threshold)
                .or_default()
                .insert(id.to_string(), set(members));
        }
        previous
    }

    #[test]
    fn first_run_allocates_fresh_ids() {
        let forest = forest(&["A", "B", "C", "D"], &[&["A", "B"], &["C", "D"]], &[&["A", "B"]]);
        let mut registry = IdRegistry::new();
        let rec = reconcile(&forest, &PreviousRun::default(), &mut registry);

        assert_eq!(rec.assignments[&1], "000001");
        assert_eq!(rec.assignments[&2], "000002");
        assert_eq!(rec.assignments[&3], "000003");
        assert_eq!(rec.fresh, 3);
        assert!(rec.renames.is_empty());
        assert!(rec.audits.is_empty());
    }

    #[test]
    fn unchanged_input_keeps_every_identifier() {
        let forest = forest(&["A", "B", "C", "D"], &[&["A", "B"], &["C", "D"]], &[&["A", "B"]]);
        let previous = previous(&[
            (20, "000007", &["A", "B"]),
            (20, "000003", &["C", "D"]),
            (10, "000009", &["A", "B"]),
        ]);
        let mut registry = IdRegistry::new();
        let rec = reconcile(&forest, &previous, &mut registry);

        assert_eq!(rec.assignments[&1], "000007");
        assert_eq!(rec.assignments[&2], "000003");
        assert_eq!(rec.assignments[&3], "000009");
        assert_eq!(rec.inherited, 3);
        assert_eq!(rec.fresh, 0);
        assert!(rec.renames.is_empty());
        assert_eq!(rec.count(AuditOutcome::Matched), 3);
        assert!(registry.retired_this_run().is_empty());
    }

    #[test]
    fn decimated_cluster_is_retired_without_collision() {
        let forest = forest(&["D", "E", "F"], &[&["D", "E", "F"]], &[]);
        let previous = previous(&[(20, "000001", &["A", "B", "C"])]);
        let mut registry = IdRegistry::new();
        let rec = reconcile(&forest, &previous, &mut registry);

        let audit = &rec.audits[0];
        assert_eq!(audit.outcome, AuditOutcome::Decimated);
        assert!(audit.surviving.is_empty());
        let successor = audit.successor.clone().unwrap();
        assert_ne!(successor, "000001");
        assert_ne!(successor, rec.assignments[&1]);
        assert_eq!(rec.renames.len(), 1);
        assert_eq!(rec.renames[0].old_id, "000001");
        assert_eq!(rec.renames[0].new_id, successor);
        assert!(registry.is_retired("000001"));
        assert!(!rec.assignments.values().any(|id| id == "000001"));
    }

    #[test]
    fn lone_unclustered_survivor_is_near_decimated() {
        // A is evaluated at 10 (it sits in a 20 cluster) but joins no 10 cluster
        let forest = forest(&["A", "C", "D"], &[&["A", "C", "D"]], &[&["C", "D"]]);
        let previous = previous(&[(10, "000002", &["A", "B"])]);
        let mut registry = IdRegistry::new();
        let rec = reconcile(&forest, &previous, &mut registry);

        let audit = rec.audits.iter().find(|a| a.previous_id == "000002").unwrap();
        assert_eq!(audit.outcome, AuditOutcome::NearDecimated);
        assert_eq!(audit.surviving, names(&["A"]));
        assert!(audit.clustered.is_empty());
        assert!(audit.successor.is_some());
        assert!(registry.is_retired("000002"));
        assert_eq!(rec.renames[0].reason, AuditOutcome::NearDecimated);
    }

    #[test]
    fn lone_clustered_survivor_is_orphaned_and_flagged() {
        // old 000005={A,X} shrank to A, which now sits in {A,B,C}; that
        // cluster keeps 000004 because it overlaps it more
        let forest = forest(&["A", "B", "C"], &[&["A", "B", "C"]], &[]);
        let previous = previous(&[(20, "000004", &["B", "C"]), (20, "000005", &["A", "X"])]);
        let mut registry = IdRegistry::new();
        let rec = reconcile(&forest, &previous, &mut registry);

        assert_eq!(rec.assignments[&1], "000004");
        let audit = rec.audits.iter().find(|a| a.previous_id == "000005").unwrap();
        assert_eq!(audit.outcome, AuditOutcome::OrphanedButPresent);
        assert!(audit.ambiguous);
        assert!(audit.successor.is_none());
        assert_eq!(rec.ambiguous().count(), 1);
        assert!(rec.renames.is_empty());
        assert!(!registry.is_retired("000005"));
    }

    #[test]
    fn continuity_prefers_larger_overlap() {
        let forest = forest(&["A", "B", "C", "D", "E"], &[&["A", "B"], &["C", "D", "E"]], &[]);
        // 000001 overlaps both; {C,D,E} shares more with it
        let previous = previous(&[(20, "000001", &["A", "C", "D"])]);
        let mut registry = IdRegistry::new();
        let rec = reconcile(&forest, &previous, &mut registry);

        assert_eq!(rec.assignments[&2], "000001");
        assert_eq!(rec.assignments[&1], "000002");
        assert_eq!(rec.inherited, 1);
        assert_eq!(rec.fresh, 1);
    }

    #[test]
    fn unknown_previous_threshold_is_ignored() {
        let forest = forest(&["A", "B"], &[&["A", "B"]], &[]);
        let previous = previous(&[(3, "000010", &["A", "B"])]);
        let mut registry = IdRegistry::new();
        let rec = reconcile(&forest, &previous, &mut registry);

        assert!(rec.audits.is_empty());
        // still reserved, so never reissued
        assert_eq!(rec.assignments[&1], "000011");
    }

    #[test]
    fn evaluated_but_unclustered_members_are_decimated() {
        // A and B are still evaluated at 20 but only {C,D} clusters there
        let forest = forest(&["A", "B", "C", "D"], &[&["C", "D"]], &[]);
        let previous = previous(&[(20, "000002", &["A", "B"])]);
        let mut registry = IdRegistry::new();
        let rec = reconcile(&forest, &previous, &mut registry);

        let audit = rec.audits.iter().find(|a| a.previous_id == "000002").unwrap();
        assert_eq!(audit.outcome, AuditOutcome::Decimated);
        assert_eq!(audit.surviving, names(&["A", "B"]));
        assert!(audit.clustered.is_empty());
        assert!(registry.is_retired("000002"));
        assert_eq!(rec.renames.len(), 1);
        assert_eq!(rec.renames[0].reason, AuditOutcome::Decimated);
    }

    #[test]
    fn denylisted_previous_id_is_not_audited_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("denylist.txt");
        std::fs::write(&path, "000003\n").unwrap();

        let forest = forest(&["D", "E"], &[&["D", "E"]], &[]);
        let previous = previous(&[(20, "000003", &["A", "B"])]);
        let mut registry = IdRegistry::with_denylist(&path).unwrap();
        let rec = reconcile(&forest, &previous, &mut registry);

        assert!(rec.audits.is_empty());
        assert!(rec.renames.is_empty());
        assert!(registry.retired_this_run().is_empty());
        assert_eq!(rec.assignments[&1], "000004");
    }
}
