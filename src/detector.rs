//! Change detection. Pure comparisons between the previous and current
//! snapshot of one entity; nothing here touches the network or mutates
//! its inputs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::snapshot::{Holdings, IndexSnapshot};

/// One rebalance within a fund: the position moved by at least the
/// reporting threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalanceEntry {
    pub symbol: String,
    pub old_pct: f64,
    pub new_pct: f64,
    pub delta: f64,
}

/// Classified differences for one fund. A symbol lands in exactly one of
/// the four lists, or in none when it is present on both sides with a move
/// under the threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FundChangeSet {
    /// Not in previous holdings: `(symbol, new_pct)`, largest first.
    pub additions: Vec<(String, f64)>,
    /// No longer held: `(symbol, old_pct)`, largest first.
    pub exits: Vec<(String, f64)>,
    /// Moves of `+threshold` or more, largest delta first.
    pub increases: Vec<RebalanceEntry>,
    /// Moves of `-threshold` or more, most negative delta first.
    pub decreases: Vec<RebalanceEntry>,
}

impl FundChangeSet {
    pub fn has_changes(&self) -> bool {
        !self.additions.is_empty()
            || !self.exits.is_empty()
            || !self.increases.is_empty()
            || !self.decreases.is_empty()
    }
}

/// Membership changes for one index. Any change is reported, no threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Compare one fund's holdings across two snapshots. The threshold is
/// inclusive: a move of exactly `threshold` is reported.
pub fn detect_fund_changes(previous: &Holdings, current: &Holdings, threshold: f64) -> FundChangeSet {
    let mut changes = FundChangeSet::default();

    for (symbol, &new_pct) in current {
        match previous.get(symbol) {
            None => changes.additions.push((symbol.clone(), new_pct)),
            Some(&old_pct) => {
                let delta = new_pct - old_pct;
                if delta.abs() >= threshold {
                    let entry = RebalanceEntry {
                        symbol: symbol.clone(),
                        old_pct,
                        new_pct,
                        delta,
                    };
                    if delta > 0.0 {
                        changes.increases.push(entry);
                    } else {
                        changes.decreases.push(entry);
                    }
                }
            }
        }
    }
    for (symbol, &old_pct) in previous {
        if !current.contains_key(symbol) {
            changes.exits.push((symbol.clone(), old_pct));
        }
    }

    // Presentation order: biggest positions / biggest moves first.
    changes
        .additions
        .sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    changes
        .exits
        .sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    changes
        .increases
        .sort_by(|a, b| b.delta.total_cmp(&a.delta).then_with(|| a.symbol.cmp(&b.symbol)));
    changes
        .decreases
        .sort_by(|a, b| a.delta.total_cmp(&b.delta).then_with(|| a.symbol.cmp(&b.symbol)));

    changes
}

/// Set difference over every index in the current snapshot. Indexes with
/// no membership change are omitted; an index present only in the previous
/// snapshot (no longer monitored) is not reported.
pub fn detect_index_changes(
    previous: &BTreeMap<String, IndexSnapshot>,
    current: &BTreeMap<String, IndexSnapshot>,
) -> BTreeMap<String, IndexChanges> {
    let mut all_changes = BTreeMap::new();

    for (name, curr_members) in current {
        let prev_members = previous.get(name).map(Vec::as_slice).unwrap_or(&[]);

        let mut added: Vec<String> = curr_members
            .iter()
            .filter(|s| !prev_members.contains(s))
            .cloned()
            .collect();
        let mut removed: Vec<String> = prev_members
            .iter()
            .filter(|s| !curr_members.contains(s))
            .cloned()
            .collect();
        added.sort();
        removed.sort();

        if !added.is_empty() || !removed.is_empty() {
            all_changes.insert(name.clone(), IndexChanges { added, removed });
        }
    }
    all_changes
}
