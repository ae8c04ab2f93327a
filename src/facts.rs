//! Merge engine and novelty selector.
//!
//! Pure functions over fact collections: no I/O, no clock, no side
//! effects. The pipeline owns when they run; these own what the canonical
//! fact list and the "new this run" set mean.

use std::collections::{HashMap, HashSet};

use crate::model::Fact;

/// Merge freshly pulled facts into the known history.
///
/// Id-keyed, last-write-wins: an incoming fact with a known id replaces
/// the existing copy wholesale (content, timestamp and all), keeping the
/// position of the first observation until the final sort. Output is the
/// canonical order: ascending `occurred_at`, ties in stable insertion
/// order.
///
/// Idempotent: `merge(&merge(a, b), b) == merge(a, b)`.
///
/// A replaced fact whose `occurred_at` changed between observations moves
/// in the canonical list. That is the contract, not a defect: the later
/// pull's timestamp is authoritative.
pub fn merge(existing: &[Fact], incoming: Vec<Fact>) -> Vec<Fact> {
    let mut out: Vec<Fact> = existing.to_vec();
    let mut index: HashMap<String, usize> = out
        .iter()
        .enumerate()
        .map(|(i, f)| (f.id.clone(), i))
        .collect();

    for fact in incoming {
        match index.get(&fact.id) {
            Some(&i) => out[i] = fact,
            None => {
                index.insert(fact.id.clone(), out.len());
                out.push(fact);
            }
        }
    }

    // Stable sort: equal timestamps keep insertion order.
    out.sort_by_key(|f| f.occurred_at);
    out
}

/// Select the facts that are new for this run.
///
/// New means the id was absent from the previous state. Membership is on
/// id, never on timestamp comparison: a backfilled fact that occurred
/// before the last cutoff but is only discovered now is still new, and
/// must be reported exactly once.
///
/// `merged` is expected in canonical order (the output of [`merge`]), so
/// the selection inherits ascending `occurred_at` order.
pub fn select_new(prev: &[Fact], merged: &[Fact]) -> Vec<Fact> {
    let known: HashSet<&str> = prev.iter().map(|f| f.id.as_str()).collect();
    merged
        .iter()
        .filter(|f| !known.contains(f.id.as_str()))
        .cloned()
        .collect()
}
