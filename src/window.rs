//! Window grouper: partitions new facts into time-bounded batches.
//!
//! Grouping decisions use an *effective time* supplied by the caller, not
//! the fact's own `occurred_at`. The pipeline assigns a late-discovered
//! fact (occurred before the run's cutoff) the current run time, so it
//! groups with the facts of this run instead of vanishing into a stale
//! window far in the past.

use chrono::{DateTime, TimeDelta, Utc};

use crate::model::Fact;

/// Default window span when the caller supplies none (or a non-positive
/// override).
pub fn default_window() -> TimeDelta {
    TimeDelta::hours(12)
}

/// Resolve a requested window against the default. Non-positive requests
/// are ignored in favor of the default; a window of zero or less would
/// put every fact in its own batch.
pub fn effective_window(requested: Option<TimeDelta>) -> TimeDelta {
    match requested {
        Some(w) if w > TimeDelta::zero() => w,
        Some(_) | None => default_window(),
    }
}

/// A fact paired with the timestamp used for windowing decisions.
#[derive(Debug, Clone)]
pub struct WindowedFact {
    pub fact: Fact,
    pub effective_time: DateTime<Utc>,
}

/// Partition facts into ordered, non-empty batches bounded by `window`.
///
/// Greedy forward scan: a new batch starts at the first ungrouped item;
/// an item joins the current batch iff its effective time is within
/// `window` of the batch's *first* item (inclusive). Windows are anchored
/// to the batch's first item, not rolled forward per item, so a batch's
/// span is bounded by exactly `window`.
///
/// Items are sorted internally by effective time (stable) as a
/// precondition-enforcing step; callers may pass unsorted input. The
/// algorithm reads no clock and uses no randomness: identical input
/// yields identical batch boundaries.
pub fn group_into_batches(mut items: Vec<WindowedFact>, window: TimeDelta) -> Vec<Vec<Fact>> {
    let window = effective_window(Some(window));
    items.sort_by_key(|item| item.effective_time);

    let mut batches: Vec<Vec<Fact>> = Vec::new();
    let mut current: Vec<Fact> = Vec::new();
    let mut anchor: Option<DateTime<Utc>> = None;

    for item in items {
        match anchor {
            Some(start) if item.effective_time - start <= window => {
                current.push(item.fact);
            }
            _ => {
                if !current.is_empty() {
                    batches.push(std::mem::take(&mut current));
                }
                anchor = Some(item.effective_time);
                current.push(item.fact);
            }
        }
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
