//! Event sources: where raw activity comes from.
//!
//! A source pulls events for a time range and converts them to facts.
//! Retries for transient failures (rate limits) live inside the source;
//! the pipeline treats any pull error as fatal for the run.

pub mod github;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Event, Fact};

/// Pull + convert contract for one source.
///
/// Implementations must produce stable event and fact ids across repeated
/// pulls of the same underlying item; dedup correctness depends on it.
/// `pull_since` must accept the epoch (first run).
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Short tag used in logs and fact provenance.
    fn name(&self) -> &str;

    /// Pull raw events that occurred (or changed) since the cutoff.
    async fn pull_since(&self, since: DateTime<Utc>) -> Result<Vec<Event>>;

    /// Convert pulled events to facts. Pure.
    fn to_facts(&self, events: Vec<Event>) -> Vec<Fact>;

    /// Fetch richer per-fact detail text, keyed by fact id. Optional AI
    /// context: per-item failures are swallowed, a source with nothing to
    /// add returns an empty map.
    async fn fetch_details(&self, facts: &[Fact]) -> HashMap<String, String> {
        let _ = facts;
        HashMap::new()
    }
}
