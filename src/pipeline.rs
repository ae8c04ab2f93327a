//! Pipeline orchestrator: one full run, from pull to publish.
//!
//! The sequencing and failure semantics live here. Pulls are fail-closed
//! (any source error aborts the run before any state write); publishing
//! is fail-open per batch (one bad publish never blocks the rest). State
//! is persisted exactly once per run, after merge/novelty/batch
//! computation and before the first publish attempt, so a crash
//! mid-publish can never cause facts to be re-announced on the next run.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{error, info, warn};

use crate::draft;
use crate::error::Result;
use crate::facts;
use crate::model::{Fact, ProjectState, UpdateDraft};
use crate::publish::{PublishReceipt, Publisher};
use crate::source::EventSource;
use crate::store::StateStore;
use crate::summary::{Summarizer, Summary};
use crate::window::{self, WindowedFact};

/// Per-run knobs. Everything the orchestrator needs arrives explicitly;
/// the core never reads ambient process state.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Batch window span. `None` or non-positive resolves to the 12 h
    /// default.
    pub window: Option<TimeDelta>,
    /// Title applied to every draft produced this run.
    pub title: Option<String>,
    /// Publish a companion summary document per batch when a summarizer
    /// is configured.
    pub publish_summaries: bool,
    /// Injectable run clock; defaults to `Utc::now()`. The run's start
    /// time becomes the persisted `last_run_at`.
    pub now: Option<DateTime<Utc>>,
}

/// Outcome of one publish attempt for one batch.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub publisher: String,
    pub result: std::result::Result<PublishReceipt, String>,
}

/// Everything that happened for one batch.
#[derive(Debug)]
pub struct BatchReport {
    pub draft: UpdateDraft,
    pub fact_count: usize,
    pub outcomes: Vec<PublishOutcome>,
    pub summary: Option<Summary>,
}

/// Structured result of one run, for the caller to log or alert on.
#[derive(Debug)]
pub struct RunReport {
    pub state: ProjectState,
    pub new_fact_count: usize,
    pub batches: Vec<BatchReport>,
}

/// Execute one complete run. Fully independent of any previous
/// invocation: all continuity comes from the state store.
pub async fn run_once(
    sources: &[Box<dyn EventSource>],
    store: &dyn StateStore,
    publishers: &[Box<dyn Publisher>],
    summarizer: Option<&Summarizer>,
    opts: &RunOptions,
) -> Result<RunReport> {
    let now = opts.now.unwrap_or_else(Utc::now);

    // Previous state; absent means first run, corrupt is fatal upstream.
    let prev = store.read_state()?.unwrap_or_default();
    let since = prev.last_run_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    // Pull every source sequentially. Fail-closed: an error here returns
    // before any state write, leaving the previous state authoritative.
    let mut pulled: Vec<Fact> = Vec::new();
    for source in sources {
        let events = source.pull_since(since).await?;
        info!(source = source.name(), events = events.len(), "pulled events");
        pulled.extend(source.to_facts(events));
    }

    let merged = facts::merge(&prev.facts, pulled);
    let new_facts = facts::select_new(&prev.facts, &merged);
    info!(total = merged.len(), new = new_facts.len(), "merged facts");

    // Effective time: a fact that occurred before the cutoff was
    // discovered late and groups with this run, not with a stale window.
    let items: Vec<WindowedFact> = new_facts
        .iter()
        .cloned()
        .map(|fact| {
            let effective_time = if fact.occurred_at < since {
                now
            } else {
                fact.occurred_at
            };
            WindowedFact {
                fact,
                effective_time,
            }
        })
        .collect();
    let batches = window::group_into_batches(items, window::effective_window(opts.window));

    // One draft per batch; generation instants are offset by batch index
    // so ids stay unique within the run.
    let drafts: Vec<UpdateDraft> = batches
        .iter()
        .enumerate()
        .map(|(i, batch)| {
            draft::assemble(
                batch,
                now + TimeDelta::milliseconds(i as i64),
                opts.title.clone(),
            )
        })
        .collect();

    // The commit point: merged facts and the new cutoff are durable
    // before any publish attempt.
    let state = ProjectState {
        last_run_at: Some(now),
        facts: merged,
        last_update: drafts.last().cloned().or(prev.last_update),
    };
    store.write_state(&state)?;

    let mut reports = Vec::with_capacity(drafts.len());
    for (batch, update) in batches.iter().zip(drafts) {
        let outcomes = publish_draft(publishers, &update, &state).await;

        let summary = match summarizer {
            Some(s) => {
                summarize_batch(s, sources, batch, &update, &state, publishers, opts).await
            }
            None => None,
        };

        reports.push(BatchReport {
            fact_count: batch.len(),
            draft: update,
            outcomes,
            summary,
        });
    }

    Ok(RunReport {
        state,
        new_fact_count: new_facts.len(),
        batches: reports,
    })
}

/// Publish one draft to every configured target, sequentially. Failures
/// become per-target outcomes.
async fn publish_draft(
    publishers: &[Box<dyn Publisher>],
    update: &UpdateDraft,
    state: &ProjectState,
) -> Vec<PublishOutcome> {
    let mut outcomes = Vec::with_capacity(publishers.len());
    for publisher in publishers {
        let result = match publisher.publish(update, state).await {
            Ok(receipt) => {
                info!(
                    publisher = publisher.name(),
                    draft = %update.id,
                    url = receipt.url.as_deref().unwrap_or("-"),
                    "published"
                );
                Ok(receipt)
            }
            Err(e) => {
                error!(publisher = publisher.name(), draft = %update.id, "publish failed: {e}");
                Err(e.to_string())
            }
        };
        outcomes.push(PublishOutcome {
            publisher: publisher.name().to_string(),
            result,
        });
    }
    outcomes
}

/// Best-effort summarization for one batch: enrich with source details,
/// ask the model, optionally publish the companion document. Every
/// failure on this path is logged and dropped.
async fn summarize_batch(
    summarizer: &Summarizer,
    sources: &[Box<dyn EventSource>],
    batch: &[Fact],
    update: &UpdateDraft,
    state: &ProjectState,
    publishers: &[Box<dyn Publisher>],
    opts: &RunOptions,
) -> Option<Summary> {
    let details = collect_details(sources, batch).await;

    let summary = match summarizer.summarize(&update.markdown, details.as_deref()).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(draft = %update.id, "summarization failed: {e}");
            return None;
        }
    };

    if opts.publish_summaries {
        let title = summary.title.clone().unwrap_or_else(|| {
            format!(
                "{} - AI Summary",
                update.title.as_deref().unwrap_or("Update")
            )
        });
        let companion = UpdateDraft {
            id: format!("{}-summary", update.id),
            created_at: update.created_at,
            title: Some(title),
            markdown: format!("# AI Summary\n\n{}\n", summary.body),
            citations: Vec::new(),
        };
        for publisher in publishers {
            if let Err(e) = publisher.publish(&companion, state).await {
                warn!(publisher = publisher.name(), draft = %companion.id, "summary publish failed: {e}");
            }
        }
    }

    Some(summary)
}

/// Gather per-fact detail text from every source, rendered as one
/// markdown block in batch order.
async fn collect_details(sources: &[Box<dyn EventSource>], batch: &[Fact]) -> Option<String> {
    let mut by_id = std::collections::HashMap::new();
    for source in sources {
        by_id.extend(source.fetch_details(batch).await);
    }
    if by_id.is_empty() {
        return None;
    }

    let mut blocks = Vec::new();
    for fact in batch {
        if let Some(text) = by_id.get(&fact.id) {
            blocks.push(format!("### {}\n\n{text}\n", fact.summary));
        }
    }
    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n"))
    }
}
