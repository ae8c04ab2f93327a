//! Pipeline orchestration: sequencing, failure semantics, commit point.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use herald::error::{Error, Result};
use herald::model::{Event, Fact, FactData, ProjectState, UpdateDraft};
use herald::pipeline::{RunOptions, run_once};
use herald::publish::{PublishReceipt, Publisher};
use herald::source::EventSource;
use herald::store::{MemoryStateStore, StateStore};

fn ts(iso: &str) -> DateTime<Utc> {
    iso.parse().unwrap()
}

fn fact(id: &str, occurred_at: &str) -> Fact {
    Fact {
        id: id.to_string(),
        summary: format!("Did {id}"),
        occurred_at: ts(occurred_at),
        source: "static".to_string(),
        url: None,
        data: FactData::Other,
    }
}

/// Source that always converts to the same canned facts.
struct StaticSource {
    facts: Vec<Fact>,
}

#[async_trait]
impl EventSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn pull_since(&self, _since: DateTime<Utc>) -> Result<Vec<Event>> {
        Ok(self
            .facts
            .iter()
            .map(|f| Event {
                id: f.id.clone(),
                source: f.source.clone(),
                kind: f.kind().to_string(),
                occurred_at: f.occurred_at,
                payload: serde_json::Value::Null,
                url: f.url.clone(),
            })
            .collect())
    }

    fn to_facts(&self, events: Vec<Event>) -> Vec<Fact> {
        let _ = events;
        self.facts.clone()
    }
}

struct FailingSource;

#[async_trait]
impl EventSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    async fn pull_since(&self, _since: DateTime<Utc>) -> Result<Vec<Event>> {
        Err(Error::Source("remote unavailable".to_string()))
    }

    fn to_facts(&self, _events: Vec<Event>) -> Vec<Fact> {
        Vec::new()
    }
}

/// Publisher that records every draft id it sees.
struct RecordingPublisher {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(&self, draft: &UpdateDraft, _state: &ProjectState) -> Result<PublishReceipt> {
        self.seen.lock().unwrap().push(draft.id.clone());
        Ok(PublishReceipt {
            id: draft.id.clone(),
            url: None,
        })
    }
}

struct FailingPublisher;

#[async_trait]
impl Publisher for FailingPublisher {
    fn name(&self) -> &str {
        "failing"
    }

    async fn publish(&self, _draft: &UpdateDraft, _state: &ProjectState) -> Result<PublishReceipt> {
        Err(Error::Publish("target down".to_string()))
    }
}

fn sources(facts: Vec<Fact>) -> Vec<Box<dyn EventSource>> {
    vec![Box::new(StaticSource { facts })]
}

fn opts_at(now: &str) -> RunOptions {
    RunOptions {
        now: Some(ts(now)),
        ..RunOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_run_merges_groups_and_persists() {
    let store = MemoryStateStore::new();
    let srcs = sources(vec![
        fact("f1", "2024-03-01T00:00:00Z"),
        fact("f2", "2024-03-01T01:00:00Z"),
    ]);

    let report = run_once(&srcs, &store, &[], None, &opts_at("2024-03-02T00:00:00Z"))
        .await
        .unwrap();

    assert_eq!(report.new_fact_count, 2);
    assert_eq!(report.batches.len(), 1);
    assert_eq!(report.batches[0].fact_count, 2);

    let state = store.read_state().unwrap().unwrap();
    assert_eq!(state.facts.len(), 2);
    assert_eq!(state.last_run_at, Some(ts("2024-03-02T00:00:00Z")));
    assert!(state.last_update.is_some());
}

#[tokio::test]
async fn second_run_reports_only_unseen_ids() {
    let store = MemoryStateStore::new();

    let run1 = sources(vec![
        fact("f1", "2024-03-01T00:00:00Z"),
        fact("f2", "2024-03-01T01:00:00Z"),
    ]);
    run_once(&run1, &store, &[], None, &opts_at("2024-03-01T06:00:00Z"))
        .await
        .unwrap();

    // Second pull returns everything again plus one genuinely new fact.
    let run2 = sources(vec![
        fact("f1", "2024-03-01T00:00:00Z"),
        fact("f2", "2024-03-01T01:00:00Z"),
        fact("f3", "2024-03-01T20:00:00Z"),
    ]);
    let report = run_once(&run2, &store, &[], None, &opts_at("2024-03-02T00:00:00Z"))
        .await
        .unwrap();

    assert_eq!(report.new_fact_count, 1);
    assert_eq!(report.batches.len(), 1);
    assert_eq!(report.batches[0].fact_count, 1);
    assert_eq!(store.read_state().unwrap().unwrap().facts.len(), 3);
}

#[tokio::test]
async fn late_discovered_fact_groups_with_the_current_run() {
    let store = MemoryStateStore::new();

    // Establish a cutoff.
    run_once(
        &sources(vec![fact("f1", "2024-03-01T00:00:00Z")]),
        &store,
        &[],
        None,
        &opts_at("2024-03-01T06:00:00Z"),
    )
    .await
    .unwrap();

    // Backfilled fact older than the cutoff + a current one. With the
    // effective-time rule both land in one batch; without it the 30-day
    // gap would split them.
    let run2 = sources(vec![
        fact("f1", "2024-03-01T00:00:00Z"),
        fact("backfill", "2024-02-01T00:00:00Z"),
        fact("fresh", "2024-03-01T11:00:00Z"),
    ]);
    let report = run_once(&run2, &store, &[], None, &opts_at("2024-03-01T12:00:00Z"))
        .await
        .unwrap();

    assert_eq!(report.new_fact_count, 2);
    assert_eq!(report.batches.len(), 1);
    assert_eq!(report.batches[0].fact_count, 2);
}

#[tokio::test]
async fn distant_facts_split_into_multiple_batches_with_unique_draft_ids() {
    let store = MemoryStateStore::new();
    let srcs = sources(vec![
        fact("f1", "2024-03-01T00:00:00Z"),
        fact("f2", "2024-03-02T00:00:00Z"),
    ]);

    let report = run_once(&srcs, &store, &[], None, &opts_at("2024-03-03T00:00:00Z"))
        .await
        .unwrap();

    assert_eq!(report.batches.len(), 2);
    assert_ne!(report.batches[0].draft.id, report.batches[1].draft.id);
}

// ---------------------------------------------------------------------------
// Failure semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn source_failure_aborts_before_any_state_write() {
    let store = MemoryStateStore::new();
    let seeded = ProjectState {
        last_run_at: Some(ts("2024-03-01T00:00:00Z")),
        facts: vec![fact("f1", "2024-02-29T00:00:00Z")],
        last_update: None,
    };
    store.write_state(&seeded).unwrap();

    let srcs: Vec<Box<dyn EventSource>> = vec![
        Box::new(StaticSource {
            facts: vec![fact("f2", "2024-03-01T01:00:00Z")],
        }),
        Box::new(FailingSource),
    ];
    let result = run_once(&srcs, &store, &[], None, &opts_at("2024-03-02T00:00:00Z")).await;

    assert!(matches!(result, Err(Error::Source(_))));
    // Previous state remains authoritative.
    assert_eq!(store.read_state().unwrap(), Some(seeded));
}

#[tokio::test]
async fn publish_failure_does_not_block_other_targets_or_state() {
    let store = MemoryStateStore::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let publishers: Vec<Box<dyn Publisher>> = vec![
        Box::new(FailingPublisher),
        Box::new(RecordingPublisher {
            seen: Arc::clone(&seen),
        }),
    ];

    // Two batches, both published despite the failing target.
    let srcs = sources(vec![
        fact("f1", "2024-03-01T00:00:00Z"),
        fact("f2", "2024-03-02T00:00:00Z"),
    ]);
    let report = run_once(
        &srcs,
        &store,
        &publishers,
        None,
        &opts_at("2024-03-03T00:00:00Z"),
    )
    .await
    .unwrap();

    assert_eq!(report.batches.len(), 2);
    for batch in &report.batches {
        assert!(batch.outcomes[0].result.is_err());
        assert!(batch.outcomes[1].result.is_ok());
    }
    assert_eq!(seen.lock().unwrap().len(), 2);

    // Facts committed regardless of publish outcomes.
    assert_eq!(store.read_state().unwrap().unwrap().facts.len(), 2);
}

#[tokio::test]
async fn empty_pull_still_advances_the_cutoff() {
    let store = MemoryStateStore::new();

    let report = run_once(
        &sources(Vec::new()),
        &store,
        &[],
        None,
        &opts_at("2024-03-02T00:00:00Z"),
    )
    .await
    .unwrap();

    assert_eq!(report.new_fact_count, 0);
    assert!(report.batches.is_empty());
    let state = store.read_state().unwrap().unwrap();
    assert_eq!(state.last_run_at, Some(ts("2024-03-02T00:00:00Z")));
}

#[tokio::test]
async fn corrupt_state_aborts_the_run() {
    // A store whose read fails must abort before pulls run.
    struct CorruptStore;
    impl StateStore for CorruptStore {
        fn read_state(&self) -> Result<Option<ProjectState>> {
            Err(Error::State("bad schema".to_string()))
        }
        fn write_state(&self, _state: &ProjectState) -> Result<()> {
            panic!("write must not be reached");
        }
    }

    let result = run_once(
        &sources(vec![fact("f1", "2024-03-01T00:00:00Z")]),
        &CorruptStore,
        &[],
        None,
        &opts_at("2024-03-02T00:00:00Z"),
    )
    .await;

    assert!(matches!(result, Err(Error::State(_))));
}

#[tokio::test]
async fn rerun_with_stale_cutoff_is_safely_idempotent() {
    // Crash-after-publish simulation: a run whose state write happened is
    // followed by a re-pull of the same facts. Nothing is new again.
    let store = MemoryStateStore::new();
    let srcs = sources(vec![fact("f1", "2024-03-01T00:00:00Z")]);

    run_once(&srcs, &store, &[], None, &opts_at("2024-03-01T06:00:00Z"))
        .await
        .unwrap();
    let report = run_once(&srcs, &store, &[], None, &opts_at("2024-03-01T07:00:00Z"))
        .await
        .unwrap();

    assert_eq!(report.new_fact_count, 0);
    assert!(report.batches.is_empty());
}

// ---------------------------------------------------------------------------
// Window override
// ---------------------------------------------------------------------------

#[tokio::test]
async fn window_override_changes_batch_boundaries() {
    let store = MemoryStateStore::new();
    let srcs = sources(vec![
        fact("f1", "2024-03-01T00:00:00Z"),
        fact("f2", "2024-03-01T02:00:00Z"),
    ]);

    let narrow = RunOptions {
        window: Some(TimeDelta::hours(1)),
        now: Some(ts("2024-03-02T00:00:00Z")),
        ..RunOptions::default()
    };
    let report = run_once(&srcs, &store, &[], None, &narrow).await.unwrap();

    assert_eq!(report.batches.len(), 2);
}
