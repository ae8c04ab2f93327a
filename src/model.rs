//! Core data model.
//!
//! A fact is the durable, source-agnostic unit of project history. Events
//! are the raw material facts are made from; drafts are the documents a
//! batch of facts is rendered into. Only `ProjectState` is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A raw occurrence pulled from a source. Ephemeral: consumed immediately
/// by conversion to facts, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Source-scoped unique identifier. Must be stable across repeated
    /// pulls of the same underlying item.
    pub id: String,

    /// Origin tag (e.g., "github").
    pub source: String,

    /// Event category (e.g., "commit", "issue_updated", "pr_updated").
    pub kind: String,

    /// Authoritative time of occurrence.
    pub occurred_at: DateTime<Utc>,

    /// Opaque source-specific data. The source's own `to_facts` is the
    /// only consumer.
    pub payload: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// Fact
// ---------------------------------------------------------------------------

/// The durable unit of project history.
///
/// Two facts with the same `id` are the same historical item regardless of
/// content differences; on merge the later-observed copy wins wholesale.
/// Facts are immutable once produced by a source adapter; only the
/// containing collection mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Globally unique, stable across runs. The primary dedup key.
    pub id: String,

    /// Human-readable one-liner.
    pub summary: String,

    pub occurred_at: DateTime<Utc>,

    /// Origin tag (e.g., "github").
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Structured detail, tagged by kind. Serialized with a flattened
    /// `kind` tag so the persisted shape stays a flat object.
    #[serde(flatten)]
    pub data: FactData,
}

impl Fact {
    /// The fact's kind tag, as it appears in the persisted form.
    pub fn kind(&self) -> &'static str {
        self.data.kind()
    }
}

/// Per-kind structured detail. One payload shape per variant keeps the
/// draft assembler's rendering exhaustive at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactData {
    Commit {
        sha: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repo: Option<String>,
    },
    Issue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        number: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repo: Option<String>,
    },
    PullRequest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        number: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repo: Option<String>,
    },
    /// An event with no structured detail worth modelling. Renders as its
    /// plain summary.
    Other,
}

impl FactData {
    pub fn kind(&self) -> &'static str {
        match self {
            FactData::Commit { .. } => "commit",
            FactData::Issue { .. } => "issue",
            FactData::PullRequest { .. } => "pull_request",
            FactData::Other => "other",
        }
    }
}

// ---------------------------------------------------------------------------
// Update draft
// ---------------------------------------------------------------------------

/// An update document built from one batch of facts. Ephemeral: handed to
/// publishers and then discarded; `ProjectState::last_update` keeps the
/// most recent one for informational purposes only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateDraft {
    /// Derived from the batch's generation timestamp. Unique across drafts
    /// produced in the same run (the orchestrator offsets timestamps per
    /// batch).
    pub id: String,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub markdown: String,

    /// One entry per fact that carries a url, in input order.
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub label: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Project state
// ---------------------------------------------------------------------------

/// The persisted aggregate. Created empty on first run, read at the start
/// of every run, replaced wholesale at the end. One writer per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Timestamp of the last completed run. The default lower bound for
    /// the next pull.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,

    /// Unique by id, ascending by `occurred_at`, ties in stable insertion
    /// order.
    pub facts: Vec<Fact>,

    /// Most recent draft. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<UpdateDraft>,
}
