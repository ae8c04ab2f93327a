//! Publishers: where finished update drafts go.
//!
//! Publishing is per-target and idempotent per draft id: re-publishing
//! the same id overwrites rather than duplicates. The pipeline treats a
//! publish failure as a per-batch outcome, never a run abort.

pub mod fs;
pub mod pages;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ProjectState, UpdateDraft};

/// What a publisher reports back for one draft.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Short tag used in logs and run reports.
    fn name(&self) -> &str;

    async fn publish(&self, draft: &UpdateDraft, state: &ProjectState) -> Result<PublishReceipt>;
}

/// Sanitize a draft id for use as a file name or URL path segment.
pub(crate) fn safe_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
