//! Filesystem publisher: one markdown file per draft.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ProjectState, UpdateDraft};
use crate::publish::{PublishReceipt, Publisher, safe_id};

/// Writes drafts as `<out_dir>/<safe-id>.md` with a small frontmatter
/// block. Same id, same file: republish overwrites.
pub struct DirPublisher {
    out_dir: PathBuf,
    /// When set, receipts carry `<base_url>/<file>` as the public URL.
    base_url: Option<String>,
}

impl DirPublisher {
    pub fn new(out_dir: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            base_url,
        }
    }
}

#[async_trait]
impl Publisher for DirPublisher {
    fn name(&self) -> &str {
        "fs"
    }

    async fn publish(&self, draft: &UpdateDraft, _state: &ProjectState) -> Result<PublishReceipt> {
        let file_name = format!("{}.md", safe_id(&draft.id));
        std::fs::create_dir_all(&self.out_dir)?;

        let mut frontmatter = vec!["---".to_string(), format!("id: {}", draft.id)];
        if let Some(title) = &draft.title {
            frontmatter.push(format!("title: {title}"));
        }
        frontmatter.push(format!("createdAt: {}", draft.created_at.to_rfc3339()));
        if !draft.citations.is_empty() {
            frontmatter.push(format!("citations: {}", draft.citations.len()));
        }
        frontmatter.push("---".to_string());
        frontmatter.push(String::new());

        let content = format!("{}{}\n", frontmatter.join("\n"), draft.markdown);
        std::fs::write(self.out_dir.join(&file_name), content)?;

        let url = self
            .base_url
            .as_ref()
            .map(|base| format!("{}/{file_name}", base.trim_end_matches('/')));
        Ok(PublishReceipt {
            id: draft.id.clone(),
            url,
        })
    }
}
