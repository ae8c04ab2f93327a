//! LLM summarization via rig-core.
//!
//! Best-effort by contract: the pipeline logs and drops any error from
//! here, so the summarizer never has to be defensive about aborting a
//! run.

use rig::client::CompletionClient;
use rig::completion::Prompt;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const PREAMBLE: &str = "You are a helpful social media manager. Write a concise, upbeat \
project status update from the provided context. Target: 1-3 sentences. Be clear and \
specific. Avoid hashtags unless essential. Include key changes (commits, issues, PRs). \
Put a short title on the first line, then the update on the following lines.";

/// A title + summary pair produced from one update draft.
#[derive(Debug, Clone)]
pub struct Summary {
    pub title: Option<String>,
    pub body: String,
}

impl Summary {
    /// Parse a model response: first line is the title, the rest is the
    /// body. A single-line response degrades to a body with no title.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.split_once('\n') {
            Some((first, rest)) if !rest.trim().is_empty() => Self {
                title: Some(first.trim().trim_matches('#').trim().to_string()),
                body: rest.trim().to_string(),
            },
            _ => Self {
                title: None,
                body: text.to_string(),
            },
        }
    }
}

pub struct Summarizer {
    agent: rig::agent::Agent<rig::providers::anthropic::completion::CompletionModel>,
}

impl Summarizer {
    /// Build an Anthropic-backed summarizer from a secret API key.
    pub fn new(api_key: &SecretString, model: &str) -> Result<Self> {
        let client = rig::providers::anthropic::Client::new(api_key.expose_secret())
            .map_err(|e| Error::Summary(format!("failed to create Anthropic client: {e}")))?;
        let agent = client
            .agent(model)
            .preamble(PREAMBLE)
            .temperature(0.5)
            .max_tokens(300)
            .build();
        Ok(Self { agent })
    }

    /// Summarize a draft body, optionally with enriched detail text.
    pub async fn summarize(&self, markdown: &str, details: Option<&str>) -> Result<Summary> {
        let mut prompt = format!("Context markdown:\n\n{markdown}");
        if let Some(details) = details {
            prompt.push_str("\n\n## Details\n\n");
            prompt.push_str(details);
        }

        let text = self
            .agent
            .prompt(prompt)
            .await
            .map_err(|e| Error::Summary(e.to_string()))?;

        Ok(Summary::parse(&text))
    }
}
