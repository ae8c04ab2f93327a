//! Typed configuration from environment variables.
//!
//! Loaded once at startup and passed explicitly into the pipeline; the
//! core never reads ambient process state. Sensitive values are wrapped
//! in secrecy::SecretString to prevent log leaks.

use std::path::PathBuf;

use secrecy::SecretString;
use tracing::warn;

use crate::error::{Error, Result};
use crate::summary;

/// Which publish target the CLI wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherKind {
    Fs,
    Pages,
    None,
}

#[derive(Debug)]
pub struct Config {
    /// Token for the GitHub source (and the Pages publisher unless
    /// PAGES_TOKEN overrides it).
    pub github_token: Option<SecretString>,
    /// Raw `owner/repo[@branch]` specs from GITHUB_REPOS.
    pub github_repos: Vec<String>,

    pub anthropic_api_key: Option<SecretString>,
    pub summary_model: String,
    pub publish_summaries: bool,

    pub state_file: PathBuf,

    pub publisher: PublisherKind,
    pub publish_out_dir: PathBuf,
    pub publish_base_url: Option<String>,

    pub pages_token: Option<SecretString>,
    pub pages_owner: Option<String>,
    pub pages_repo: Option<String>,
    pub pages_branch: Option<String>,
    pub pages_dir: Option<String>,
    pub pages_site_title: Option<String>,

    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this. Nothing
    /// is strictly required: a config with no source and no publisher
    /// still describes a valid (if quiet) run. Combinations that cannot
    /// work fail fast here: `PUBLISHER=pages` needs owner, repo and a
    /// token.
    pub fn from_env() -> Result<Self> {
        let publisher = match var("PUBLISHER").as_deref() {
            None => PublisherKind::Fs,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "fs" => PublisherKind::Fs,
                "pages" => PublisherKind::Pages,
                "none" => PublisherKind::None,
                other => {
                    warn!(publisher = other, "unknown PUBLISHER, defaulting to fs");
                    PublisherKind::Fs
                }
            },
        };

        let github_token = var("GITHUB_TOKEN").map(SecretString::from);
        let pages_token = var("PAGES_TOKEN").map(SecretString::from);

        let config = Self {
            github_repos: var("GITHUB_REPOS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            github_token,
            anthropic_api_key: var("ANTHROPIC_API_KEY").map(SecretString::from),
            summary_model: var("SUMMARY_MODEL")
                .unwrap_or_else(|| summary::DEFAULT_MODEL.to_string()),
            publish_summaries: var("PUBLISH_SUMMARY")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            state_file: var("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".herald/state.json")),
            publisher,
            publish_out_dir: var("PUBLISH_OUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("updates")),
            publish_base_url: var("PUBLISH_BASE_URL"),
            pages_token,
            pages_owner: var("PAGES_OWNER"),
            pages_repo: var("PAGES_REPO"),
            pages_branch: var("PAGES_BRANCH"),
            pages_dir: var("PAGES_DIR"),
            pages_site_title: var("PAGES_SITE_TITLE"),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        if config.publisher == PublisherKind::Pages {
            if config.pages_owner.is_none() {
                return Err(Error::Config(
                    "PUBLISHER=pages requires PAGES_OWNER".to_string(),
                ));
            }
            if config.pages_repo.is_none() {
                return Err(Error::Config(
                    "PUBLISHER=pages requires PAGES_REPO".to_string(),
                ));
            }
            if config.pages_token.is_none() && config.github_token.is_none() {
                return Err(Error::Config(
                    "PUBLISHER=pages requires PAGES_TOKEN or GITHUB_TOKEN".to_string(),
                ));
            }
        }

        Ok(config)
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
