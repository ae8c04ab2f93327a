//! GitHub source: issues, pull requests, and commits via the REST API.
//!
//! Pulls everything updated since the cutoff for each configured repo,
//! emits events with stable ids (`gh-<issue id>`, `gh-commit-<sha>`), and
//! maps them to facts. Rate-limit retries happen here, inside the
//! adapter; the pipeline never sees a transient 403/429 that resolved
//! within the retry budget.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{Event, Fact, FactData};
use crate::source::EventSource;

const API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const PER_PAGE: usize = 100;
const MAX_ATTEMPTS: u32 = 3;

/// One repository to watch, parsed from `owner/repo[@branch]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoSpec {
    pub owner: String,
    pub repo: String,
    /// Restricts the commit listing; issues and PRs are branch-agnostic.
    pub branch: Option<String>,
}

impl RepoSpec {
    /// Parse a single `owner/repo[@branch]` entry. Returns `None` for
    /// malformed entries so a bad item in a list degrades to a skip.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let (repo_part, branch) = match raw.split_once('@') {
            Some((r, b)) => (r, Some(b.to_string()).filter(|b| !b.is_empty())),
            None => (raw, None),
        };
        let (owner, repo) = repo_part.split_once('/')?;
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch,
        })
    }

    /// Parse a comma-separated repo list, skipping malformed entries.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',').filter_map(Self::parse).collect()
    }

    fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Controls for [`GitHubSource::fetch_details`] enrichment.
#[derive(Debug, Clone)]
pub struct DetailOptions {
    pub include_bodies: bool,
    pub max_comments: usize,
    pub max_chars: usize,
}

impl Default for DetailOptions {
    fn default() -> Self {
        Self {
            include_bodies: true,
            max_comments: 3,
            max_chars: 2000,
        }
    }
}

pub struct GitHubSource {
    client: reqwest::Client,
    token: SecretString,
    repos: Vec<RepoSpec>,
    details: DetailOptions,
}

impl GitHubSource {
    pub fn new(token: SecretString, repos: Vec<RepoSpec>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            token,
            repos,
            details: DetailOptions::default(),
        })
    }

    pub fn with_detail_options(mut self, details: DetailOptions) -> Self {
        self.details = details;
        self
    }

    /// GET a JSON endpoint with auth headers, retrying rate limits
    /// (403/429) up to [`MAX_ATTEMPTS`] with quadratic backoff.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let mut attempt = 1u32;
        loop {
            let resp = self
                .client
                .get(url)
                .query(query)
                .bearer_auth(self.token.expose_secret())
                .header(USER_AGENT, "herald")
                .header(ACCEPT, "application/vnd.github+json")
                .header("X-GitHub-Api-Version", API_VERSION)
                .send()
                .await?;

            let status = resp.status();
            if status.is_success() {
                return Ok(resp.json().await?);
            }

            let rate_limited =
                status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS;
            if rate_limited && attempt < MAX_ATTEMPTS {
                let backoff = Duration::from_millis(1000 * u64::from(attempt * attempt));
                warn!(%status, attempt, url, "rate limited, backing off");
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Source(format!("GET {url} failed ({status}): {body}")));
        }
    }

    async fn paginate<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        base_query: &[(String, String)],
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        let mut page = 1usize;
        loop {
            let mut query = base_query.to_vec();
            query.push(("per_page".to_string(), PER_PAGE.to_string()));
            query.push(("page".to_string(), page.to_string()));

            let batch: Vec<T> = self.get_json(url, &query).await?;
            let len = batch.len();
            out.extend(batch);
            if len < PER_PAGE {
                return Ok(out);
            }
            page += 1;
        }
    }

    async fn pull_repo(&self, spec: &RepoSpec, since: DateTime<Utc>) -> Result<Vec<Event>> {
        let full = spec.full_name();
        let since_iso = since.to_rfc3339();
        let mut events = Vec::new();

        // Issues and PRs updated since the cutoff. The issues endpoint
        // returns both; PRs carry a `pull_request` marker.
        let issues_url = format!("{API_BASE}/repos/{full}/issues");
        let issues: Vec<IssueItem> = self
            .paginate(
                &issues_url,
                &[
                    ("state".to_string(), "all".to_string()),
                    ("since".to_string(), since_iso.clone()),
                ],
            )
            .await?;

        for item in issues {
            let is_pr = item.pull_request.is_some();
            let kind = if is_pr { "pr_updated" } else { "issue_updated" };
            let occurred_at = item.updated_at.or(item.created_at).unwrap_or(since);
            events.push(Event {
                id: format!("gh-{}", item.id),
                source: "github".to_string(),
                kind: kind.to_string(),
                occurred_at,
                payload: json!({
                    "number": item.number,
                    "title": item.title,
                    "state": item.state,
                    "is_pr": is_pr,
                    "repo": full,
                }),
                url: item.html_url,
            });
        }

        // Commits since the cutoff, optionally restricted to a branch.
        let commits_url = format!("{API_BASE}/repos/{full}/commits");
        let mut query = vec![("since".to_string(), since_iso)];
        if let Some(branch) = &spec.branch {
            query.push(("sha".to_string(), branch.clone()));
        }
        let commits: Vec<CommitItem> = self.paginate(&commits_url, &query).await?;

        for item in commits {
            let occurred_at = item
                .commit
                .author
                .as_ref()
                .and_then(|a| a.date)
                .or_else(|| item.commit.committer.as_ref().and_then(|c| c.date))
                .unwrap_or(since);
            events.push(Event {
                id: format!("gh-commit-{}", item.sha),
                source: "github".to_string(),
                kind: "commit".to_string(),
                occurred_at,
                payload: json!({
                    "sha": item.sha,
                    "message": item.commit.message,
                    "author": item.commit.author.as_ref().and_then(|a| a.name.clone()),
                    "repo": full,
                }),
                url: item.html_url,
            });
        }

        Ok(events)
    }

    async fn detail_for(&self, fact: &Fact) -> Result<Option<String>> {
        let opts = &self.details;
        match &fact.data {
            FactData::Commit {
                sha,
                repo: Some(repo),
                ..
            } => {
                let url = format!("{API_BASE}/repos/{repo}/commits/{sha}");
                let full: CommitFull = self.get_json(&url, &[]).await?;
                let message = trim_to(&full.commit.message, opts.max_chars);
                let stats = full.stats.map(|s| {
                    format!(
                        "\nFiles changed: {} (+{}/-{})",
                        full.files.map(|f| f.len()).unwrap_or_default(),
                        s.additions.unwrap_or_default(),
                        s.deletions.unwrap_or_default(),
                    )
                });
                Ok(Some(format!(
                    "Commit {sha}\n{message}{}",
                    stats.unwrap_or_default()
                )))
            }
            FactData::Issue {
                number: Some(number),
                repo: Some(repo),
                ..
            } => self.item_detail(repo, *number, false).await.map(Some),
            FactData::PullRequest {
                number: Some(number),
                repo: Some(repo),
                ..
            } => self.item_detail(repo, *number, true).await.map(Some),
            _ => Ok(None),
        }
    }

    async fn item_detail(&self, repo: &str, number: u64, is_pr: bool) -> Result<String> {
        let opts = &self.details;
        let url = if is_pr {
            format!("{API_BASE}/repos/{repo}/pulls/{number}")
        } else {
            format!("{API_BASE}/repos/{repo}/issues/{number}")
        };
        let item: ItemDetail = self.get_json(&url, &[]).await?;

        let label = if is_pr { "PR" } else { "Issue" };
        let mut text = format!("{label} #{number}: {}", item.title.unwrap_or_default());
        if opts.include_bodies
            && let Some(body) = item.body.filter(|b| !b.is_empty())
        {
            text.push('\n');
            text.push_str(&trim_to(&body, opts.max_chars));
        }

        if opts.max_comments > 0 {
            let comments_url = format!("{API_BASE}/repos/{repo}/issues/{number}/comments");
            let comments: Vec<CommentItem> = self
                .get_json(
                    &comments_url,
                    &[("per_page".to_string(), opts.max_comments.to_string())],
                )
                .await?;
            if !comments.is_empty() {
                text.push_str("\nRecent comments:");
                for c in comments.iter().rev().take(opts.max_comments).rev() {
                    let login = c
                        .user
                        .as_ref()
                        .and_then(|u| u.login.as_deref())
                        .unwrap_or("user");
                    text.push_str(&format!(
                        "\n- {}: {}",
                        trim_to(login, 40),
                        trim_to(c.body.as_deref().unwrap_or_default(), 300)
                    ));
                }
            }
        }

        Ok(text)
    }
}

#[async_trait]
impl EventSource for GitHubSource {
    fn name(&self) -> &str {
        "github"
    }

    async fn pull_since(&self, since: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for spec in &self.repos {
            let pulled = self.pull_repo(spec, since).await?;
            debug!(repo = %spec.full_name(), events = pulled.len(), "pulled repo");
            events.extend(pulled);
        }
        Ok(events)
    }

    fn to_facts(&self, events: Vec<Event>) -> Vec<Fact> {
        events.into_iter().map(map_event_to_fact).collect()
    }

    async fn fetch_details(&self, facts: &[Fact]) -> HashMap<String, String> {
        let mut details = HashMap::new();
        for fact in facts {
            match self.detail_for(fact).await {
                Ok(Some(text)) => {
                    details.insert(fact.id.clone(), text);
                }
                Ok(None) => {}
                // Details are optional AI context; a failed fetch is not
                // worth failing anything over.
                Err(e) => debug!(fact = %fact.id, "detail fetch skipped: {e}"),
            }
        }
        details
    }
}

/// Convert one raw event into a fact. Pure; the event id becomes the fact
/// id unchanged, which is what makes re-pulls dedup correctly.
pub fn map_event_to_fact(event: Event) -> Fact {
    let payload = &event.payload;

    let (summary, data) = match event.kind.as_str() {
        "commit" => {
            let sha = payload_str(payload, "sha").unwrap_or_default();
            let message = payload_str(payload, "message").unwrap_or_default();
            let first = message.lines().next().unwrap_or_default().to_string();
            let short: String = sha.chars().take(7).collect();
            let summary = if short.is_empty() {
                format!("Commit: {first}")
            } else {
                format!("Commit {short}: {first}")
            };
            (
                summary,
                FactData::Commit {
                    sha,
                    message,
                    author: payload_str(payload, "author"),
                    repo: payload_str(payload, "repo"),
                },
            )
        }
        "issue_updated" | "pr_updated" => {
            let number = payload.get("number").and_then(|v| v.as_u64());
            let title = payload_str(payload, "title");
            let state = payload_str(payload, "state");
            let repo = payload_str(payload, "repo");
            let is_pr = event.kind == "pr_updated";

            let label = if is_pr { "PR" } else { "Issue" };
            let num = number.map(|n| format!(" #{n}")).unwrap_or_default();
            let title_part = title
                .as_deref()
                .map(|t| format!(": {t}"))
                .unwrap_or_default();
            let state_part = state
                .as_deref()
                .map(|s| format!(" [{s}]"))
                .unwrap_or_default();
            let summary = format!("{label}{num}{title_part}{state_part}");

            let data = if is_pr {
                FactData::PullRequest {
                    number,
                    title,
                    state,
                    repo,
                }
            } else {
                FactData::Issue {
                    number,
                    title,
                    state,
                    repo,
                }
            };
            (summary, data)
        }
        other => (
            payload_str(payload, "summary").unwrap_or_else(|| other.to_string()),
            FactData::Other,
        ),
    };

    Fact {
        id: event.id,
        summary,
        occurred_at: event.occurred_at,
        source: event.source,
        url: event.url,
        data,
    }
}

fn payload_str(payload: &serde_json::Value, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn trim_to(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Wire shapes (the subset of the REST responses we read)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IssueItem {
    id: u64,
    number: u64,
    title: Option<String>,
    state: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    html_url: Option<String>,
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    sha: String,
    html_url: Option<String>,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    author: Option<CommitSig>,
    committer: Option<CommitSig>,
}

#[derive(Debug, Deserialize)]
struct CommitSig {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CommitFull {
    commit: CommitDetail,
    stats: Option<CommitStats>,
    files: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct CommitStats {
    additions: Option<u64>,
    deletions: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ItemDetail {
    title: Option<String>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentItem {
    user: Option<UserRef>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    login: Option<String>,
}
