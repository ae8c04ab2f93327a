//! GitHub Pages publisher: drafts become Jekyll collection items.
//!
//! Writes each draft to `_<dir>/<safe-id>.md` on the target branch via
//! the contents API. Create-or-update semantics come from the existing
//! file's blob sha, which is what makes republishing a draft id
//! overwrite instead of duplicate. On first use the target branch is
//! bootstrapped from the default branch and a minimal `_config.yml` is
//! put in place so the collection renders.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{ProjectState, UpdateDraft};
use crate::publish::{PublishReceipt, Publisher, safe_id};

const API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

pub struct PagesConfig {
    pub token: SecretString,
    pub owner: String,
    pub repo: String,
    /// Default: `gh-pages`.
    pub branch: Option<String>,
    /// Collection directory, default `updates`. Leading `_`/`/` stripped;
    /// the collection source prefix is added internally.
    pub dir: Option<String>,
    /// Overrides the derived `https://<owner>.github.io/<repo>/...` URL.
    pub base_url: Option<String>,
    pub site_title: Option<String>,
}

pub struct PagesPublisher {
    client: reqwest::Client,
    token: SecretString,
    owner: String,
    repo: String,
    branch: String,
    dir: String,
    base_url: Option<String>,
}

impl PagesPublisher {
    /// Validate config, bootstrap the branch and Jekyll scaffold, and
    /// return a ready publisher.
    pub async fn connect(config: PagesConfig) -> Result<Self> {
        if config.owner.is_empty() {
            return Err(Error::Config(
                "pages publisher: missing owner (set PAGES_OWNER)".to_string(),
            ));
        }
        if config.repo.is_empty() {
            return Err(Error::Config(
                "pages publisher: missing repo (set PAGES_REPO)".to_string(),
            ));
        }
        let branch = config.branch.unwrap_or_else(|| "gh-pages".to_string());
        if branch.trim().is_empty() {
            return Err(Error::Config(
                "pages publisher: invalid branch (set PAGES_BRANCH, e.g. gh-pages)".to_string(),
            ));
        }
        let dir = config
            .dir
            .unwrap_or_else(|| "updates".to_string())
            .trim_start_matches(['_', '/'])
            .to_string();

        let publisher = Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            token: config.token,
            owner: config.owner,
            repo: config.repo,
            branch,
            dir,
            base_url: config.base_url,
        };

        publisher.ensure_branch().await?;
        publisher
            .ensure_file(
                "_config.yml",
                &format!(
                    "title: {}\ntheme: jekyll-theme-cayman\ncollections:\n  {}:\n    output: true\nmarkdown: kramdown\n",
                    config.site_title.as_deref().unwrap_or("Updates"),
                    publisher.dir,
                ),
            )
            .await?;

        Ok(publisher)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(self.token.expose_secret())
            .header(USER_AGENT, "herald")
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Map an HTTP failure to an actionable publish error.
    fn explain(&self, status: StatusCode, doing: &str) -> Error {
        let mut help = format!(
            "failed to {doing} in {}/{}.",
            self.owner, self.repo
        );
        match status.as_u16() {
            401 => help.push_str(" Unauthorized token: verify PAGES_TOKEN/GITHUB_TOKEN."),
            403 => help.push_str(
                " Forbidden: the token needs contents write permission on this repository.",
            ),
            404 => help.push_str(" Not found: verify the repository and branch exist and the token can access them."),
            409 => help.push_str(" Conflict updating the file or branch: re-run to retry."),
            422 => help.push_str(
                " Unprocessable: branch protection or invalid parameters may be blocking writes.",
            ),
            code => help.push_str(&format!(" HTTP {code}.")),
        }
        Error::Publish(help)
    }

    async fn ensure_branch(&self) -> Result<()> {
        let ref_url = format!(
            "{API_BASE}/repos/{}/{}/git/ref/heads/{}",
            self.owner, self.repo, self.branch
        );
        let resp = self.request(reqwest::Method::GET, &ref_url).send().await?;
        match resp.status() {
            s if s.is_success() => return Ok(()),
            StatusCode::NOT_FOUND => {}
            s => return Err(self.explain(s, &format!("read branch '{}'", self.branch))),
        }

        // Branch missing: create it from the default branch's head.
        let repo_url = format!("{API_BASE}/repos/{}/{}", self.owner, self.repo);
        let resp = self.request(reqwest::Method::GET, &repo_url).send().await?;
        if !resp.status().is_success() {
            return Err(self.explain(resp.status(), "read repository metadata"));
        }
        let repo_info: RepoInfo = resp.json().await?;

        let base_url = format!(
            "{API_BASE}/repos/{}/{}/git/ref/heads/{}",
            self.owner, self.repo, repo_info.default_branch
        );
        let resp = self.request(reqwest::Method::GET, &base_url).send().await?;
        if !resp.status().is_success() {
            return Err(self.explain(
                resp.status(),
                &format!("read default branch '{}'", repo_info.default_branch),
            ));
        }
        let base_ref: GitRef = resp.json().await?;

        let create_url = format!("{API_BASE}/repos/{}/{}/git/refs", self.owner, self.repo);
        let resp = self
            .request(reqwest::Method::POST, &create_url)
            .json(&json!({
                "ref": format!("refs/heads/{}", self.branch),
                "sha": base_ref.object.sha,
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.explain(resp.status(), &format!("create branch '{}'", self.branch)));
        }
        info!(branch = %self.branch, "bootstrapped pages branch");
        Ok(())
    }

    /// The blob sha of an existing file, or `None` when absent.
    async fn file_sha(&self, path: &str) -> Result<Option<String>> {
        let url = format!(
            "{API_BASE}/repos/{}/{}/contents/{path}",
            self.owner, self.repo
        );
        let resp = self
            .request(reqwest::Method::GET, &url)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => {
                let file: ContentFile = resp.json().await?;
                Ok(Some(file.sha))
            }
            StatusCode::NOT_FOUND => Ok(None),
            s => Err(self.explain(s, &format!("read existing file {path}"))),
        }
    }

    async fn put_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<()> {
        let url = format!(
            "{API_BASE}/repos/{}/{}/contents/{path}",
            self.owner, self.repo
        );
        let mut body = json!({
            "message": message,
            "content": BASE64.encode(content),
            "branch": self.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }
        let resp = self
            .request(reqwest::Method::PUT, &url)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.explain(resp.status(), &format!("write file {path}")));
        }
        Ok(())
    }

    /// Write a scaffold file only when it does not exist yet.
    async fn ensure_file(&self, path: &str, content: &str) -> Result<()> {
        if self.file_sha(path).await?.is_some() {
            return Ok(());
        }
        self.put_file(path, content, &format!("herald: bootstrap {path}"), None)
            .await
    }

    fn public_url(&self, file_stem: &str) -> String {
        // Jekyll renders HTML pages regardless of the source extension.
        match &self.base_url {
            Some(base) => format!("{}/{file_stem}.html", base.trim_end_matches('/')),
            None => format!(
                "https://{}.github.io/{}/{}/{file_stem}.html",
                self.owner, self.repo, self.dir
            ),
        }
    }
}

#[async_trait]
impl Publisher for PagesPublisher {
    fn name(&self) -> &str {
        "pages"
    }

    async fn publish(&self, draft: &UpdateDraft, _state: &ProjectState) -> Result<PublishReceipt> {
        let stem = safe_id(&draft.id);
        let path = format!("_{}/{stem}.md", self.dir);
        let kind = if draft.id.ends_with("-summary") {
            "summary"
        } else {
            "update"
        };

        let quote = |s: &str| s.replace('"', "\\\"");
        let mut frontmatter = vec![
            "---".to_string(),
            format!("id: \"{}\"", quote(&draft.id)),
            format!("kind: {kind}"),
        ];
        if let Some(title) = &draft.title {
            frontmatter.push(format!("title: \"{}\"", quote(title)));
        }
        let created = draft.created_at.to_rfc3339();
        frontmatter.push(format!("createdAt: \"{created}\""));
        frontmatter.push(format!("date: \"{created}\""));
        frontmatter.push(format!("permalink: {}/{stem}.html", self.dir));
        if !draft.citations.is_empty() {
            frontmatter.push(format!("citations: {}", draft.citations.len()));
        }
        frontmatter.push("---".to_string());
        frontmatter.push(String::new());

        let title_block = draft
            .title
            .as_ref()
            .map(|t| format!("# {t}\n\n"))
            .unwrap_or_default();
        let content = format!("{}{title_block}{}", frontmatter.join("\n"), draft.markdown);

        let sha = self.file_sha(&path).await?;
        self.put_file(
            &path,
            &content,
            &format!("herald: publish {}", draft.id),
            sha.as_deref(),
        )
        .await?;

        Ok(PublishReceipt {
            id: draft.id.clone(),
            url: Some(self.public_url(&stem)),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentFile {
    sha: String,
}
