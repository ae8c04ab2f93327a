//! herald CLI: operator interface to the update bot.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use herald::config::{Config, PublisherKind};
use herald::pipeline::{self, RunOptions, RunReport};
use herald::publish::Publisher;
use herald::publish::fs::DirPublisher;
use herald::publish::pages::{PagesConfig, PagesPublisher};
use herald::source::EventSource;
use herald::source::github::{GitHubSource, RepoSpec};
use herald::store::{FileStateStore, StateStore};
use herald::summary::Summarizer;
use herald::telemetry::init_telemetry;
use serde_json::json;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "herald", about = "Project-update bot: fact history in, published updates out")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull sources, record new facts, publish update drafts
    Run {
        /// Batch window in hours (must be positive; default 12)
        #[arg(long)]
        window_hours: Option<i64>,
        /// Skip the LLM summary step
        #[arg(long)]
        no_summary: bool,
    },
    /// Run repeatedly on a fixed interval
    Watch {
        /// Minutes between runs
        #[arg(long, default_value_t = 60)]
        interval_minutes: u64,
        /// Batch window in hours (must be positive; default 12)
        #[arg(long)]
        window_hours: Option<i64>,
        /// Skip the LLM summary step
        #[arg(long)]
        no_summary: bool,
    },
    /// Fact log operations
    Facts {
        #[command(subcommand)]
        action: FactsAction,
    },
}

#[derive(Subcommand)]
enum FactsAction {
    /// List persisted facts
    List {
        /// Maximum facts to show (most recent first)
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_telemetry(&config.log_level)?;

    match cli.command {
        Command::Run {
            window_hours,
            no_summary,
        } => {
            let report = run_once(&config, window_hours, no_summary).await?;
            print_report(&report)?;
        }
        Command::Watch {
            interval_minutes,
            window_hours,
            no_summary,
        } => {
            cmd_watch(&config, interval_minutes, window_hours, no_summary).await?;
        }
        Command::Facts { action } => match action {
            FactsAction::List { limit } => cmd_facts_list(&config, limit)?,
        },
    }

    Ok(())
}

/// Wire up the configured collaborators and execute one pipeline run.
async fn run_once(
    config: &Config,
    window_hours: Option<i64>,
    no_summary: bool,
) -> anyhow::Result<RunReport> {
    let mut sources: Vec<Box<dyn EventSource>> = Vec::new();
    if let Some(token) = &config.github_token
        && !config.github_repos.is_empty()
    {
        let repos: Vec<RepoSpec> = config
            .github_repos
            .iter()
            .filter_map(|raw| {
                let spec = RepoSpec::parse(raw);
                if spec.is_none() {
                    warn!(entry = raw.as_str(), "skipping malformed GITHUB_REPOS entry");
                }
                spec
            })
            .collect();
        sources.push(Box::new(GitHubSource::new(token.clone(), repos)?));
    }
    if sources.is_empty() {
        warn!("no sources configured (set GITHUB_TOKEN and GITHUB_REPOS)");
    }

    let mut publishers: Vec<Box<dyn Publisher>> = Vec::new();
    match config.publisher {
        PublisherKind::Fs => {
            publishers.push(Box::new(DirPublisher::new(
                &config.publish_out_dir,
                config.publish_base_url.clone(),
            )));
        }
        PublisherKind::Pages => {
            let token = config
                .pages_token
                .clone()
                .or_else(|| config.github_token.clone())
                .ok_or_else(|| anyhow::anyhow!("pages publisher needs PAGES_TOKEN or GITHUB_TOKEN"))?;
            let pages = PagesPublisher::connect(PagesConfig {
                token,
                owner: config.pages_owner.clone().unwrap_or_default(),
                repo: config.pages_repo.clone().unwrap_or_default(),
                branch: config.pages_branch.clone(),
                dir: config.pages_dir.clone(),
                base_url: config.publish_base_url.clone(),
                site_title: config.pages_site_title.clone(),
            })
            .await?;
            publishers.push(Box::new(pages));
        }
        PublisherKind::None => {}
    }

    let summarizer = match (&config.anthropic_api_key, no_summary) {
        (Some(key), false) => Some(Summarizer::new(key, &config.summary_model)?),
        _ => None,
    };

    let store = FileStateStore::new(&config.state_file);
    let opts = RunOptions {
        window: window_hours.map(chrono::TimeDelta::hours),
        title: Some("Project Update".to_string()),
        publish_summaries: config.publish_summaries,
        now: None,
    };

    let report = pipeline::run_once(
        &sources,
        &store,
        &publishers,
        summarizer.as_ref(),
        &opts,
    )
    .await?;
    Ok(report)
}

/// Machine-readable run summary on stdout; logs carry the detail.
fn print_report(report: &RunReport) -> anyhow::Result<()> {
    let batches: Vec<_> = report
        .batches
        .iter()
        .map(|b| {
            json!({
                "draft": b.draft.id,
                "facts": b.fact_count,
                "published": b
                    .outcomes
                    .iter()
                    .map(|o| match &o.result {
                        Ok(receipt) => json!({
                            "publisher": o.publisher,
                            "id": receipt.id,
                            "url": receipt.url,
                        }),
                        Err(e) => json!({
                            "publisher": o.publisher,
                            "error": e,
                        }),
                    })
                    .collect::<Vec<_>>(),
                "summary": b.summary.as_ref().map(|s| &s.body),
            })
        })
        .collect();

    let out = json!({
        "newFacts": report.new_fact_count,
        "totalFacts": report.state.facts.len(),
        "lastRunAt": report.state.last_run_at,
        "batches": batches,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Run on a fixed interval until Ctrl-C. Each tick is a fully
/// independent run; a failed tick leaves the persisted state untouched,
/// so the next one re-pulls safely.
async fn cmd_watch(
    config: &Config,
    interval_minutes: u64,
    window_hours: Option<i64>,
    no_summary: bool,
) -> anyhow::Result<()> {
    let interval = Duration::from_secs(interval_minutes.max(1) * 60);
    info!(interval_minutes = interval_minutes.max(1), "watch loop started");

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let notify = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        notify.notify_one();
    });

    loop {
        match run_once(config, window_hours, no_summary).await {
            Ok(report) => {
                info!(
                    new_facts = report.new_fact_count,
                    batches = report.batches.len(),
                    "run complete"
                );
            }
            Err(e) => error!("run failed: {e}"),
        }

        tokio::select! {
            _ = shutdown.notified() => {
                info!("watch loop shutting down");
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

fn cmd_facts_list(config: &Config, limit: usize) -> anyhow::Result<()> {
    let store = FileStateStore::new(&config.state_file);
    let Some(state) = store.read_state()? else {
        println!("No state yet at {}.", config.state_file.display());
        return Ok(());
    };

    if state.facts.is_empty() {
        println!("No facts recorded.");
        return Ok(());
    }

    // Header
    println!(
        "{:<24}  {:<12}  {:<20}  SUMMARY",
        "ID", "KIND", "OCCURRED"
    );
    println!("{}", "-".repeat(100));

    for fact in state.facts.iter().rev().take(limit) {
        let id = truncate(&fact.id, 24);
        let summary = truncate(&fact.summary, 50);
        println!(
            "{:<24}  {:<12}  {:<20}  {}",
            id,
            fact.kind(),
            fact.occurred_at.format("%Y-%m-%d %H:%M"),
            summary
        );
    }

    println!(
        "\n{} of {} fact(s)",
        state.facts.len().min(limit),
        state.facts.len()
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
