//! Draft assembler: renders a batch of facts into an update document.
//!
//! Assembly is deterministic in its inputs. The draft id derives from the
//! generation timestamp alone; the pipeline supplies distinct instants
//! per batch within one run.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::model::{Citation, Fact, FactData, UpdateDraft};

/// Citation labels are truncated to keep the list scannable.
pub const CITATION_LABEL_MAX: usize = 80;

/// Build an update draft from a batch of facts.
///
/// Never fails: an empty batch produces a valid placeholder document.
pub fn assemble(facts: &[Fact], generated_at: DateTime<Utc>, title: Option<String>) -> UpdateDraft {
    UpdateDraft {
        id: draft_id(generated_at),
        created_at: generated_at,
        title,
        markdown: render_markdown(facts),
        citations: facts
            .iter()
            .filter_map(|f| {
                f.url.as_ref().map(|url| Citation {
                    label: truncate_label(&f.summary),
                    url: url.clone(),
                })
            })
            .collect(),
    }
}

fn draft_id(generated_at: DateTime<Utc>) -> String {
    format!(
        "update-{}",
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Render the markdown body. Kind-dependent line formats, exhaustive over
/// [`FactData`].
pub fn render_markdown(facts: &[Fact]) -> String {
    if facts.is_empty() {
        return "# Update\n\n_No new facts._\n".to_string();
    }

    let mut lines = vec!["# Update".to_string(), String::new()];
    for fact in facts {
        lines.push(render_line(fact));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn render_line(fact: &Fact) -> String {
    let ts = fact.occurred_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let link = fact
        .url
        .as_ref()
        .map(|u| format!(" ([link]({u}))"))
        .unwrap_or_default();

    match &fact.data {
        FactData::Commit { sha, message, .. } => {
            let short: String = sha.chars().take(7).collect();
            let first = message.lines().next().unwrap_or_default().trim();
            let msg = if first.is_empty() {
                fact.summary.as_str()
            } else {
                first
            };
            if short.is_empty() {
                format!("- {msg} ({ts}){link}")
            } else {
                format!("- `{short}` {msg} ({ts}){link}")
            }
        }
        FactData::Issue {
            number,
            title,
            state,
            ..
        } => item_line("Issue", *number, title.as_deref(), state.as_deref(), &ts, &link),
        FactData::PullRequest {
            number,
            title,
            state,
            ..
        } => item_line("PR", *number, title.as_deref(), state.as_deref(), &ts, &link),
        FactData::Other => format!("- {} ({ts}){link}", fact.summary),
    }
}

fn item_line(
    label: &str,
    number: Option<u64>,
    title: Option<&str>,
    state: Option<&str>,
    ts: &str,
    link: &str,
) -> String {
    let num = number.map(|n| format!(" #{n}")).unwrap_or_default();
    let title = title.map(|t| format!(": {t}")).unwrap_or_default();
    let state = state.map(|s| format!(" [{s}]")).unwrap_or_default();
    format!("- {label}{num}{title}{state} ({ts}){link}")
}

fn truncate_label(summary: &str) -> String {
    summary.chars().take(CITATION_LABEL_MAX).collect()
}
