//! Draft assembler: rendering, citations, id derivation.

use chrono::{DateTime, Utc};
use herald::draft::{CITATION_LABEL_MAX, assemble};
use herald::model::{Fact, FactData};

fn ts(iso: &str) -> DateTime<Utc> {
    iso.parse().unwrap()
}

fn commit_fact(id: &str, sha: &str, message: &str, url: Option<&str>) -> Fact {
    Fact {
        id: id.to_string(),
        summary: format!("Commit {sha}"),
        occurred_at: ts("2024-03-01T10:00:00Z"),
        source: "github".to_string(),
        url: url.map(str::to_string),
        data: FactData::Commit {
            sha: sha.to_string(),
            message: message.to_string(),
            author: None,
            repo: Some("org/repo".to_string()),
        },
    }
}

#[test]
fn empty_batch_produces_placeholder_draft() {
    let draft = assemble(&[], ts("2024-03-01T10:00:00Z"), None);

    assert_eq!(draft.markdown, "# Update\n\n_No new facts._\n");
    assert!(draft.citations.is_empty());
    assert!(draft.id.starts_with("update-"));
}

#[test]
fn commit_renders_short_sha_and_first_message_line() {
    let fact = commit_fact(
        "c1",
        "0123456789abcdef",
        "Fix parser panic\n\nLong body here",
        Some("https://github.com/org/repo/commit/0123456"),
    );

    let draft = assemble(&[fact], ts("2024-03-01T10:00:00Z"), None);

    assert!(draft.markdown.contains("`0123456` Fix parser panic"));
    assert!(!draft.markdown.contains("Long body here"));
    assert!(draft.markdown.contains("([link](https://github.com/org/repo/commit/0123456))"));
}

#[test]
fn commit_without_sha_renders_bare_message() {
    let fact = commit_fact("c1", "", "Initial import", None);

    let draft = assemble(&[fact], ts("2024-03-01T10:00:00Z"), None);

    assert!(draft.markdown.contains("- Initial import ("));
    assert!(!draft.markdown.contains('`'));
}

#[test]
fn issue_and_pr_render_number_title_state() {
    let issue = Fact {
        id: "i1".to_string(),
        summary: "Issue #7".to_string(),
        occurred_at: ts("2024-03-01T10:00:00Z"),
        source: "github".to_string(),
        url: None,
        data: FactData::Issue {
            number: Some(7),
            title: Some("Crash on empty input".to_string()),
            state: Some("open".to_string()),
            repo: None,
        },
    };
    let pr = Fact {
        id: "p1".to_string(),
        summary: "PR #8".to_string(),
        occurred_at: ts("2024-03-01T11:00:00Z"),
        source: "github".to_string(),
        url: None,
        data: FactData::PullRequest {
            number: Some(8),
            title: Some("Add retries".to_string()),
            state: Some("merged".to_string()),
            repo: None,
        },
    };

    let draft = assemble(&[issue, pr], ts("2024-03-01T12:00:00Z"), None);

    assert!(draft.markdown.contains("- Issue #7: Crash on empty input [open]"));
    assert!(draft.markdown.contains("- PR #8: Add retries [merged]"));
}

#[test]
fn other_kind_renders_plain_summary() {
    let fact = Fact {
        id: "n1".to_string(),
        summary: "Wrote release notes".to_string(),
        occurred_at: ts("2024-03-01T10:00:00Z"),
        source: "notes".to_string(),
        url: None,
        data: FactData::Other,
    };

    let draft = assemble(&[fact], ts("2024-03-01T10:00:00Z"), None);

    assert!(draft.markdown.contains("- Wrote release notes ("));
}

#[test]
fn citations_match_facts_with_urls_in_order() {
    let with_url_a = commit_fact("c1", "aaaaaaa", "First", Some("https://example.com/a"));
    let without_url = commit_fact("c2", "bbbbbbb", "Second", None);
    let with_url_b = commit_fact("c3", "ccccccc", "Third", Some("https://example.com/b"));

    let draft = assemble(
        &[with_url_a, without_url, with_url_b],
        ts("2024-03-01T10:00:00Z"),
        None,
    );

    assert_eq!(draft.citations.len(), 2);
    assert_eq!(draft.citations[0].url, "https://example.com/a");
    assert_eq!(draft.citations[1].url, "https://example.com/b");
}

#[test]
fn citation_labels_are_truncated() {
    let mut fact = commit_fact("c1", "aaaaaaa", "msg", Some("https://example.com"));
    fact.summary = "x".repeat(200);

    let draft = assemble(&[fact], ts("2024-03-01T10:00:00Z"), None);

    assert_eq!(draft.citations[0].label.chars().count(), CITATION_LABEL_MAX);
}

#[test]
fn draft_id_is_derived_from_generation_instant() {
    let a = assemble(&[], ts("2024-03-01T10:00:00Z"), None);
    let b = assemble(&[], ts("2024-03-01T10:00:00.001Z"), None);
    let a2 = assemble(&[], ts("2024-03-01T10:00:00Z"), None);

    assert_ne!(a.id, b.id);
    assert_eq!(a.id, a2.id);
}

#[test]
fn title_is_carried_through() {
    let draft = assemble(&[], ts("2024-03-01T10:00:00Z"), Some("Weekly".to_string()));
    assert_eq!(draft.title.as_deref(), Some("Weekly"));
}
