//! GitHub source: repo spec parsing and event→fact mapping.

use chrono::{DateTime, Utc};
use herald::model::{Event, FactData};
use herald::source::github::{RepoSpec, map_event_to_fact};
use serde_json::json;

fn ts(iso: &str) -> DateTime<Utc> {
    iso.parse().unwrap()
}

fn event(id: &str, kind: &str, payload: serde_json::Value) -> Event {
    Event {
        id: id.to_string(),
        source: "github".to_string(),
        kind: kind.to_string(),
        occurred_at: ts("2024-03-01T10:00:00Z"),
        payload,
        url: Some("https://github.com/org/repo/x".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Repo specs
// ---------------------------------------------------------------------------

#[test]
fn parses_owner_repo() {
    let spec = RepoSpec::parse("org/repo").unwrap();
    assert_eq!(spec.owner, "org");
    assert_eq!(spec.repo, "repo");
    assert_eq!(spec.branch, None);
}

#[test]
fn parses_branch_suffix() {
    let spec = RepoSpec::parse(" org/repo@main ").unwrap();
    assert_eq!(spec.branch.as_deref(), Some("main"));
}

#[test]
fn rejects_malformed_entries() {
    assert!(RepoSpec::parse("").is_none());
    assert!(RepoSpec::parse("no-slash").is_none());
    assert!(RepoSpec::parse("/repo").is_none());
    assert!(RepoSpec::parse("owner/").is_none());
}

#[test]
fn list_parsing_skips_bad_entries() {
    let specs = RepoSpec::parse_list("org/a, bad, org/b@dev,");
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].repo, "a");
    assert_eq!(specs[1].branch.as_deref(), Some("dev"));
}

// ---------------------------------------------------------------------------
// Event mapping
// ---------------------------------------------------------------------------

#[test]
fn commit_event_maps_to_commit_fact() {
    let e = event(
        "gh-commit-0123456789ab",
        "commit",
        json!({
            "sha": "0123456789ab",
            "message": "Fix parser\n\nDetails",
            "author": "dev",
            "repo": "org/repo",
        }),
    );

    let fact = map_event_to_fact(e);

    assert_eq!(fact.id, "gh-commit-0123456789ab");
    assert_eq!(fact.summary, "Commit 0123456: Fix parser");
    assert_eq!(fact.source, "github");
    match fact.data {
        FactData::Commit { sha, message, repo, .. } => {
            assert_eq!(sha, "0123456789ab");
            assert_eq!(message, "Fix parser\n\nDetails");
            assert_eq!(repo.as_deref(), Some("org/repo"));
        }
        other => panic!("expected Commit, got {other:?}"),
    }
}

#[test]
fn commit_without_sha_gets_a_bare_summary() {
    let e = event("e1", "commit", json!({"message": "Initial import"}));
    let fact = map_event_to_fact(e);
    assert_eq!(fact.summary, "Commit: Initial import");
}

#[test]
fn issue_event_maps_to_issue_fact() {
    let e = event(
        "gh-42",
        "issue_updated",
        json!({
            "number": 7,
            "title": "Crash on empty input",
            "state": "open",
            "is_pr": false,
            "repo": "org/repo",
        }),
    );

    let fact = map_event_to_fact(e);

    assert_eq!(fact.summary, "Issue #7: Crash on empty input [open]");
    assert!(matches!(fact.data, FactData::Issue { number: Some(7), .. }));
}

#[test]
fn pr_event_maps_to_pull_request_fact() {
    let e = event(
        "gh-43",
        "pr_updated",
        json!({
            "number": 8,
            "title": "Add retries",
            "state": "closed",
            "is_pr": true,
            "repo": "org/repo",
        }),
    );

    let fact = map_event_to_fact(e);

    assert_eq!(fact.summary, "PR #8: Add retries [closed]");
    assert!(matches!(fact.data, FactData::PullRequest { number: Some(8), .. }));
}

#[test]
fn unknown_kind_maps_to_other() {
    let e = event("e1", "wiki_edited", json!({}));
    let fact = map_event_to_fact(e);
    assert_eq!(fact.summary, "wiki_edited");
    assert!(matches!(fact.data, FactData::Other));
}

#[test]
fn mapping_is_stable_for_the_same_event() {
    let make = || {
        event(
            "gh-commit-abc",
            "commit",
            json!({"sha": "abc", "message": "m"}),
        )
    };
    assert_eq!(map_event_to_fact(make()), map_event_to_fact(make()));
}

#[test]
fn url_and_occurred_at_are_carried_through() {
    let e = event("e1", "commit", json!({"sha": "abc", "message": "m"}));
    let fact = map_event_to_fact(e);
    assert_eq!(fact.occurred_at, ts("2024-03-01T10:00:00Z"));
    assert_eq!(fact.url.as_deref(), Some("https://github.com/org/repo/x"));
}
