mod common;

use async_trait::async_trait;
use chrono::Duration;
use common::*;
use newsbot::dedupe::{filter_already_posted, filter_too_much_posted, PostedLookup};
use std::collections::HashSet;

fn busy_snapshot() -> PublishedSnapshot {
    let morning = at(today(), 8);
    PublishedSnapshot::new(vec![
        published(1, "Yesterday", "https://example.com/old", morning - Duration::days(1)),
        published(2, "First", "https://example.com/a", morning),
        published(3, "Second", "https://example.com/b", at(today(), 11)),
    ])
}

fn example_candidates() -> Vec<CandidateItem> {
    vec![
        candidate("C1", "https://example.com/c1"),
        candidate("C2", "https://example.com/c2"),
        candidate("C3", "https://example.com/c3"),
    ]
}

#[test]
fn test_volume_cap_drops_everything_at_the_limit() {
    init_tracing();
    let outcome = filter_too_much_posted(example_candidates(), &busy_snapshot(), 2, today());
    assert!(outcome.kept.is_empty());
    assert_eq!(outcome.removed, 3);
}

#[test]
fn test_volume_cap_counts_items_kept_in_the_same_pass() {
    init_tracing();
    let outcome = filter_too_much_posted(example_candidates(), &busy_snapshot(), 3, today());
    assert_eq!(outcome.kept.len(), 1);
    assert_eq!(outcome.kept[0].url, "https://example.com/c1");
}

#[test]
fn test_volume_cap_is_per_host_and_per_day() {
    init_tracing();
    let mut candidates = example_candidates();
    candidates.push(candidate("Other", "https://other.org/x"));
    candidates.push(candidate("No host", "not a url"));

    let tomorrow = today() + Duration::days(1);
    let outcome = filter_too_much_posted(candidates.clone(), &busy_snapshot(), 2, tomorrow);
    let kept: Vec<&str> = outcome.kept.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(kept, vec!["https://example.com/c1", "https://example.com/c2", "https://other.org/x"]);

    let outcome = filter_too_much_posted(candidates, &busy_snapshot(), 2, today());
    let kept: Vec<&str> = outcome.kept.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(kept, vec!["https://other.org/x"]);
}

#[test]
fn test_volume_cap_matches_hosts_as_substrings() {
    init_tracing();
    let snapshot = PublishedSnapshot::new(vec![
        published(1, "Blog", "https://blog.example.com/a", at(today(), 9)),
        published(2, "Look-alike", "https://notexample.com/b", at(today(), 10)),
    ]);
    let outcome = filter_too_much_posted(vec![candidate("C", "https://example.com/c")], &snapshot, 2, today());
    assert!(outcome.kept.is_empty());
}

#[test]
fn test_already_published_candidates_do_not_count_toward_the_cap() {
    init_tracing();
    let yesterday = today() - Duration::days(1);
    let snapshot = PublishedSnapshot::new(vec![
        published(1, "Old one", "https://blog.example/1", at(yesterday, 9)),
        published(2, "Old two", "https://blog.example/2", at(yesterday, 10)),
    ]);
    let candidates = vec![
        candidate("Old one", "https://blog.example/1"),
        candidate("Old two", "https://blog.example/2"),
        candidate("Brand new", "https://blog.example/3"),
    ];

    let outcome = filter_too_much_posted(candidates, &snapshot, 2, today());
    let kept: Vec<&str> = outcome.kept.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(
        kept,
        vec!["https://blog.example/1", "https://blog.example/2", "https://blog.example/3"]
    );
}

#[tokio::test]
async fn test_exact_dedupe_against_the_ledger() {
    init_tracing();
    let ledger = memory_ledger().await;
    ledger.mark_posted("https://a.com/1").await.unwrap();

    let batch = vec![
        candidate("Posted", "https://a.com/1"),
        candidate("Trailing slash", "https://a.com/1/"),
        candidate("New", "https://a.com/2"),
    ];
    let outcome = filter_already_posted(batch, &*ledger).await;

    let kept: Vec<&str> = outcome.kept.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(kept, vec!["https://a.com/1/", "https://a.com/2"]);
    assert_eq!(outcome.removed, 1);
}

#[tokio::test]
async fn test_dedupe_is_idempotent() {
    init_tracing();
    let ledger = memory_ledger().await;
    ledger.mark_posted("https://a.com/2").await.unwrap();

    let batch = vec![
        candidate("One", "https://a.com/1"),
        candidate("Two", "https://a.com/2"),
        candidate("One again", "https://a.com/1"),
        candidate("Three", "https://a.com/3"),
    ];

    let first = filter_already_posted(batch.clone(), &*ledger).await;
    let second = filter_already_posted(batch, &*ledger).await;
    assert_eq!(first.kept, second.kept);
    assert_eq!(first.kept.len(), 2);

    let again = filter_already_posted(first.kept.clone(), &*ledger).await;
    assert_eq!(again.kept, first.kept);
}

#[tokio::test]
async fn test_in_memory_posted_set() {
    let posted: HashSet<String> = ["https://a.com/1".to_string()].into_iter().collect();
    let outcome = filter_already_posted(vec![candidate("A", "https://a.com/1")], &posted).await;
    assert!(outcome.kept.is_empty());
}

struct BrokenLookup;

#[async_trait]
impl PostedLookup for BrokenLookup {
    async fn has_posted(&self, _url: &str) -> Result<bool> {
        Err(BotError::General("ledger unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_failed_lookup_keeps_the_item() {
    init_tracing();
    let batch = vec![candidate("A", "https://a.com/1"), candidate("A again", "https://a.com/1")];
    let outcome = filter_already_posted(batch, &BrokenLookup).await;
    assert_eq!(outcome.kept.len(), 1);
    assert_eq!(outcome.removed, 1);
}
