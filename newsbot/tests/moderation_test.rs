mod common;

use common::*;
use newsbot::moderation::{plan_sweep, ModerationRules, ModerationSweep, Verdict};
use std::sync::Arc;

fn snapshot(items: &[(i64, &str, &str)]) -> PublishedSnapshot {
    PublishedSnapshot::new(
        items
            .iter()
            .map(|(id, url, title)| published(*id, title, url, at(today(), 9)))
            .collect(),
    )
}

async fn sweep(api: Arc<MockPublishingApi>) -> ModerationSweep {
    let ledger = memory_ledger().await;
    let pool = identity_pool(ledger, api.clone(), IdentityCatalog::builtin());
    ModerationSweep::new(api, pool, "moderator_bot")
}

#[tokio::test]
async fn test_newest_duplicate_url_survives() {
    init_tracing();
    let api = MockPublishingApi::new();
    let posts = snapshot(&[(5, "https://a.example/x", "X"), (3, "https://a.example/x", "Y")]);

    let summary = sweep(api.clone()).await.run(&posts, &ModerationRules::default()).await;

    assert_eq!(api.retracted(), vec![3]);
    assert_eq!(summary.flagged_duplicate, 1);
    assert_eq!(summary.retracted, 1);
}

#[tokio::test]
async fn test_duplicate_titles_are_retracted() {
    init_tracing();
    let posts = snapshot(&[
        (1, "https://a.example/1", "Same"),
        (2, "https://b.example/2", "Same"),
        (3, "https://c.example/3", "Different"),
    ]);

    let verdicts: Vec<(i64, Verdict)> = plan_sweep(&posts, &ModerationRules::default().compile())
        .into_iter()
        .map(|d| (d.post_id, d.verdict))
        .collect();
    assert_eq!(
        verdicts,
        vec![(3, Verdict::Keep), (2, Verdict::Keep), (1, Verdict::DuplicateTitle)]
    );
}

#[tokio::test]
async fn test_short_patterns_are_never_applied() {
    init_tracing();
    let api = MockPublishingApi::new();
    let rules = ModerationRules {
        forbidden_title_regex: vec!["ai".to_string(), "spam".to_string()],
        forbidden_url_regex: vec!["x".to_string()],
    };
    let posts = snapshot(&[
        (1, "https://x.example/ai", "AI is everywhere"),
        (2, "https://y.example/", "Buy SPAM now"),
    ]);

    let summary = sweep(api.clone()).await.run(&posts, &rules).await;

    assert_eq!(api.retracted(), vec![2]);
    assert_eq!(summary.flagged_title, 1);
    assert_eq!(summary.flagged_url, 0);
}

#[tokio::test]
async fn test_url_rules_win_over_title_rules() {
    let rules = ModerationRules {
        forbidden_title_regex: vec!["casino".to_string()],
        forbidden_url_regex: vec!["casino".to_string()],
    };
    let posts = snapshot(&[(1, "https://casino.example/", "Casino night")]);
    let decisions = plan_sweep(&posts, &rules.compile());
    assert_eq!(decisions[0].verdict, Verdict::ForbiddenUrl);
}

#[tokio::test]
async fn test_blank_urls_are_skipped_and_not_remembered() {
    init_tracing();
    let api = MockPublishingApi::new();
    let posts = snapshot(&[(4, "  ", "Text post"), (2, "https://a.example/", "Text post")]);

    let summary = sweep(api.clone()).await.run(&posts, &ModerationRules::default()).await;

    assert_eq!(summary.skipped_blank, 1);
    assert!(api.retracted().is_empty());
}

#[tokio::test]
async fn test_failed_retraction_does_not_stop_the_sweep() {
    init_tracing();
    let api = MockPublishingApi::new();
    api.fail_retract_ids.lock().unwrap().insert(3);
    let posts = snapshot(&[
        (5, "https://a.example/x", "Original"),
        (3, "https://a.example/x", "Copy one"),
        (2, "https://a.example/x", "Copy two"),
    ]);

    let summary = sweep(api.clone()).await.run(&posts, &ModerationRules::default()).await;

    assert_eq!(api.retracted(), vec![2]);
    assert_eq!(summary.retraction_failed, 1);
    assert_eq!(summary.retracted, 1);
    // One moderator session serves the whole sweep.
    assert_eq!(api.registrations_of("moderator_bot") + api.logins_of("moderator_bot"), 1);
}

#[tokio::test]
async fn test_clean_corpus_needs_no_moderator() {
    init_tracing();
    let api = MockPublishingApi::new();
    let posts = snapshot(&[(1, "https://a.example/1", "One"), (2, "https://b.example/2", "Two")]);

    let summary = sweep(api.clone()).await.run(&posts, &ModerationRules::default()).await;

    assert_eq!(summary.examined, 2);
    assert_eq!(summary.retracted, 0);
    assert!(api.registrations.lock().unwrap().is_empty());
    assert!(api.logins.lock().unwrap().is_empty());
}
