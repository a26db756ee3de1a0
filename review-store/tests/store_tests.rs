//! Integration tests for the embedded store: round-trips, pagination
//! windows, id monotonicity across reopen, and the two update paths.

use pretty_assertions::assert_eq;
use review_store::{
    EmailRecipients, EventType, FailureStage, NewFailureLog, NewReviewRecord, ReviewType, Store,
    StoreError, TriggerType,
};

fn sample_review(commit: &str) -> NewReviewRecord {
    NewReviewRecord {
        review_type: ReviewType::Auto,
        trigger_type: TriggerType::Commit,
        project_key: "ACME".into(),
        repo_slug: "widgets".into(),
        commit_id: Some(commit.into()),
        mr_id: None,
        author_name: Some("Dana Developer".into()),
        author_email: Some("dana@example.com".into()),
        diff_content: "--- a/lib.rs\n+++ b/lib.rs\n@@ -1 +1 @@\n-old\n+new\n".into(),
        review_feedback: "Looks reasonable; watch the unwrap on line 3.".into(),
        email_recipients: Some(EmailRecipients {
            to: vec!["dana@example.com".into()],
            cc: vec![],
        }),
        llm_provider: "hosted_chat".into(),
        llm_model: "gpt-4o-mini".into(),
    }
}

fn sample_failure(stage: FailureStage) -> NewFailureLog {
    NewFailureLog {
        event_type: EventType::Webhook,
        event_key: Some("repo:refs_changed".into()),
        request_payload: Some(serde_json::json!({"eventKey": "repo:refs_changed"})),
        project_key: Some("ACME".into()),
        repo_slug: Some("widgets".into()),
        commit_id: Some("aaaa000011112222333344445555666677778888".into()),
        mr_id: None,
        author_name: None,
        author_email: None,
        failure_stage: stage,
        error_type: "timeout".into(),
        error_message: "llm provider did not answer within 60s".into(),
        error_stacktrace: None,
        retry_count: 0,
    }
}

fn open_temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("reviews.db");
    let store = Store::open(path.to_str().expect("utf8 path")).expect("open store");
    (dir, store)
}

#[test]
fn insert_then_get_round_trips_modulo_id_and_created_at() {
    let (_dir, store) = open_temp_store();
    let record = sample_review("deadbeefcafe");

    let id = store.insert_review(&record).expect("insert");
    let fetched = store.get_review(id).expect("get").expect("row exists");

    assert_eq!(fetched.id, id);
    assert_eq!(fetched.project_key, record.project_key);
    assert_eq!(fetched.repo_slug, record.repo_slug);
    assert_eq!(fetched.commit_id, record.commit_id);
    assert_eq!(fetched.mr_id, None);
    assert_eq!(fetched.diff_content, record.diff_content);
    assert_eq!(fetched.review_feedback, record.review_feedback);
    assert_eq!(fetched.email_recipients, record.email_recipients);
    assert_eq!(fetched.email_sent, false);
    assert_eq!(fetched.llm_provider, "hosted_chat");
}

#[test]
fn insert_rejects_invariant_violations() {
    let (_dir, store) = open_temp_store();

    let mut no_diff = sample_review("abc123");
    no_diff.diff_content = "   \n".into();
    assert!(matches!(store.insert_review(&no_diff), Err(StoreError::InvalidRecord(_))));

    let mut no_ids = sample_review("abc123");
    no_ids.commit_id = None;
    no_ids.mr_id = None;
    assert!(matches!(store.insert_review(&no_ids), Err(StoreError::InvalidRecord(_))));

    let mut no_feedback = sample_review("abc123");
    no_feedback.review_feedback = String::new();
    assert!(matches!(store.insert_review(&no_feedback), Err(StoreError::InvalidRecord(_))));
}

#[test]
fn ids_increase_and_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("reviews.db");
    let path = path.to_str().expect("utf8 path");

    let first;
    {
        let store = Store::open(path).expect("open");
        first = store.insert_review(&sample_review("c1")).expect("insert");
        let second = store.insert_review(&sample_review("c2")).expect("insert");
        assert!(second > first);
    }

    // A fresh handle over the same file continues from the persisted maximum.
    let store = Store::open(path).expect("reopen");
    let third = store.insert_review(&sample_review("c3")).expect("insert");
    assert!(third > first + 1);
}

#[test]
fn pagination_returns_true_total_and_requested_window() {
    let (_dir, store) = open_temp_store();
    for i in 0..25 {
        store.insert_review(&sample_review(&format!("commit-{i:02}"))).expect("insert");
    }

    let page = store.list_reviews(10, 5).expect("page");
    assert_eq!(page.total, 25);
    assert_eq!(page.rows.len(), 5);

    // Default ordering is newest first; offset 10 therefore starts at the
    // 15th inserted row.
    assert_eq!(page.rows[0].commit_id.as_deref(), Some("commit-14"));
    assert_eq!(page.rows[4].commit_id.as_deref(), Some("commit-10"));

    // Ids in a window are strictly decreasing under the tie-break.
    for pair in page.rows.windows(2) {
        assert!(pair[0].id > pair[1].id);
    }
}

#[test]
fn limit_is_clamped_at_query_time() {
    let (_dir, store) = open_temp_store();
    for i in 0..3 {
        store.insert_review(&sample_review(&format!("c{i}"))).expect("insert");
    }

    assert_eq!(store.list_reviews(0, 0).expect("page").rows.len(), 1);
    assert_eq!(store.list_reviews(0, 1000).expect("page").rows.len(), 3);
    assert_eq!(store.latest_reviews(0).expect("latest").len(), 1);
}

#[test]
fn filtered_queries_use_their_keys() {
    let (_dir, store) = open_temp_store();

    store.insert_review(&sample_review("aaa")).expect("insert");

    let mut other_repo = sample_review("bbb");
    other_repo.repo_slug = "gadgets".into();
    store.insert_review(&other_repo).expect("insert");

    let mut mr_record = sample_review("ignored");
    mr_record.commit_id = None;
    mr_record.mr_id = Some(42);
    mr_record.trigger_type = TriggerType::PullRequest;
    mr_record.author_email = Some("lee@example.com".into());
    store.insert_review(&mr_record).expect("insert");

    assert_eq!(store.reviews_by_project("ACME", None, 50).expect("q").len(), 3);
    assert_eq!(
        store.reviews_by_project("ACME", Some("widgets"), 50).expect("q").len(),
        2
    );
    assert_eq!(store.reviews_by_commit("aaa").expect("q").len(), 1);
    assert_eq!(store.reviews_by_mr(42).expect("q").len(), 1);
    assert_eq!(store.reviews_by_author("lee@example.com", 10).expect("q").len(), 1);
    assert_eq!(store.reviews_by_author("nobody@example.com", 10).expect("q").len(), 0);
}

#[test]
fn mark_email_sent_flips_only_the_flag() {
    let (_dir, store) = open_temp_store();
    let id = store.insert_review(&sample_review("abc")).expect("insert");

    store.mark_email_sent(id).expect("mark");
    let row = store.get_review(id).expect("get").expect("exists");
    assert!(row.email_sent);
    assert_eq!(row.commit_id.as_deref(), Some("abc"));

    assert!(matches!(store.mark_email_sent(9999), Err(StoreError::NotFound(9999))));
}

#[test]
fn failure_log_round_trip_and_resolution() {
    let (_dir, store) = open_temp_store();

    let id = store
        .insert_failure(&sample_failure(FailureStage::LlmInvocation))
        .expect("insert");
    let row = store.get_failure(id).expect("get").expect("exists");

    assert_eq!(row.failure_stage, FailureStage::LlmInvocation);
    assert_eq!(row.error_type, "timeout");
    assert_eq!(row.resolved, false);
    assert_eq!(
        row.request_payload,
        Some(serde_json::json!({"eventKey": "repo:refs_changed"}))
    );

    store
        .mark_failure_resolved(id, Some("provider outage, retried by hand"))
        .expect("resolve");
    let row = store.get_failure(id).expect("get").expect("exists");
    assert!(row.resolved);
    assert_eq!(row.resolution_notes.as_deref(), Some("provider outage, retried by hand"));

    let page = store.list_failures(0, 10).expect("page");
    assert_eq!(page.total, 1);
    assert_eq!(page.rows.len(), 1);
}

#[test]
fn failure_insert_rejects_empty_classifier() {
    let (_dir, store) = open_temp_store();
    let mut log = sample_failure(FailureStage::DiffFetch);
    log.error_type = String::new();
    assert!(matches!(store.insert_failure(&log), Err(StoreError::InvalidRecord(_))));
}
