//! Processing state machine integration tests.
//!
//! Require a live PostgreSQL with pgvector; run with `cargo test -- --ignored`.

use kasten_core::{ClassificationStatus, ContentRepository, ParsingStatus};
use kasten_db::test_fixtures::TestDatabase;

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_statuses_advance_monotonically() {
    let fixture = TestDatabase::new().await;
    let id = fixture.seed_content("state-forward", "正文").await;

    let db = &fixture.db;
    db.contents
        .set_parsing_status(id, ParsingStatus::Parsing)
        .await
        .unwrap();
    db.contents
        .set_parsing_status(id, ParsingStatus::Completed)
        .await
        .unwrap();

    db.contents
        .set_classification_status(id, ClassificationStatus::QuickProcessing)
        .await
        .unwrap();
    db.contents
        .set_classification_status(id, ClassificationStatus::QuickDone)
        .await
        .unwrap();

    let content = db.contents.fetch(id).await.unwrap();
    assert_eq!(content.state.parsing_status, ParsingStatus::Completed);
    assert_eq!(
        content.state.classification_status,
        ClassificationStatus::QuickDone
    );

    fixture.cleanup_content(id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_status_regression_is_refused_not_an_error() {
    let fixture = TestDatabase::new().await;
    let id = fixture.seed_content("state-regress", "正文").await;

    let db = &fixture.db;
    db.contents
        .set_parsing_status(id, ParsingStatus::Completed)
        .await
        .unwrap();

    // A stale writer trying to go backwards is a logged no-op.
    db.contents
        .set_parsing_status(id, ParsingStatus::Parsing)
        .await
        .unwrap();
    assert_eq!(
        fixture.db.contents.fetch(id).await.unwrap().state.parsing_status,
        ParsingStatus::Completed
    );

    fixture.cleanup_content(id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_error_is_terminal_per_field_only() {
    let fixture = TestDatabase::new().await;
    let id = fixture.seed_content("state-error", "正文").await;

    let db = &fixture.db;
    db.contents
        .set_classification_status(id, ClassificationStatus::Error)
        .await
        .unwrap();
    db.contents
        .set_classification_status(id, ClassificationStatus::Completed)
        .await
        .unwrap();

    let content = db.contents.fetch(id).await.unwrap();
    // Classification error is terminal...
    assert_eq!(
        content.state.classification_status,
        ClassificationStatus::Error
    );

    // ...but never blocks the parsing field.
    db.contents
        .set_parsing_status(id, ParsingStatus::Completed)
        .await
        .unwrap();
    assert_eq!(
        db.contents.fetch(id).await.unwrap().state.parsing_status,
        ParsingStatus::Completed
    );

    fixture.cleanup_content(id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_show_classification_gate_is_independent() {
    let fixture = TestDatabase::new().await;
    let id = fixture.seed_content("state-show", "正文").await;

    let db = &fixture.db;
    assert!(!db.contents.fetch(id).await.unwrap().state.show_classification);

    db.contents.set_show_classification(id, true).await.unwrap();
    assert!(db.contents.fetch(id).await.unwrap().state.show_classification);

    fixture.cleanup_content(id).await;
}
