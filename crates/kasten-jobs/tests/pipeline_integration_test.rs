//! Classification pipeline integration tests.
//!
//! Cover the arbitration and idempotence properties end to end against a
//! live database, with the inference layer mocked. Run with
//! `cargo test -- --ignored`.

use std::sync::Arc;

use kasten_core::{
    CategoryRepository, CategoryRole, ClassificationSource, ClassificationStatus,
    ContentRepository, EventBus, ParsingStatus, SignalRepository,
};
use kasten_db::test_fixtures::TestDatabase;
use kasten_inference::MockBackend;
use kasten_jobs::{
    ClassificationOutcome, ClassificationService, CollectionMatcher, QuickClassifier, QuickOutcome,
};
use uuid::Uuid;

const MEETING_TITLE: &str = "项目会议纪要.docx";
const MEETING_BODY: &str = "会议时间：2024年10月3日\n参会人员：张三、李四\n决议：下周完成需求评审";

async fn seed_parsed_content(fixture: &TestDatabase, title: &str, text: &str) -> Uuid {
    let id = fixture.seed_content(title, text).await;
    fixture
        .db
        .contents
        .set_parsing_status(id, ParsingStatus::Completed)
        .await
        .unwrap();
    id
}

fn classification_json(category: &str, confidence: f32) -> String {
    format!(
        r#"{{"category": "{}", "confidence": {}, "reasoning": "测试分类"}}"#,
        category, confidence
    )
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_quick_classifier_meeting_scenario() {
    let fixture = TestDatabase::new().await;
    let bus = EventBus::new();
    let id = seed_parsed_content(&fixture, MEETING_TITLE, MEETING_BODY).await;

    let quick = QuickClassifier::new(fixture.db.clone(), bus);
    let outcome = quick.quick_classify(id, true).await.unwrap();

    match outcome {
        QuickOutcome::Classified {
            category_name,
            confidence,
            reasoning,
            ..
        } => {
            assert_eq!(category_name, "职场商务");
            assert!(confidence >= 0.5, "confidence {}", confidence);
            assert!(reasoning.contains("关键词匹配"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let content = fixture.db.contents.fetch(id).await.unwrap();
    assert_eq!(
        content.state.classification_status,
        ClassificationStatus::QuickDone
    );
    assert!(content.state.show_classification);

    // The decision is audited.
    let signals = fixture.db.signals.list_for_content(id).await.unwrap();
    assert!(!signals.is_empty());

    fixture.cleanup_content(id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_arbitration_model_overrides_heuristic() {
    let fixture = TestDatabase::new().await;
    let bus = EventBus::new();
    let id = seed_parsed_content(&fixture, MEETING_TITLE, MEETING_BODY).await;

    // Quick classifier assigns 职场商务 first.
    let quick = QuickClassifier::new(fixture.db.clone(), bus.clone());
    quick.quick_classify(id, false).await.unwrap();

    // The model disagrees; it must win regardless of confidence.
    let backend = MockBackend::default();
    backend.push_response(classification_json("学习成长", 0.55));
    let service = ClassificationService::new(fixture.db.clone(), Arc::new(backend), bus);

    let outcome = service.classify(id, false).await.unwrap();
    match outcome {
        ClassificationOutcome::Classified {
            category_name,
            used_fallback,
            ..
        } => {
            assert_eq!(category_name, "学习成长");
            assert!(!used_fallback);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // Exactly one primary_system row remains, and it is the model's.
    let associations = fixture.db.categories.associations_for_content(id).await.unwrap();
    let primaries: Vec<_> = associations
        .iter()
        .filter(|a| a.role == CategoryRole::PrimarySystem)
        .collect();
    assert_eq!(primaries.len(), 1);
    assert_eq!(primaries[0].source, ClassificationSource::Ml);

    let category = fixture
        .db
        .categories
        .get(primaries[0].category_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(category.name, "学习成长");

    assert!(fixture.db.contents.fetch(id).await.unwrap().state.show_classification);

    fixture.cleanup_content(id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_classify_is_idempotent() {
    let fixture = TestDatabase::new().await;
    let bus = EventBus::new();
    let id = seed_parsed_content(&fixture, "学习笔记.md", "今天学习了数据库索引的知识").await;

    let backend = MockBackend::default();
    backend.push_response(classification_json("学习成长", 0.9));
    let service = ClassificationService::new(fixture.db.clone(), Arc::new(backend.clone()), bus);

    let first = service.classify(id, false).await.unwrap();
    let first_category = match first {
        ClassificationOutcome::Classified { category_id, .. } => category_id,
        other => panic!("unexpected outcome: {:?}", other),
    };

    // Second call short-circuits without touching the backend again.
    let calls_before = backend.generate_calls().len();
    let second = service.classify(id, false).await.unwrap();
    match second {
        ClassificationOutcome::AlreadyClassified { category_id } => {
            assert_eq!(category_id, first_category);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(backend.generate_calls().len(), calls_before);

    let associations = fixture.db.categories.associations_for_content(id).await.unwrap();
    let primaries = associations
        .iter()
        .filter(|a| a.role == CategoryRole::PrimarySystem)
        .count();
    assert_eq!(primaries, 1, "no duplicate primary rows after re-run");

    fixture.cleanup_content(id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_model_failure_degrades_to_heuristic() {
    let fixture = TestDatabase::new().await;
    let bus = EventBus::new();
    let id = seed_parsed_content(&fixture, MEETING_TITLE, MEETING_BODY).await;

    let quick = QuickClassifier::new(fixture.db.clone(), bus.clone());
    quick.quick_classify(id, false).await.unwrap();

    let backend = MockBackend::default();
    backend.set_failing(true);
    let service = ClassificationService::new(fixture.db.clone(), Arc::new(backend), bus);

    let outcome = service.classify(id, false).await.unwrap();
    assert!(matches!(outcome, ClassificationOutcome::Degraded { .. }));

    let content = fixture.db.contents.fetch(id).await.unwrap();
    assert_eq!(
        content.state.classification_status,
        ClassificationStatus::Error
    );
    // A provisional label is better than an indefinite spinner.
    assert!(content.state.show_classification);

    let primary = fixture
        .db
        .categories
        .primary_for_content(id)
        .await
        .unwrap()
        .expect("heuristic label must survive");
    assert_eq!(primary.source, ClassificationSource::Heuristic);

    fixture.cleanup_content(id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_malformed_response_falls_back_to_keywords() {
    let fixture = TestDatabase::new().await;
    let bus = EventBus::new();
    let id = seed_parsed_content(&fixture, "学习笔记", "学习 学习 笔记 知识 课程").await;

    let backend = MockBackend::default();
    backend.push_response("抱歉，我无法处理这个请求。");
    let service = ClassificationService::new(fixture.db.clone(), Arc::new(backend), bus);

    let outcome = service.classify(id, false).await.unwrap();
    match outcome {
        ClassificationOutcome::Classified {
            category_name,
            used_fallback,
            ..
        } => {
            assert_eq!(category_name, "学习成长");
            assert!(used_fallback);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    fixture.cleanup_content(id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_classify_waits_for_parsing() {
    let fixture = TestDatabase::new().await;
    let bus = EventBus::new();
    // Parsing still pending.
    let id = fixture.seed_content("待解析.pdf", "").await;

    let backend = MockBackend::default();
    let service = ClassificationService::new(fixture.db.clone(), Arc::new(backend.clone()), bus);

    let outcome = service.classify(id, false).await.unwrap();
    assert!(matches!(outcome, ClassificationOutcome::Retrying(_)));
    // The external service must not have been called.
    assert!(backend.generate_calls().is_empty());

    fixture.cleanup_content(id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_collection_obvious_match_override() {
    let fixture = TestDatabase::new().await;
    let bus = EventBus::new();
    let matcher = CollectionMatcher::new(fixture.db.clone(), bus);

    let created = matcher
        .create_collection("旅游", Some("旅行相关的照片和文档"), true)
        .await
        .unwrap();

    let id = fixture
        .seed_content_with_modality(
            "迪士尼乐园门票.jpg",
            "这次度假去了乐园，风景不错，还订了酒店",
            kasten_core::Modality::Image,
        )
        .await;
    fixture
        .db
        .contents
        .set_parsing_status(id, ParsingStatus::Completed)
        .await
        .unwrap();

    let matched = matcher.match_collections(id).await.unwrap();
    assert!(
        matched.contains(&created.id),
        "obvious-match trigger must fold the ticket photo into 旅游"
    );

    // Re-running must not create duplicate associations.
    let matched_again = matcher.match_collections(id).await.unwrap();
    assert!(matched_again.contains(&created.id));
    let associations = fixture.db.categories.associations_for_content(id).await.unwrap();
    let rule_rows = associations
        .iter()
        .filter(|a| a.role == CategoryRole::UserRule && a.category_id == created.category_id)
        .count();
    assert_eq!(rule_rows, 1);

    fixture.cleanup_content(id).await;
    kasten_core::CollectionRepository::delete(&fixture.db.collections, created.id)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_match_collections_missing_content_surfaces_error() {
    let fixture = TestDatabase::new().await;
    let matcher = CollectionMatcher::new(fixture.db.clone(), EventBus::new());

    let result = matcher.match_collections(Uuid::new_v4()).await;
    assert!(matches!(
        result,
        Err(kasten_core::Error::ContentNotFound(_))
    ));
}
