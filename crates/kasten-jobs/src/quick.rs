//! Quick heuristic classification service.
//!
//! Scores against the static taxonomy rules and writes a provisional
//! `primary_system` label with `source=heuristic`. Never calls an
//! external service; exists to give the UI a label within milliseconds
//! while the model classifier runs.

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use kasten_core::{
    taxonomy, CategoryRepository, CategoryRole, ClassificationSource, ClassificationStatus,
    ContentCategory, ContentRepository, Error, EventBus, PipelineEvent, PipelineStage, Result,
    SignalRepository, SignalType,
};
use kasten_db::Database;

/// Outcome of a quick classification pass.
#[derive(Debug, Clone)]
pub enum QuickOutcome {
    /// A provisional label was written.
    Classified {
        category_id: Uuid,
        category_name: String,
        confidence: f32,
        reasoning: String,
    },
    /// A system label already exists; nothing was changed.
    AlreadyClassified { category_id: Uuid },
}

/// Quick rule-based classifier.
#[derive(Clone)]
pub struct QuickClassifier {
    db: Database,
    bus: EventBus,
}

impl QuickClassifier {
    /// Create a quick classifier over the given database.
    pub fn new(db: Database, bus: EventBus) -> Self {
        Self { db, bus }
    }

    /// Classify a content row by rules. Idempotent: an existing system
    /// classification short-circuits. `update_display` controls whether
    /// the provisional label becomes visible immediately (display-eligible
    /// ingests without pending file parsing).
    pub async fn quick_classify(&self, content_id: Uuid, update_display: bool) -> Result<QuickOutcome> {
        let content = self.db.contents.fetch(content_id).await?;

        if self.db.categories.has_system_primary(content_id).await? {
            let existing = self
                .db
                .categories
                .primary_for_content(content_id)
                .await?
                .ok_or_else(|| Error::Internal("primary vanished during check".into()))?;
            return Ok(QuickOutcome::AlreadyClassified {
                category_id: existing.category_id,
            });
        }

        self.db
            .contents
            .set_classification_status(content_id, ClassificationStatus::QuickProcessing)
            .await?;

        let score = taxonomy::quick_score(
            &content.title,
            &content.text,
            content.source_uri.as_deref(),
        );

        self.db.categories.ensure_system_categories().await?;
        let category = self
            .db
            .categories
            .get_by_name(score.category)
            .await?
            .ok_or_else(|| Error::CategoryNotFound(score.category.to_string()))?;

        let reasoning = format!("快速分类: {}", score.reasoning);
        self.db
            .categories
            .upsert_association(&ContentCategory {
                content_id,
                category_id: category.id,
                confidence: score.confidence,
                reasoning: Some(reasoning.clone()),
                role: CategoryRole::PrimarySystem,
                source: ClassificationSource::Heuristic,
                created_at: chrono::Utc::now(),
            })
            .await?;

        self.db
            .contents
            .set_classification_status(content_id, ClassificationStatus::QuickDone)
            .await?;
        self.db
            .contents
            .set_show_classification(content_id, update_display)
            .await?;

        self.db
            .signals
            .record(
                content_id,
                SignalType::Classification,
                json!({
                    "category": category.name,
                    "confidence": score.confidence,
                    "reasoning": reasoning,
                    "source": "heuristic",
                    "raw_score": score.raw_score,
                }),
                Some(score.confidence),
                None,
            )
            .await?;

        self.bus.publish(PipelineEvent::StageCompleted {
            content_id,
            stage: PipelineStage::QuickClassify,
        });

        info!(
            content_id = %content_id,
            category = %category.name,
            confidence = score.confidence,
            display = update_display,
            "Quick classified content"
        );

        Ok(QuickOutcome::Classified {
            category_id: category.id,
            category_name: category.name,
            confidence: score.confidence,
            reasoning,
        })
    }

    /// Quick-classify many contents, reporting per-item outcomes.
    pub async fn batch_quick_classify(&self, content_ids: &[Uuid]) -> kasten_core::BatchOutcome {
        let mut outcome = kasten_core::BatchOutcome::default();
        for &id in content_ids {
            match self.quick_classify(id, true).await {
                Ok(_) => outcome.record_ok(),
                Err(e) => {
                    warn!(content_id = %id, error = %e, "Quick classification failed");
                    outcome.record_err(format!("{}: {}", id, e));
                }
            }
        }
        outcome
    }
}
