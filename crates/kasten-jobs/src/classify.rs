//! Model-backed classification service.
//!
//! The model's verdict is always authoritative: on success every existing
//! system label (heuristic or otherwise) is deleted and replaced. The
//! fallback chain mirrors how the external call can degrade:
//! out-of-taxonomy labels resolve by similarity inside response parsing,
//! unparseable responses fall back to keyword scoring, and outright call
//! failures leave the heuristic label in place with an error status.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use kasten_core::{
    taxonomy, CategoryConfidence, CategoryRepository, CategoryRole, ClassificationSource,
    ClassificationStatus, ContentCategory, ContentRepository, Error, EventBus, GenerationBackend,
    ParsingStatus, PipelineEvent, PipelineStage, Result, SignalRepository, SignalType,
};
use kasten_db::Database;
use kasten_inference::{classification_prompt, parse_classification, ModelClassification, CLASSIFY_SYSTEM_PROMPT};

/// Outcome of a model classification pass.
#[derive(Debug, Clone)]
pub enum ClassificationOutcome {
    /// An authoritative label was written.
    Classified {
        category_id: Uuid,
        category_name: String,
        confidence: f32,
        reasoning: String,
        /// True when the keyword fallback produced the label.
        used_fallback: bool,
    },
    /// An ml-sourced label already exists; nothing was changed.
    AlreadyClassified { category_id: Uuid },
    /// Parsing has not finished; the stage should re-check shortly.
    Retrying(String),
    /// The external call failed; the heuristic label stays, status is
    /// `error`, and the provisional label is made visible.
    Degraded { error: String },
}

/// Model-backed classification service.
pub struct ClassificationService {
    db: Database,
    backend: Arc<dyn GenerationBackend>,
    bus: EventBus,
}

impl ClassificationService {
    /// Create a classification service.
    pub fn new(db: Database, backend: Arc<dyn GenerationBackend>, bus: EventBus) -> Self {
        Self { db, backend, bus }
    }

    /// Classify a content with the external model. Idempotent and safe to
    /// call repeatedly; `force_reclassify` re-runs even over an existing
    /// ml-sourced label.
    pub async fn classify(
        &self,
        content_id: Uuid,
        force_reclassify: bool,
    ) -> Result<ClassificationOutcome> {
        let content = self.db.contents.fetch(content_id).await?;

        // A parse still in flight means the text is not authoritative yet.
        // Parse errors do NOT block: whatever text exists gets classified.
        if matches!(
            content.state.parsing_status,
            ParsingStatus::Pending | ParsingStatus::Parsing
        ) {
            return Ok(ClassificationOutcome::Retrying(format!(
                "parsing_status={}",
                content.state.parsing_status.as_str()
            )));
        }

        if !force_reclassify {
            if let Some(primary) = self.db.categories.primary_for_content(content_id).await? {
                if primary.source == ClassificationSource::Ml {
                    return Ok(ClassificationOutcome::AlreadyClassified {
                        category_id: primary.category_id,
                    });
                }
            }
        }

        self.db
            .contents
            .set_classification_status(content_id, ClassificationStatus::AiProcessing)
            .await?;

        let prompt = classification_prompt(&content.title, &content.text);
        let raw = match self
            .backend
            .generate_with_system(CLASSIFY_SYSTEM_PROMPT, &prompt)
            .await
        {
            Ok(raw) => raw,
            Err(e) => return self.degrade(content_id, e).await,
        };

        let (classification, used_fallback) = match parse_classification(&raw) {
            Ok(parsed) => (parsed, false),
            Err(e) => {
                warn!(
                    content_id = %content_id,
                    error = %e,
                    "Model response unusable, falling back to keyword scoring"
                );
                let fallback =
                    taxonomy::keyword_fallback_score(&content.title, &content.text);
                (
                    ModelClassification {
                        primary: CategoryConfidence::new(fallback.category, fallback.confidence),
                        secondary: Vec::new(),
                        reasoning: fallback.reasoning,
                    },
                    true,
                )
            }
        };

        self.apply(content_id, classification, used_fallback).await
    }

    /// Classify many contents, reporting per-item outcomes. A failure on
    /// one content never aborts the rest of the batch.
    pub async fn batch_classify(
        &self,
        content_ids: &[Uuid],
        force_reclassify: bool,
    ) -> kasten_core::BatchOutcome {
        let mut outcome = kasten_core::BatchOutcome::default();
        for &id in content_ids {
            match self.classify(id, force_reclassify).await {
                Ok(_) => outcome.record_ok(),
                Err(e) => {
                    warn!(content_id = %id, error = %e, "Classification failed");
                    outcome.record_err(format!("{}: {}", id, e));
                }
            }
        }
        outcome
    }

    /// Replace all system labels with the model's verdict.
    async fn apply(
        &self,
        content_id: Uuid,
        classification: ModelClassification,
        used_fallback: bool,
    ) -> Result<ClassificationOutcome> {
        self.db.categories.ensure_system_categories().await?;
        let category = self
            .db
            .categories
            .get_by_name(&classification.primary.category)
            .await?
            .ok_or_else(|| Error::CategoryNotFound(classification.primary.category.clone()))?;

        // Arbitration: the model result always wins, regardless of which
        // confidence is higher. Heuristic and stale model labels go away.
        let removed = self.db.categories.delete_system_labels(content_id).await?;

        let now = chrono::Utc::now();
        self.db
            .categories
            .upsert_association(&ContentCategory {
                content_id,
                category_id: category.id,
                confidence: classification.primary.confidence,
                reasoning: Some(classification.reasoning.clone()),
                role: CategoryRole::PrimarySystem,
                source: ClassificationSource::Ml,
                created_at: now,
            })
            .await?;

        for tag in &classification.secondary {
            let Some(tag_category) = self.db.categories.get_by_name(&tag.category).await? else {
                continue;
            };
            self.db
                .categories
                .upsert_association(&ContentCategory {
                    content_id,
                    category_id: tag_category.id,
                    confidence: tag.confidence,
                    reasoning: None,
                    role: CategoryRole::SecondaryTag,
                    source: ClassificationSource::Ml,
                    created_at: now,
                })
                .await?;
        }

        self.db
            .contents
            .set_show_classification(content_id, true)
            .await?;

        self.db
            .signals
            .record(
                content_id,
                SignalType::Classification,
                json!({
                    "category": category.name,
                    "confidence": classification.primary.confidence,
                    "reasoning": classification.reasoning,
                    "secondary": classification.secondary,
                    "source": "ml",
                    "used_fallback": used_fallback,
                    "replaced_labels": removed,
                }),
                Some(classification.primary.confidence),
                Some(self.backend.model_name()),
            )
            .await?;

        self.bus.publish(PipelineEvent::StageCompleted {
            content_id,
            stage: PipelineStage::ModelClassify,
        });

        info!(
            content_id = %content_id,
            category = %category.name,
            confidence = classification.primary.confidence,
            used_fallback,
            "Model classified content"
        );

        Ok(ClassificationOutcome::Classified {
            category_id: category.id,
            category_name: category.name,
            confidence: classification.primary.confidence,
            reasoning: classification.reasoning,
            used_fallback,
        })
    }

    /// External call failed outright: keep the heuristic label, mark the
    /// classification as errored, and make whatever label exists visible.
    /// A provisional label beats an indefinite spinner.
    async fn degrade(&self, content_id: Uuid, error: Error) -> Result<ClassificationOutcome> {
        warn!(
            content_id = %content_id,
            error = %error,
            "Model classification failed, keeping heuristic label"
        );

        self.db
            .contents
            .set_classification_status(content_id, ClassificationStatus::Error)
            .await?;
        self.db
            .contents
            .set_show_classification(content_id, true)
            .await?;

        self.db
            .signals
            .record(
                content_id,
                SignalType::Classification,
                json!({
                    "source": "ml",
                    "error": error.to_string(),
                }),
                None,
                Some(self.backend.model_name()),
            )
            .await?;

        self.bus.publish(PipelineEvent::StageFailed {
            content_id,
            stage: PipelineStage::ModelClassify,
            error: error.to_string(),
        });

        Ok(ClassificationOutcome::Degraded {
            error: error.to_string(),
        })
    }
}
