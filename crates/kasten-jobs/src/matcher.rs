//! Collection matching service.
//!
//! Folds documents into user-defined collections by scoring them against
//! each collection's generated rules. Runs after classification settles
//! and is fully idempotent: re-running never duplicates associations.

use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use kasten_core::{
    defaults, CategoryRepository, CategoryRole, ClassificationSource, ClassificationStatus,
    Collection, CollectionRepository, ContentCategory, ContentRepository, Error, EventBus,
    PipelineEvent, PipelineStage, Result, RuleGenerator, SignalRepository, SignalType,
};
use kasten_db::Database;

/// Result of creating a collection.
#[derive(Debug, Clone)]
pub struct CreatedCollection {
    pub id: Uuid,
    pub category_id: Uuid,
    /// Existing contents folded in during backfill.
    pub matched_existing: usize,
}

/// Collection auto-matching service.
#[derive(Clone)]
pub struct CollectionMatcher {
    db: Database,
    bus: EventBus,
}

impl CollectionMatcher {
    /// Create a matcher over the given database.
    pub fn new(db: Database, bus: EventBus) -> Self {
        Self { db, bus }
    }

    /// Create a user collection with a backing category and generated
    /// match rules, then fold in existing contents.
    pub async fn create_collection(
        &self,
        name: &str,
        description: Option<&str>,
        auto_match: bool,
    ) -> Result<CreatedCollection> {
        let existing = self.db.collections.list_user().await?;
        if existing.iter().any(|c| c.name == name) {
            return Err(Error::InvalidInput(format!(
                "collection '{}' already exists",
                name
            )));
        }

        let category_id = self.resolve_backing_category(name, description).await?;

        let rules = auto_match.then(|| RuleGenerator::generate(name, description));
        let collection_id = self
            .db
            .collections
            .create(name, description, category_id, rules.as_ref())
            .await?;

        let matched_existing = if rules.is_some() {
            self.match_existing_to_collection(collection_id).await?
        } else {
            0
        };

        info!(
            collection_id = %collection_id,
            name,
            matched_existing,
            "Created collection"
        );

        Ok(CreatedCollection {
            id: collection_id,
            category_id,
            matched_existing,
        })
    }

    /// The category that backs a collection: reuse an existing user
    /// category of the same name, or create one. A clash with a system
    /// category name gets a suffix instead of touching the taxonomy.
    async fn resolve_backing_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Uuid> {
        let fallback_desc = format!("自建合集: {}", name);
        let desc = description.unwrap_or(&fallback_desc);

        match self.db.categories.get_by_name(name).await? {
            Some(category) if !category.is_system => Ok(category.id),
            Some(_) => {
                let suffixed = format!("{}_用户合集", name);
                match self.db.categories.get_by_name(&suffixed).await? {
                    Some(category) => Ok(category.id),
                    None => {
                        self.db
                            .categories
                            .create(&suffixed, Some(desc), Some("#1890ff"), false)
                            .await
                    }
                }
            }
            None => {
                self.db
                    .categories
                    .create(name, Some(desc), Some("#1890ff"), false)
                    .await
            }
        }
    }

    /// Match one content against every user collection. Idempotent: safe
    /// to call repeatedly. Per-collection failures are logged and skipped
    /// so one bad rule set never blocks the rest.
    pub async fn match_collections(&self, content_id: Uuid) -> Result<Vec<Uuid>> {
        let content = self.db.contents.fetch(content_id).await?;

        if content.title.is_empty() && content.text.is_empty() {
            debug!(content_id = %content_id, "Skipping collection match for empty content");
            return Ok(Vec::new());
        }

        let collections = self.db.collections.list_user().await?;
        let mut matched = Vec::new();

        for collection in collections {
            match self.match_one(&content, &collection).await {
                Ok(true) => matched.push(collection.id),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        content_id = %content_id,
                        collection_id = %collection.id,
                        error = %e,
                        "Collection match failed, continuing"
                    );
                }
            }
        }

        // Membership is now settled for this pass.
        self.db
            .contents
            .set_classification_status(content_id, ClassificationStatus::Completed)
            .await?;

        self.bus.publish(PipelineEvent::StageCompleted {
            content_id,
            stage: PipelineStage::CollectionMatch,
        });

        info!(
            content_id = %content_id,
            matched = matched.len(),
            "Collection matching completed"
        );
        Ok(matched)
    }

    /// Fold existing contents into a (usually new) collection.
    pub async fn match_existing_to_collection(&self, collection_id: Uuid) -> Result<usize> {
        let collection = self
            .db
            .collections
            .get(collection_id)
            .await?
            .ok_or(Error::CollectionNotFound(collection_id))?;

        let mut matched = 0usize;
        for content_id in self.db.contents.list_all_ids().await? {
            let content = match self.db.contents.get(content_id).await? {
                Some(c) => c,
                None => continue,
            };
            match self.match_one(&content, &collection).await {
                Ok(true) => matched += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        content_id = %content_id,
                        collection_id = %collection_id,
                        error = %e,
                        "Backfill match failed, continuing"
                    );
                }
            }
        }

        Ok(matched)
    }

    /// Score one (content, collection) pair; create the association on
    /// match. Returns whether the pair matches, regardless of whether the
    /// association already existed.
    async fn match_one(
        &self,
        content: &kasten_core::Content,
        collection: &Collection,
    ) -> Result<bool> {
        let Some(category_id) = collection.category_id else {
            warn!(collection_id = %collection.id, "Collection has no backing category");
            return Ok(false);
        };

        let rules = match &collection.query_rules {
            Some(rules) => rules.clone(),
            None => {
                // Lazily generate and persist on first match attempt.
                let rules =
                    RuleGenerator::generate(&collection.name, collection.description.as_deref());
                if let Err(e) = self.db.collections.update_rules(collection.id, &rules).await {
                    warn!(
                        collection_id = %collection.id,
                        error = %e,
                        "Could not persist generated rules, matching with in-memory rules"
                    );
                }
                rules
            }
        };

        if !rules.auto_match {
            return Ok(false);
        }

        let breakdown = RuleGenerator::score(
            &collection.name,
            &rules,
            &content.title,
            &content.text,
            content.modality,
        );

        debug!(
            content_id = %content.id,
            collection = %collection.name,
            total = breakdown.total,
            threshold = breakdown.threshold,
            obvious = breakdown.obvious_trigger,
            "Scored content against collection"
        );

        if !RuleGenerator::is_match(&breakdown) {
            return Ok(false);
        }

        let reasoning = format!("自动匹配到合集: {}", collection.name);
        let already = self
            .db
            .categories
            .association_exists(content.id, category_id, &reasoning)
            .await?;

        if !already {
            self.db
                .categories
                .upsert_association(&ContentCategory {
                    content_id: content.id,
                    category_id,
                    confidence: defaults::RULE_MATCH_CONFIDENCE,
                    reasoning: Some(reasoning.clone()),
                    role: CategoryRole::UserRule,
                    source: ClassificationSource::Rule,
                    created_at: chrono::Utc::now(),
                })
                .await?;

            self.db
                .signals
                .record(
                    content.id,
                    SignalType::CollectionMatch,
                    json!({
                        "collection": collection.name,
                        "collection_id": collection.id,
                        "title_score": breakdown.title,
                        "body_score": breakdown.body,
                        "structured_score": breakdown.structured,
                        "total": breakdown.total,
                        "threshold": breakdown.threshold,
                        "obvious_trigger": breakdown.obvious_trigger,
                    }),
                    Some(defaults::RULE_MATCH_CONFIDENCE),
                    None,
                )
                .await?;

            info!(
                content_id = %content.id,
                collection = %collection.name,
                total = breakdown.total,
                "Matched content to collection"
            );
        }

        Ok(true)
    }
}
