//! Pipeline stage scheduling configuration.

use kasten_core::defaults;

/// Delays and retry behavior for the content pipeline. Injected into the
/// ingest service and stage handlers; nothing reads the environment at
/// call time.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Delay before the model classifier runs after ingestion, seconds.
    pub model_classify_delay_secs: i64,
    /// Delay before the scheduled collection-match safety net, seconds.
    pub collection_match_delay_secs: i64,
    /// Delay before re-checking an unmet stage precondition, seconds.
    pub precondition_retry_delay_secs: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_classify_delay_secs: defaults::MODEL_CLASSIFY_DELAY_SECS,
            collection_match_delay_secs: defaults::COLLECTION_MATCH_DELAY_SECS,
            precondition_retry_delay_secs: defaults::PRECONDITION_RETRY_DELAY_SECS,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `KASTEN_MODEL_CLASSIFY_DELAY_SECS` | `30` |
    /// | `KASTEN_COLLECTION_MATCH_DELAY_SECS` | `60` |
    /// | `KASTEN_PRECONDITION_RETRY_DELAY_SECS` | `5` |
    pub fn from_env() -> Self {
        let read = |name: &str, fallback: i64| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(fallback)
        };

        Self {
            model_classify_delay_secs: read(
                "KASTEN_MODEL_CLASSIFY_DELAY_SECS",
                defaults::MODEL_CLASSIFY_DELAY_SECS,
            ),
            collection_match_delay_secs: read(
                "KASTEN_COLLECTION_MATCH_DELAY_SECS",
                defaults::COLLECTION_MATCH_DELAY_SECS,
            ),
            precondition_retry_delay_secs: read(
                "KASTEN_PRECONDITION_RETRY_DELAY_SECS",
                defaults::PRECONDITION_RETRY_DELAY_SECS,
            ),
        }
    }

    /// Set the model classifier delay.
    pub fn with_model_classify_delay(mut self, secs: i64) -> Self {
        self.model_classify_delay_secs = secs;
        self
    }

    /// Set the collection match delay.
    pub fn with_collection_match_delay(mut self, secs: i64) -> Self {
        self.collection_match_delay_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays() {
        let config = PipelineConfig::default();
        assert_eq!(config.model_classify_delay_secs, 30);
        assert_eq!(config.collection_match_delay_secs, 60);
        assert_eq!(config.precondition_retry_delay_secs, 5);
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::default()
            .with_model_classify_delay(0)
            .with_collection_match_delay(1);
        assert_eq!(config.model_classify_delay_secs, 0);
        assert_eq!(config.collection_match_delay_secs, 1);
    }
}
