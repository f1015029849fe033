//! Pipeline completion events.
//!
//! Stage handlers publish a "stage X done for content Y" event when they
//! finish, so dependent stages can be triggered directly instead of
//! guessing completion times with fixed delays. Delay-scheduled jobs are
//! kept as an idempotent safety net; the events remove the common-case
//! latency, they do not replace the re-check contract.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::defaults;

/// Pipeline stages that emit completion events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Parsing,
    Embedding,
    QuickClassify,
    ModelClassify,
    CollectionMatch,
}

/// An event on the pipeline bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A stage finished for a content row (successfully or via fallback).
    StageCompleted {
        content_id: Uuid,
        stage: PipelineStage,
    },
    /// A stage hit a terminal error for a content row.
    StageFailed {
        content_id: Uuid,
        stage: PipelineStage,
        error: String,
    },
}

/// Broadcast bus for pipeline events. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(defaults::EVENT_BUS_CAPACITY)
    }

    /// Create a bus with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Lagging or absent subscribers are not an error.
    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let content_id = Uuid::new_v4();

        bus.publish(PipelineEvent::StageCompleted {
            content_id,
            stage: PipelineStage::QuickClassify,
        });

        match rx.recv().await.unwrap() {
            PipelineEvent::StageCompleted { content_id: id, stage } => {
                assert_eq!(id, content_id);
                assert_eq!(stage, PipelineStage::QuickClassify);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::new();
        bus.publish(PipelineEvent::StageFailed {
            content_id: Uuid::new_v4(),
            stage: PipelineStage::ModelClassify,
            error: "timeout".into(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let content_id = Uuid::new_v4();

        bus.publish(PipelineEvent::StageCompleted {
            content_id,
            stage: PipelineStage::Embedding,
        });

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }
}
