//! Domain event system: decoupled observation of job lifecycles.
//!
//! The pipeline and the observation loop publish events as jobs move through
//! their stages. The foreground surface, logs, and tests can subscribe to
//! react without tight coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A job was admitted and is about to run its first stage
    JobStarted {
        job_id: String,
        trigger_role: String,
        session_version: u64,
        timestamp: DateTime<Utc>,
    },

    /// A stage finished successfully
    StageCompleted {
        job_id: String,
        stage: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A job saw its cancellation token at a stage boundary
    JobCancelled {
        job_id: String,
        before_stage: String,
        timestamp: DateTime<Utc>,
    },

    /// A job emitted its result bundle
    JobCompleted {
        job_id: String,
        emotion: String,
        layers: Vec<u32>,
        timestamp: DateTime<Utc>,
    },

    /// A job aborted on an unrecoverable error
    JobFailed {
        job_id: String,
        stage: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A finished job lost the race against a newer session state
    StaleResultDiscarded {
        job_id: String,
        job_version: u64,
        session_version: u64,
        timestamp: DateTime<Utc>,
    },

    /// The emotion classifier answered outside the label set
    EmotionFallback {
        job_id: String,
        returned: String,
        substituted: String,
        timestamp: DateTime<Utc>,
    },

    /// The gating policy judged a screen description
    ObservationGated {
        reportable: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::StageCompleted {
            job_id: "job-1".into(),
            stage: "generate".into(),
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::StageCompleted { job_id, stage, .. } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(stage, "generate");
            }
            _ => panic!("Expected StageCompleted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::ObservationGated {
            reportable: false,
            timestamp: Utc::now(),
        });
    }
}
