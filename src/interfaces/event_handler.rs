// ============================================================================
// Event Handler Interface
// Defines the contract for observing bulk pipeline progress
// ============================================================================

use crate::domain::BulkOperation;
use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Events emitted by the bulk orchestrator
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BulkEvent {
    /// Batch picked up for processing
    BatchStarted {
        operation: BulkOperation,
        batch_index: usize,
        start_index: usize,
        size: usize,
        timestamp: DateTime<Utc>,
    },

    /// Item rejected before persistence (validation or calculation)
    ItemRejected {
        index: usize,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Storage port accepted the batch
    BatchPersisted {
        batch_index: usize,
        inserted: usize,
        updated: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },

    /// Storage port call failed for the whole batch
    BatchFailed {
        batch_index: usize,
        start_index: usize,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Bulk call finished
    Completed {
        operation: BulkOperation,
        inserted: usize,
        updated: usize,
        failed: usize,
        calculation_version: String,
        timestamp: DateTime<Utc>,
    },
}

/// Event handler trait for processing orchestrator events
/// Implementations can handle logging, metrics, notifications, etc.
pub trait EventHandler: Send + Sync {
    /// Handle a bulk event
    fn on_event(&self, event: BulkEvent);

    /// Batch event handler (optional optimization)
    fn on_events(&self, events: Vec<BulkEvent>) {
        for event in events {
            self.on_event(event);
        }
    }
}

/// No-op event handler for testing
pub struct NoOpEventHandler;

impl EventHandler for NoOpEventHandler {
    fn on_event(&self, _event: BulkEvent) {}
}

/// Logging event handler
pub struct LoggingEventHandler;

impl EventHandler for LoggingEventHandler {
    fn on_event(&self, event: BulkEvent) {
        match &event {
            BulkEvent::BatchFailed { .. } => tracing::warn!("Bulk event: {:?}", event),
            BulkEvent::Completed { .. } => tracing::info!("Bulk event: {:?}", event),
            _ => tracing::debug!("Bulk event: {:?}", event),
        }
    }
}

/// Collects events in memory; useful for tests and audits of a single call
#[derive(Default)]
pub struct RecordingEventHandler {
    events: parking_lot::Mutex<Vec<BulkEvent>>,
}

impl RecordingEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BulkEvent> {
        self.events.lock().clone()
    }
}

impl EventHandler for RecordingEventHandler {
    fn on_event(&self, event: BulkEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_handler() {
        let handler = NoOpEventHandler;
        handler.on_event(BulkEvent::ItemRejected {
            index: 0,
            reason: "missing name".to_string(),
            timestamp: Utc::now(),
        });
        // Should not panic
    }

    #[test]
    fn test_logging_handler_without_subscriber() {
        LoggingEventHandler.on_event(BulkEvent::Completed {
            operation: BulkOperation::Upsert,
            inserted: 1,
            updated: 0,
            failed: 0,
            calculation_version: "1.0.0".to_string(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn test_recording_handler() {
        let handler = RecordingEventHandler::new();
        handler.on_events(vec![
            BulkEvent::BatchStarted {
                operation: BulkOperation::Create,
                batch_index: 0,
                start_index: 0,
                size: 10,
                timestamp: Utc::now(),
            },
            BulkEvent::BatchFailed {
                batch_index: 0,
                start_index: 0,
                error: "connection reset".to_string(),
                timestamp: Utc::now(),
            },
        ]);
        assert_eq!(handler.events().len(), 2);
    }
}
