use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::StoreError;
use super::event::DomainEvent;

// ============================================================================
// Outbox Record - one row of `outbox_events`
// ============================================================================
//
// Created exactly once per domain event, inside the same unit of work as the
// aggregate write. The only mutation it ever sees afterwards is the one-way
// `published` flip; cleanup deletes it once published and past retention.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: Uuid,
    pub aggregate_id: String,
    pub sequence: i64,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: String,
    pub published: bool,
}

impl OutboxRecord {
    /// Builds the unpublished row for `event` under a freshly generated id.
    pub fn from_event(event: &dyn DomainEvent) -> Result<Self, StoreError> {
        let payload = event
            .to_payload()
            .map_err(|source| StoreError::Serialization {
                event_type: event.event_type(),
                source,
            })?;

        Ok(Self {
            id: Uuid::new_v4(),
            aggregate_id: event.aggregate_id(),
            sequence: event.sequence(),
            event_type: event.event_type().to_string(),
            occurred_at: event.occurred_at(),
            payload,
            published: false,
        })
    }

    /// Ordering key of `findUnpublishedBatch`.
    pub fn ordering_key(&self) -> (&str, i64) {
        (&self.aggregate_id, self.sequence)
    }
}

// ============================================================================
// Tests
// ============================================================================
