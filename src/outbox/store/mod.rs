// ============================================================================
// Outbox Store - Persistence Ports
// ============================================================================
//
// Two ports over one durable store:
//
// - `OrderStore` opens units of work and loads orders. A `UnitOfWork` is an
//   explicit transaction value: the aggregate write and its outbox rows go
//   through the same value and become visible together on `commit`, or not
//   at all if it is dropped uncommitted.
// - `OutboxStore` is what the publisher and cleanup jobs see: ordered
//   unpublished batches, the one-way publish flip, and retention deletes.
//
// Implementations: `PgOutboxStore` (Postgres via sqlx) and `InMemoryStore`.
//
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::order::{Order, OrderId};
use crate::outbox::core::{Aggregate, DomainEvent, OutboxRecord, StoreError};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgOutboxStore;

#[async_trait]
pub trait UnitOfWork: Send {
    /// First save of an order inserts unconditionally; later saves are a
    /// compare-and-swap on the version the order was loaded with. Losing the
    /// race yields `StoreError::ConcurrencyConflict`.
    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError>;

    /// Stage one unpublished outbox row for `event`. Returns the row id.
    async fn append(&mut self, event: &dyn DomainEvent) -> Result<Uuid, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Up to `limit` unpublished rows ordered by aggregate id, then sequence.
    async fn find_unpublished_batch(&self, limit: usize) -> Result<Vec<OutboxRecord>, StoreError>;

    /// Flip `published` false -> true. Returns rows affected (0 or 1).
    async fn mark_published(&self, id: Uuid) -> Result<u64, StoreError>;

    /// Delete published rows with `occurred_at < cutoff`. Unpublished rows are
    /// never touched.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Drain the aggregate's buffered events into `uow`, in emission order.
///
/// The drained events are handed back so the caller can notify listeners
/// once the unit of work has committed.
pub async fn append_pending<A: Aggregate>(
    uow: &mut dyn UnitOfWork,
    aggregate: &mut A,
) -> Result<Vec<A::Event>, StoreError> {
    let events = aggregate.pull_events();

    for event in &events {
        let id = uow.append(event).await?;
        tracing::debug!(
            outbox_id = %id,
            aggregate_id = %event.aggregate_id(),
            sequence = event.sequence(),
            event_type = event.event_type(),
            "Staged outbox row"
        );
    }

    Ok(events)
}
