// ============================================================================
// Transactional Outbox
// ============================================================================
//
// - core:  event contract, outbox row, aggregate trait, store errors
// - store: unit-of-work and outbox ports plus Postgres / in-memory backends
//
// The relay (publisher) and retention (cleanup) jobs live in `crate::workers`.
//
// ============================================================================

pub mod core;
pub mod store;

pub use self::core::{Aggregate, DomainEvent, OutboxRecord, StoreError};
pub use self::store::{append_pending, InMemoryStore, OrderStore, OutboxStore, PgOutboxStore, UnitOfWork};
