// ============================================================================
// Outbox Core - Generic Abstractions
// ============================================================================
//
// Aggregate-agnostic building blocks: the event contract, the outbox row and
// the error taxonomy of the durable store. No Order-specific code lives here.
//
// ============================================================================

pub mod aggregate;
pub mod errors;
pub mod event;
pub mod record;

pub use aggregate::Aggregate;
pub use errors::StoreError;
pub use event::DomainEvent;
pub use record::OutboxRecord;
