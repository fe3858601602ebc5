use super::event::DomainEvent;

// ============================================================================
// Aggregate Root - the outbox's view of a consistency boundary
// ============================================================================
//
// Aggregates validate transitions in memory and buffer the events those
// transitions produce. The application layer persists the aggregate and then
// drains the buffer into the same unit of work.
//
// ============================================================================

pub trait Aggregate: Send {
    type Event: DomainEvent;

    fn aggregate_id(&self) -> String;

    /// Equals the sequence of the last event the aggregate emitted, unless a
    /// transition bumped it without emitting one.
    fn version(&self) -> i64;

    /// Hands the buffered events to the caller and leaves the buffer empty.
    fn pull_events(&mut self) -> Vec<Self::Event>;
}
