use chrono::{DateTime, Utc};

// ============================================================================
// Domain Event Trait
// ============================================================================
//
// What the outbox needs to know about any domain event: which aggregate it
// belongs to, where it sits in that aggregate's sequence, when it happened,
// its type discriminator, and how to turn it into a wire payload.
//
// The trait is object safe so a unit of work can append events of any
// aggregate through `&dyn DomainEvent`.
//
// ============================================================================

pub trait DomainEvent: Send + Sync {
    fn aggregate_id(&self) -> String;

    /// Positive, strictly increasing per aggregate, starting at 1.
    fn sequence(&self) -> i64;

    fn occurred_at(&self) -> DateTime<Utc>;

    fn event_type(&self) -> &'static str;

    /// Serialized event body as published to the broker.
    fn to_payload(&self) -> Result<String, serde_json::Error>;
}
