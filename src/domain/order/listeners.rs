use async_trait::async_trait;

use super::events::OrderEvent;
use crate::outbox::core::DomainEvent;

// ============================================================================
// Post-Commit Listeners
// ============================================================================
//
// In-process observers notified after a unit of work has committed. They are
// not a delivery channel: the outbox row is what reaches the broker. A
// listener must not fail the command, so it has no error channel.
//
// ============================================================================

#[async_trait]
pub trait OrderEventListener: Send + Sync {
    async fn on_committed(&self, event: &OrderEvent);
}

/// Writes one structured line per committed event.
pub struct LoggingEventListener;

#[async_trait]
impl OrderEventListener for LoggingEventListener {
    async fn on_committed(&self, event: &OrderEvent) {
        match event {
            OrderEvent::Placed(placed) => {
                tracing::info!(
                    order_id = %placed.order_id,
                    sequence = placed.sequence,
                    customer_email = %placed.customer_email,
                    total = %placed.total,
                    "📦 Order placed"
                );
            }
        }
        tracing::debug!(
            event_type = event.event_type(),
            aggregate_id = %event.aggregate_id(),
            sequence = event.sequence(),
            occurred_at = %event.occurred_at(),
            "Committed domain event"
        );
    }
}
