use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::value_objects::OrderId;
use crate::outbox::core::DomainEvent;

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================

/// Order Event - union of everything the Order aggregate can emit
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Placed(OrderPlaced),
}

impl DomainEvent for OrderEvent {
    fn aggregate_id(&self) -> String {
        match self {
            OrderEvent::Placed(e) => e.order_id.to_string(),
        }
    }

    fn sequence(&self) -> i64 {
        match self {
            OrderEvent::Placed(e) => e.sequence,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Placed(e) => e.occurred_at,
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => OrderPlaced::EVENT_TYPE,
        }
    }

    // The payload is the variant's own body; the discriminator travels in
    // the outbox `type` column and the broker header.
    fn to_payload(&self) -> Result<String, serde_json::Error> {
        match self {
            OrderEvent::Placed(e) => serde_json::to_string(e),
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order Placed - the order left NEW and is now binding
///
/// Downstream consumers read `occurredAt` as an ISO-8601 UTC string and
/// `total` as a JSON number that keeps the decimal's exact digits.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub sequence: i64,
    pub occurred_at: DateTime<Utc>,
    pub customer_email: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub total: Decimal,
}

impl OrderPlaced {
    pub const EVENT_TYPE: &'static str = "OrderPlaced";
}
