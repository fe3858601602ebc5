use chrono::Utc;
use rust_decimal::Decimal;

use super::commands::PlaceOrderCommand;
use super::errors::OrderError;
use super::events::{OrderEvent, OrderPlaced};
use super::value_objects::{OrderId, OrderStatus};
use crate::outbox::core::Aggregate;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// State is stored directly (not rebuilt from events). Each transition
// validates the current status, mutates, and buffers the event it produced.
// `version` doubles as the sequence of the last emitted event and is what the
// store compares against when it saves the aggregate.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    status: OrderStatus,
    customer_email: String,
    total: Decimal,
    version: i64,

    // Version as last read from / written to the store. `None` until the
    // first successful save, which is what selects insert over update.
    persisted_version: Option<i64>,

    pending_events: Vec<OrderEvent>,
}

impl Order {
    /// Brand new order in NEW, version 0, never persisted.
    pub fn new(customer_email: impl Into<String>, total: Decimal) -> Self {
        Self {
            id: OrderId::new(),
            status: OrderStatus::New,
            customer_email: customer_email.into(),
            total,
            version: 0,
            persisted_version: None,
            pending_events: Vec::new(),
        }
    }

    pub fn from_command(cmd: &PlaceOrderCommand) -> Self {
        Self::new(cmd.customer_email(), cmd.total())
    }

    /// Rehydrate an order loaded from the store.
    pub fn restore(
        id: OrderId,
        customer_email: String,
        total: Decimal,
        version: i64,
        status: OrderStatus,
    ) -> Self {
        Self {
            id,
            status,
            customer_email,
            total,
            version,
            persisted_version: Some(version),
            pending_events: Vec::new(),
        }
    }

    pub fn place(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::New {
            return Err(OrderError::InvalidState {
                action: "place",
                status: self.status,
            });
        }

        self.status = OrderStatus::Placed;
        let next_seq = self.version + 1;
        self.pending_events.push(OrderEvent::Placed(OrderPlaced {
            order_id: self.id,
            sequence: next_seq,
            occurred_at: Utc::now(),
            customer_email: self.customer_email.clone(),
            total: self.total,
        }));
        self.version = next_seq;

        Ok(())
    }

    // No event yet; the version still moves so a concurrent pay loses the
    // compare-and-swap.
    pub fn pay(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Placed {
            return Err(OrderError::InvalidState {
                action: "pay",
                status: self.status,
            });
        }

        self.status = OrderStatus::Paid;
        self.version += 1;

        Ok(())
    }

    /// Record that the current version is now durable.
    pub fn mark_persisted(&mut self) {
        self.persisted_version = Some(self.version);
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn persisted_version(&self) -> Option<i64> {
        self.persisted_version
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }
}

impl Aggregate for Order {
    type Event = OrderEvent;

    fn aggregate_id(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn pull_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
