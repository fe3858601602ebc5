use std::sync::Arc;

use super::aggregate::Order;
use super::commands::PlaceOrderCommand;
use super::errors::OrderError;
use super::listeners::OrderEventListener;
use super::value_objects::OrderId;
use crate::outbox::core::StoreError;
use crate::outbox::store::{append_pending, OrderStore};

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Unit of Work (order row + outbox rows)
//
// The order write and its outbox rows commit together or not at all. Listeners
// only hear about events after that commit succeeded.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Domain(#[from] OrderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("order {0} not found")]
    NotFound(OrderId),
}

pub struct OrderCommandHandler {
    store: Arc<dyn OrderStore>,
    listeners: Vec<Arc<dyn OrderEventListener>>,
}

impl OrderCommandHandler {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn OrderEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Create a new order and place it in one unit of work.
    pub async fn place_order(&self, cmd: PlaceOrderCommand) -> Result<OrderId, CommandError> {
        let mut order = Order::from_command(&cmd);
        order.place()?;

        self.save(&mut order).await?;

        tracing::info!(
            order_id = %order.id(),
            version = order.version(),
            "✅ Order placed and outbox row committed"
        );
        Ok(order.id())
    }

    /// Load, pay and save under compare-and-swap on the loaded version.
    pub async fn pay_order(&self, id: OrderId) -> Result<(), CommandError> {
        let mut order = self
            .store
            .find_order(id)
            .await?
            .ok_or(CommandError::NotFound(id))?;

        order.pay()?;
        self.save(&mut order).await?;

        tracing::info!(order_id = %id, version = order.version(), "💳 Order paid");
        Ok(())
    }

    async fn save(&self, order: &mut Order) -> Result<(), CommandError> {
        let mut uow = self.store.begin().await?;
        uow.save_order(order).await?;
        let events = append_pending(uow.as_mut(), order).await?;

        if let Err(e) = uow.commit().await {
            tracing::warn!(order_id = %order.id(), error = %e, "Unit of work rejected");
            return Err(e.into());
        }
        order.mark_persisted();

        for event in &events {
            for listener in &self.listeners {
                listener.on_committed(event).await;
            }
        }

        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
