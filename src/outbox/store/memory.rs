use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{OrderStore, OutboxStore, UnitOfWork};
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::outbox::core::{DomainEvent, OutboxRecord, StoreError};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Same contract as the Postgres store, held in process memory. Units of work
// stage their writes and apply them under one lock on commit, so readers
// never observe half of a unit of work. `set_unavailable` simulates a store
// outage: every subsequent call fails with `StoreError::Unavailable`;
// `set_append_failure` limits the outage to outbox appends.
//
// Not durable. Used for tests and when no DATABASE_URL is configured.
//
// ============================================================================

#[derive(Debug, Clone)]
struct OrderRow {
    customer_email: String,
    total: Decimal,
    status: OrderStatus,
    version: i64,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    orders: HashMap<OrderId, OrderRow>,
    outbox: Vec<OutboxRecord>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    unavailable: Arc<AtomicBool>,
    reject_appends: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Outage that only hits outbox appends, after the order row has been
    /// staged in the same unit of work.
    pub fn set_append_failure(&self, fail: bool) {
        self.reject_appends.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every outbox row in insertion order.
    pub async fn records(&self) -> Vec<OutboxRecord> {
        self.state.lock().await.outbox.clone()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

enum StagedOrder {
    Insert { id: OrderId, row: OrderRow },
    Update { id: OrderId, row: OrderRow, expected_version: i64 },
}

pub struct MemoryUnitOfWork {
    store: InMemoryStore,
    orders: Vec<StagedOrder>,
    events: Vec<OutboxRecord>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError> {
        self.store.check_available()?;

        let now = Utc::now();
        let row = OrderRow {
            customer_email: order.customer_email().to_string(),
            total: order.total(),
            status: order.status(),
            version: order.version(),
            created_at: now,
            updated_at: now,
        };

        self.orders.push(match order.persisted_version() {
            None => StagedOrder::Insert { id: order.id(), row },
            Some(expected_version) => StagedOrder::Update {
                id: order.id(),
                row,
                expected_version,
            },
        });

        Ok(())
    }

    async fn append(&mut self, event: &dyn DomainEvent) -> Result<Uuid, StoreError> {
        self.store.check_available()?;
        if self.store.reject_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("outbox append rejected".to_string()));
        }

        let record = OutboxRecord::from_event(event)?;
        let id = record.id;
        self.events.push(record);
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.store.check_available()?;

        let MemoryUnitOfWork {
            store,
            orders,
            events,
        } = *self;
        let mut state = store.state.lock().await;

        // Validate everything first so a rejected commit leaves no trace.
        for staged in &orders {
            match staged {
                StagedOrder::Insert { id, .. } => {
                    if state.orders.contains_key(id) {
                        return Err(StoreError::ConcurrencyConflict {
                            aggregate_id: id.to_string(),
                            expected_version: None,
                        });
                    }
                }
                StagedOrder::Update {
                    id,
                    expected_version,
                    ..
                } => {
                    let current = state.orders.get(id).map(|row| row.version);
                    if current != Some(*expected_version) {
                        return Err(StoreError::ConcurrencyConflict {
                            aggregate_id: id.to_string(),
                            expected_version: Some(*expected_version),
                        });
                    }
                }
            }
        }

        let mut keys: HashSet<(String, i64)> = state
            .outbox
            .iter()
            .map(|r| (r.aggregate_id.clone(), r.sequence))
            .collect();
        for record in &events {
            if !keys.insert((record.aggregate_id.clone(), record.sequence)) {
                return Err(StoreError::ConcurrencyConflict {
                    aggregate_id: record.aggregate_id.clone(),
                    expected_version: Some(record.sequence - 1),
                });
            }
        }

        for staged in orders {
            match staged {
                StagedOrder::Insert { id, row } => {
                    state.orders.insert(id, row);
                }
                StagedOrder::Update { id, mut row, .. } => {
                    if let Some(existing) = state.orders.get(&id) {
                        row.created_at = existing.created_at;
                    }
                    state.orders.insert(id, row);
                }
            }
        }
        state.outbox.extend(events);

        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        self.check_available()?;

        Ok(Box::new(MemoryUnitOfWork {
            store: self.clone(),
            orders: Vec::new(),
            events: Vec::new(),
        }))
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.check_available()?;

        let state = self.state.lock().await;
        Ok(state.orders.get(&id).map(|row| {
            Order::restore(
                id,
                row.customer_email.clone(),
                row.total,
                row.version,
                row.status,
            )
        }))
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn find_unpublished_batch(&self, limit: usize) -> Result<Vec<OutboxRecord>, StoreError> {
        self.check_available()?;

        let state = self.state.lock().await;
        let mut batch: Vec<OutboxRecord> = state
            .outbox
            .iter()
            .filter(|r| !r.published)
            .cloned()
            .collect();
        batch.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));
        batch.truncate(limit);

        Ok(batch)
    }

    async fn mark_published(&self, id: Uuid) -> Result<u64, StoreError> {
        self.check_available()?;

        let mut state = self.state.lock().await;
        match state.outbox.iter_mut().find(|r| r.id == id && !r.published) {
            Some(record) => {
                record.published = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_available()?;

        let mut state = self.state.lock().await;
        let before = state.outbox.len();
        state
            .outbox
            .retain(|r| !(r.published && r.occurred_at < cutoff));

        Ok((before - state.outbox.len()) as u64)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderEvent, OrderPlaced};
    use chrono::Duration;

    fn placed(aggregate: OrderId, sequence: i64, occurred_at: DateTime<Utc>) -> OrderEvent {
        OrderEvent::Placed(OrderPlaced {
            order_id: aggregate,
            sequence,
            occurred_at,
            customer_email: "a@b.com".to_string(),
            total: Decimal::ONE,
        })
    }

    async fn append_all(store: &InMemoryStore, events: &[OrderEvent]) {
        let mut uow = store.begin().await.unwrap();
        for event in events {
            uow.append(event).await.unwrap();
        }
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_batch_orders_sequences_regardless_of_insertion_order() {
        let store = InMemoryStore::new();
        let x = OrderId::new();
        let now = Utc::now();

        append_all(&store, &[placed(x, 2, now), placed(x, 1, now)]).await;

        let batch = store.find_unpublished_batch(10).await.unwrap();
        let sequences: Vec<i64> = batch.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_batch_is_sorted_by_aggregate_then_sequence() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let ids: Vec<OrderId> = (0..4).map(|_| OrderId::new()).collect();

        // Interleave aggregates and sequences in a scrambled order, across
        // several units of work.
        let mut events = Vec::new();
        for seq in [3, 1, 4, 2] {
            for id in ids.iter().rev() {
                events.push(placed(*id, seq, now));
            }
        }
        append_all(&store, &events[..7]).await;
        append_all(&store, &events[7..]).await;

        let batch = store.find_unpublished_batch(100).await.unwrap();
        assert_eq!(batch.len(), 16);
        for pair in batch.windows(2) {
            assert!(pair[0].ordering_key() < pair[1].ordering_key());
        }
    }

    #[tokio::test]
    async fn test_batch_respects_limit_and_skips_published() {
        let store = InMemoryStore::new();
        let x = OrderId::new();
        let now = Utc::now();
        append_all(&store, &[placed(x, 1, now), placed(x, 2, now), placed(x, 3, now)]).await;

        let first = store.find_unpublished_batch(2).await.unwrap();
        assert_eq!(first.len(), 2);
        store.mark_published(first[0].id).await.unwrap();

        let next = store.find_unpublished_batch(10).await.unwrap();
        let sequences: Vec<i64> = next.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_mark_published_is_idempotent() {
        let store = InMemoryStore::new();
        append_all(&store, &[placed(OrderId::new(), 1, Utc::now())]).await;
        let id = store.records().await[0].id;

        assert_eq!(store.mark_published(id).await.unwrap(), 1);
        assert_eq!(store.mark_published(id).await.unwrap(), 0);
        assert!(store.records().await[0].published);
        assert_eq!(store.mark_published(Uuid::new_v4()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_never_removes_unpublished_rows() {
        let store = InMemoryStore::new();
        let ancient = Utc::now() - Duration::days(365);
        let x = OrderId::new();
        append_all(&store, &[placed(x, 1, ancient), placed(x, 2, ancient)]).await;
        let records = store.records().await;
        store.mark_published(records[0].id).await.unwrap();

        let deleted = store.delete_older_than(Utc::now()).await.unwrap();

        assert_eq!(deleted, 1);
        let remaining = store.records().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].sequence, 2);
        assert!(!remaining[0].published);
    }

    #[tokio::test]
    async fn test_uncommitted_unit_of_work_leaves_nothing_behind() {
        let store = InMemoryStore::new();
        let mut order = Order::new("a@b.com", Decimal::ONE);
        order.place().unwrap();

        {
            let mut uow = store.begin().await.unwrap();
            uow.save_order(&order).await.unwrap();
            uow.append(&placed(order.id(), 1, Utc::now())).await.unwrap();
            // dropped without commit
        }

        assert_eq!(store.order_count().await, 0);
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_version_update_is_a_conflict() {
        let store = InMemoryStore::new();
        let mut order = Order::new("a@b.com", Decimal::ONE);
        order.place().unwrap();
        let mut uow = store.begin().await.unwrap();
        uow.save_order(&order).await.unwrap();
        uow.commit().await.unwrap();

        let mut first = store.find_order(order.id()).await.unwrap().unwrap();
        let mut second = store.find_order(order.id()).await.unwrap().unwrap();
        first.pay().unwrap();
        second.pay().unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.save_order(&first).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.save_order(&second).await.unwrap();
        let err = uow.commit().await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConcurrencyConflict { expected_version: Some(1), .. }
        ));

        let stored = store.find_order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Paid);
        assert_eq!(stored.version(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_a_conflict() {
        let store = InMemoryStore::new();
        let order = Order::new("a@b.com", Decimal::ONE);

        for expect_ok in [true, false] {
            let mut uow = store.begin().await.unwrap();
            uow.save_order(&order).await.unwrap();
            assert_eq!(uow.commit().await.is_ok(), expect_ok);
        }
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_sequence_rejects_whole_commit() {
        let store = InMemoryStore::new();
        let x = OrderId::new();
        append_all(&store, &[placed(x, 1, Utc::now())]).await;

        let mut order = Order::new("b@c.com", Decimal::ONE);
        order.place().unwrap();
        let mut uow = store.begin().await.unwrap();
        uow.save_order(&order).await.unwrap();
        uow.append(&placed(x, 1, Utc::now())).await.unwrap();

        assert!(matches!(
            uow.commit().await,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_outage_fails_every_call() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);

        assert!(matches!(store.begin().await, Err(StoreError::Unavailable(_))));
        assert!(store.find_unpublished_batch(1).await.is_err());
        assert!(store.mark_published(Uuid::new_v4()).await.is_err());
        assert!(store.delete_older_than(Utc::now()).await.is_err());

        store.set_unavailable(false);
        assert!(store.begin().await.is_ok());
    }
}
