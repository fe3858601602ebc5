use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::schedule::Schedule;
use super::WorkerHandle;
use crate::metrics::Metrics;
use crate::outbox::store::OutboxStore;

// ============================================================================
// Outbox Cleanup
// ============================================================================
//
// Deletes published rows whose occurred_at is older than now − retention.
// Unpublished rows are never touched. A failed run is logged and counted;
// the next scheduled run simply tries again.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub retention_days: u32,
    pub schedule: Schedule,
}

pub struct OutboxCleanup {
    store: Arc<dyn OutboxStore>,
    metrics: Arc<Metrics>,
    config: CleanupConfig,
}

impl OutboxCleanup {
    pub fn new(store: Arc<dyn OutboxStore>, metrics: Arc<Metrics>, config: CleanupConfig) -> Self {
        Self {
            store,
            metrics,
            config,
        }
    }

    /// One retention pass. Returns rows deleted, or `None` if the run
    /// failed.
    pub async fn run_once(&self) -> Option<u64> {
        let retention_days = self.config.retention_days;
        let Some(cutoff) = ChronoDuration::try_days(i64::from(retention_days))
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
        else {
            tracing::error!(
                retention_days,
                "Outbox cleanup skipped: retention reaches before the earliest timestamp"
            );
            self.metrics.record_cleanup_failure();
            return None;
        };

        match self.store.delete_older_than(cutoff).await {
            Ok(deleted) => {
                tracing::info!(
                    deleted,
                    cutoff = %cutoff,
                    retention_days,
                    "🧹 Outbox cleanup finished"
                );
                self.metrics.record_cleanup(deleted);
                Some(deleted)
            }
            Err(e) => {
                tracing::error!(error = %e, cutoff = %cutoff, "Outbox cleanup failed");
                self.metrics.record_cleanup_failure();
                None
            }
        }
    }

    pub fn start(self) -> WorkerHandle {
        let token = CancellationToken::new();
        let child = token.clone();
        let task = tokio::spawn(async move { self.run(child).await });

        WorkerHandle::new("outbox-cleanup", token, task)
    }

    async fn run(self, token: CancellationToken) {
        tracing::info!(
            schedule = %self.config.schedule,
            retention_days = self.config.retention_days,
            "🚀 Outbox cleanup scheduled"
        );

        loop {
            let delay = self.config.schedule.next_delay(Utc::now());
            tracing::debug!(delay_secs = delay.as_secs(), "Next outbox cleanup");

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep(delay) => {}
            }

            self.run_once().await;
        }

        tracing::info!("Outbox cleanup stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderEvent, OrderId, OrderPlaced};
    use crate::outbox::store::{InMemoryStore, OrderStore};
    use chrono::DateTime;
    use rust_decimal::Decimal;
    use std::time::Duration;

    fn event(aggregate: OrderId, sequence: i64, occurred_at: DateTime<Utc>) -> OrderEvent {
        OrderEvent::Placed(OrderPlaced {
            order_id: aggregate,
            sequence,
            occurred_at,
            customer_email: "a@b.com".to_string(),
            total: Decimal::ONE,
        })
    }

    fn cleanup(store: &InMemoryStore, schedule: Schedule) -> (OutboxCleanup, Arc<Metrics>) {
        cleanup_with_retention(store, 7, schedule)
    }

    fn cleanup_with_retention(
        store: &InMemoryStore,
        retention_days: u32,
        schedule: Schedule,
    ) -> (OutboxCleanup, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new().unwrap());
        let cleanup = OutboxCleanup::new(
            Arc::new(store.clone()),
            metrics.clone(),
            CleanupConfig {
                retention_days,
                schedule,
            },
        );
        (cleanup, metrics)
    }

    async fn seed_published(store: &InMemoryStore, events: &[OrderEvent]) {
        let mut uow = store.begin().await.unwrap();
        for e in events {
            uow.append(e).await.unwrap();
        }
        uow.commit().await.unwrap();
        for record in store.records().await {
            store.mark_published(record.id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_only_rows_past_retention_are_deleted() {
        let store = InMemoryStore::new();
        let x = OrderId::new();
        let now = Utc::now();
        seed_published(
            &store,
            &[
                event(x, 1, now - ChronoDuration::days(14)),
                event(x, 2, now - ChronoDuration::days(1)),
            ],
        )
        .await;
        let (cleanup, metrics) = cleanup(&store, Schedule::Every(Duration::from_secs(3600)));

        assert_eq!(cleanup.run_once().await, Some(1));

        let remaining = store.records().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].sequence, 2);
        assert_eq!(metrics.cleanup_deleted.get(), 1);
    }

    #[tokio::test]
    async fn test_old_unpublished_rows_survive() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        uow.append(&event(OrderId::new(), 1, Utc::now() - ChronoDuration::days(30)))
            .await
            .unwrap();
        uow.commit().await.unwrap();
        let (cleanup, _) = cleanup(&store, Schedule::Every(Duration::from_secs(3600)));

        assert_eq!(cleanup.run_once().await, Some(0));
        assert_eq!(store.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed_and_counted() {
        let store = InMemoryStore::new();
        let (cleanup, metrics) = cleanup(&store, Schedule::Every(Duration::from_secs(3600)));
        store.set_unavailable(true);

        assert_eq!(cleanup.run_once().await, None);
        assert_eq!(metrics.cleanup_failures.get(), 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_cutoff_is_a_counted_failure() {
        let store = InMemoryStore::new();
        let x = OrderId::new();
        seed_published(&store, &[event(x, 1, Utc::now() - ChronoDuration::days(14))]).await;
        let (cleanup, metrics) =
            cleanup_with_retention(&store, u32::MAX, Schedule::Every(Duration::from_secs(3600)));

        assert_eq!(cleanup.run_once().await, None);
        assert_eq!(metrics.cleanup_failures.get(), 1);
        assert_eq!(store.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_scheduled_runs_until_stopped() {
        let store = InMemoryStore::new();
        let (cleanup, metrics) = cleanup(&store, Schedule::Every(Duration::from_millis(10)));
        store.set_unavailable(true);

        let handle = cleanup.start();
        for _ in 0..100 {
            if metrics.cleanup_failures.get() >= 2 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        // Failures did not kill the loop.
        assert!(metrics.cleanup_failures.get() >= 2);
        assert!(!handle.is_finished());

        handle.shutdown().await;
    }
}
