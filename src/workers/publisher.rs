use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::health::PublisherLiveness;
use super::WorkerHandle;
use crate::messaging::{DeliveryError, MessageBroker, OutboundMessage};
use crate::metrics::Metrics;
use crate::outbox::core::{OutboxRecord, StoreError};
use crate::outbox::store::OutboxStore;
use crate::utils::backoff::{Backoff, BackoffConfig};

// ============================================================================
// Outbox Publisher
// ============================================================================
//
// Idle → Polling → Sending → Marking → Idle
//
// One cycle: fetch a bounded batch in (aggregate_id, sequence) order, send
// each record keyed by its aggregate id and wait for the ack, then mark it
// published. A failed send leaves the row unpublished for the next cycle and
// blocks the rest of that aggregate's records for this cycle, so a later
// sequence never overtakes an earlier one. Other aggregates carry on.
//
// Delivery is at-least-once: a crash between ack and mark resends the row.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub topic: String,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub send_timeout: Duration,
    pub max_backoff: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            topic: "orders.events".to_string(),
            poll_interval: Duration::from_millis(1000),
            batch_size: 200,
            send_timeout: Duration::from_millis(5000),
            max_backoff: Duration::from_millis(30_000),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub published: usize,
    pub failed: usize,
    /// Acked by the broker but the published flag could not be set.
    pub mark_failures: usize,
    /// Not attempted because an earlier record of the same aggregate failed.
    pub skipped: usize,
}

impl CycleReport {
    /// Every attempted send failed.
    pub fn all_failed(&self) -> bool {
        self.failed > 0 && self.published == 0 && self.mark_failures == 0
    }
}

pub struct OutboxPublisher {
    store: Arc<dyn OutboxStore>,
    broker: Arc<dyn MessageBroker>,
    metrics: Arc<Metrics>,
    config: PublisherConfig,
    liveness: PublisherLiveness,
}

impl OutboxPublisher {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        broker: Arc<dyn MessageBroker>,
        metrics: Arc<Metrics>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            store,
            broker,
            metrics,
            config,
            liveness: PublisherLiveness::new(),
        }
    }

    pub fn liveness(&self) -> PublisherLiveness {
        self.liveness.clone()
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, StoreError> {
        let started = Instant::now();
        let batch = self.store.find_unpublished_batch(self.config.batch_size).await?;

        let mut report = CycleReport {
            fetched: batch.len(),
            ..CycleReport::default()
        };
        if batch.is_empty() {
            self.metrics.record_cycle(0, started.elapsed().as_secs_f64());
            return Ok(report);
        }

        tracing::info!(batch_size = batch.len(), "📤 Fetched unpublished outbox batch");

        let mut blocked: HashSet<String> = HashSet::new();

        for record in &batch {
            if blocked.contains(&record.aggregate_id) {
                report.skipped += 1;
                continue;
            }

            if let Err(e) = self.send(record).await {
                tracing::warn!(
                    outbox_id = %record.id,
                    aggregate_id = %record.aggregate_id,
                    sequence = record.sequence,
                    error = %e,
                    "Delivery failed, will retry next cycle"
                );
                self.metrics.record_delivery_failure(&record.event_type, e.reason());
                report.failed += 1;
                blocked.insert(record.aggregate_id.clone());
                continue;
            }

            match self.store.mark_published(record.id).await {
                Ok(rows) => {
                    tracing::debug!(
                        outbox_id = %record.id,
                        aggregate_id = %record.aggregate_id,
                        sequence = record.sequence,
                        rows,
                        "Outbox record published"
                    );
                    self.metrics.record_published(&record.event_type);
                    report.published += 1;
                }
                Err(e) => {
                    // The broker has it; the row is resent next cycle.
                    tracing::error!(
                        outbox_id = %record.id,
                        aggregate_id = %record.aggregate_id,
                        error = %e,
                        "Failed to mark outbox record published"
                    );
                    self.metrics.record_mark_failure();
                    report.mark_failures += 1;
                    blocked.insert(record.aggregate_id.clone());
                }
            }
        }

        self.metrics
            .record_cycle(report.fetched, started.elapsed().as_secs_f64());

        if report.skipped > 0 {
            tracing::debug!(
                skipped = report.skipped,
                "Held back records behind failed deliveries"
            );
        }

        Ok(report)
    }

    async fn send(&self, record: &OutboxRecord) -> Result<(), DeliveryError> {
        let message = OutboundMessage {
            topic: self.config.topic.clone(),
            key: record.aggregate_id.clone(),
            payload: record.payload.clone(),
            event_type: record.event_type.clone(),
            sequence: record.sequence,
        };

        match timeout(self.config.send_timeout, self.broker.send(&message)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.config.send_timeout)),
        }
    }

    /// Spawn the polling loop. Ticks that fall due while a cycle is running
    /// are skipped, so cycles never overlap.
    pub fn start(self) -> WorkerHandle {
        let token = CancellationToken::new();
        let child = token.clone();
        let task = tokio::spawn(async move { self.run(child).await });

        WorkerHandle::new("outbox-publisher", token, task)
    }

    async fn run(self, token: CancellationToken) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut backoff = Backoff::new(BackoffConfig {
            base: self.config.poll_interval,
            max_delay: self.config.max_backoff,
            multiplier: 2.0,
        });

        tracing::info!(
            topic = %self.config.topic,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "🚀 Outbox publisher started"
        );

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.liveness.set(true);

            let cycle_failed = match self.run_cycle().await {
                Ok(report) => report.all_failed(),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not fetch outbox batch");
                    true
                }
            };

            if !cycle_failed {
                backoff.record_success();
                self.liveness.set_backing_off(false);
                continue;
            }

            let delay = backoff.record_failure();
            if delay.is_zero() {
                continue;
            }

            tracing::warn!(
                consecutive_failures = backoff.failures(),
                delay_ms = delay.as_millis() as u64,
                "Backing off after failed cycles"
            );
            self.liveness.set_backing_off(true);
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        self.liveness.set(false);
        self.liveness.set_backing_off(false);

        if let Err(e) = self.broker.close().await {
            tracing::error!(error = %e, "Failed to close broker connection");
        }
        tracing::info!("Outbox publisher stopped");
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
