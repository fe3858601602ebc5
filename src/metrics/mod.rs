// Private module declaration
mod server;

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the outbox pipeline
// ============================================================================
//
// - Publisher: published events, delivery failures by reason, mark failures,
//   cycle duration, size of the last fetched batch
// - Cleanup: rows deleted, failed runs
//
// All metrics are registered with one Prometheus registry scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Publisher Metrics
    pub events_published: IntCounterVec,
    pub delivery_failures: IntCounterVec,
    pub mark_failures: IntCounter,
    pub cycle_duration: Histogram,
    pub last_batch_size: IntGauge,

    // Cleanup Metrics
    pub cleanup_deleted: IntCounter,
    pub cleanup_failures: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Publisher Metrics
        let events_published = IntCounterVec::new(
            Opts::new("outbox_events_published_total", "Outbox events acknowledged by the broker"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let delivery_failures = IntCounterVec::new(
            Opts::new("outbox_delivery_failures_total", "Failed broker sends"),
            &["event_type", "reason"],
        )?;
        registry.register(Box::new(delivery_failures.clone()))?;

        let mark_failures = IntCounter::new(
            "outbox_mark_failures_total",
            "Acknowledged events whose published flag could not be set",
        )?;
        registry.register(Box::new(mark_failures.clone()))?;

        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new("outbox_publish_cycle_duration_seconds", "Publisher cycle duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(cycle_duration.clone()))?;

        let last_batch_size = IntGauge::new(
            "outbox_last_batch_size",
            "Rows in the most recently fetched unpublished batch",
        )?;
        registry.register(Box::new(last_batch_size.clone()))?;

        // Cleanup Metrics
        let cleanup_deleted = IntCounter::new(
            "outbox_cleanup_deleted_total",
            "Published outbox rows removed by retention cleanup",
        )?;
        registry.register(Box::new(cleanup_deleted.clone()))?;

        let cleanup_failures = IntCounter::new(
            "outbox_cleanup_failures_total",
            "Cleanup runs that failed",
        )?;
        registry.register(Box::new(cleanup_failures.clone()))?;

        Ok(Self {
            registry,
            events_published,
            delivery_failures,
            mark_failures,
            cycle_duration,
            last_batch_size,
            cleanup_deleted,
            cleanup_failures,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_published(&self, event_type: &str) {
        self.events_published.with_label_values(&[event_type]).inc();
    }

    pub fn record_delivery_failure(&self, event_type: &str, reason: &str) {
        self.delivery_failures.with_label_values(&[event_type, reason]).inc();
    }

    pub fn record_mark_failure(&self) {
        self.mark_failures.inc();
    }

    pub fn record_cycle(&self, batch_size: usize, duration_secs: f64) {
        self.last_batch_size.set(batch_size as i64);
        self.cycle_duration.observe(duration_secs);
    }

    pub fn record_cleanup(&self, deleted: u64) {
        self.cleanup_deleted.inc_by(deleted);
    }

    pub fn record_cleanup_failure(&self) {
        self.cleanup_failures.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        // Vec metrics only show up once a label set has been touched.
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_published_and_failures() {
        let metrics = Metrics::new().unwrap();
        metrics.record_published("OrderPlaced");
        metrics.record_published("OrderPlaced");
        metrics.record_delivery_failure("OrderPlaced", "timeout");

        assert_eq!(metrics.events_published.with_label_values(&["OrderPlaced"]).get(), 2);
        assert_eq!(
            metrics.delivery_failures.with_label_values(&["OrderPlaced", "timeout"]).get(),
            1
        );
        assert_eq!(
            metrics.delivery_failures.with_label_values(&["OrderPlaced", "kafka"]).get(),
            0
        );
    }

    #[test]
    fn test_record_cycle_sets_gauge_and_observes_duration() {
        let metrics = Metrics::new().unwrap();
        metrics.record_cycle(7, 0.02);
        metrics.record_cycle(3, 0.01);

        assert_eq!(metrics.last_batch_size.get(), 3);
        assert_eq!(metrics.cycle_duration.get_sample_count(), 2);
    }

    #[test]
    fn test_cleanup_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_cleanup(4);
        metrics.record_cleanup(0);
        metrics.record_cleanup_failure();
        metrics.record_mark_failure();

        assert_eq!(metrics.cleanup_deleted.get(), 4);
        assert_eq!(metrics.cleanup_failures.get(), 1);
        assert_eq!(metrics.mark_failures.get(), 1);
    }

    #[test]
    fn test_exposition_contains_metric_names() {
        let metrics = Metrics::new().unwrap();
        metrics.record_published("OrderPlaced");

        let names: Vec<String> = metrics
            .registry()
            .gather()
            .iter()
            .map(|family| family.name().to_string())
            .collect();
        assert!(names.contains(&"outbox_events_published_total".to_string()));
        assert!(names.contains(&"outbox_cleanup_deleted_total".to_string()));
    }
}
