use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// Health Check Abstractions
// ============================================================================
//
// Core types for health reporting that any background worker can implement.
// The /health endpoint only ever asks `HealthCheckable::check_health`.
//
// ============================================================================

/// Health status of a component
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    /// A degraded component still serves traffic.
    pub fn is_serving(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy(_))
    }

    /// Health endpoint wording: `UP` or `OUT_OF_SERVICE`.
    pub fn status_label(&self) -> &'static str {
        if self.is_serving() {
            "UP"
        } else {
            "OUT_OF_SERVICE"
        }
    }
}

/// Health information for a component
#[derive(Debug, Clone)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub details: Option<String>,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            last_check: Utc::now(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Anything the /health endpoint can ask about its health
pub trait HealthCheckable: Send + Sync {
    fn check_health(&self) -> ComponentHealth;

    fn component_name(&self) -> &str;
}

// ============================================================================
// Publisher Liveness
// ============================================================================

/// Shared flags. `alive` turns `true` when the publisher starts its first
/// cycle and back to `false` once it has shut down. `backing_off` is set
/// while the loop waits out consecutive failed cycles.
#[derive(Debug, Clone, Default)]
pub struct PublisherLiveness {
    alive: Arc<AtomicBool>,
    backing_off: Arc<AtomicBool>,
}

impl PublisherLiveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn is_backing_off(&self) -> bool {
        self.backing_off.load(Ordering::SeqCst)
    }

    pub(crate) fn set(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub(crate) fn set_backing_off(&self, backing_off: bool) {
        self.backing_off.store(backing_off, Ordering::SeqCst);
    }
}

impl HealthCheckable for PublisherLiveness {
    fn check_health(&self) -> ComponentHealth {
        if self.is_alive() && self.is_backing_off() {
            ComponentHealth::new(
                self.component_name(),
                HealthStatus::Degraded("backing off after failed cycles".to_string()),
            )
            .with_details("recent publish cycles failed, rows stay queued until they succeed")
        } else if self.is_alive() {
            ComponentHealth::new(self.component_name(), HealthStatus::Healthy)
        } else {
            ComponentHealth::new(
                self.component_name(),
                HealthStatus::Unhealthy("publisher not running".to_string()),
            )
            .with_details("no publish cycle has started, or the publisher has stopped")
        }
    }

    fn component_name(&self) -> &str {
        "outbox-publisher"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_starts_down() {
        let liveness = PublisherLiveness::new();
        let health = liveness.check_health();

        assert!(!liveness.is_alive());
        assert_eq!(health.status.status_label(), "OUT_OF_SERVICE");
        assert!(health.details.is_some());
    }

    #[test]
    fn test_liveness_is_shared_between_clones() {
        let liveness = PublisherLiveness::new();
        let shared = liveness.clone();

        liveness.set(true);
        assert_eq!(shared.check_health().status, HealthStatus::Healthy);
        assert_eq!(shared.check_health().name, "outbox-publisher");

        liveness.set(false);
        assert_eq!(shared.check_health().status.status_label(), "OUT_OF_SERVICE");
    }

    #[test]
    fn test_degraded_still_reports_up() {
        let degraded = HealthStatus::Degraded("slow".into());
        assert!(degraded.is_serving());
        assert_eq!(degraded.status_label(), "UP");
        assert!(!HealthStatus::Unhealthy("down".into()).is_serving());
    }

    #[test]
    fn test_backing_off_publisher_is_degraded() {
        let liveness = PublisherLiveness::new();
        liveness.set(true);
        liveness.set_backing_off(true);

        let health = liveness.check_health();
        assert!(matches!(health.status, HealthStatus::Degraded(_)));
        assert_eq!(health.status.status_label(), "UP");

        liveness.set_backing_off(false);
        assert_eq!(liveness.check_health().status, HealthStatus::Healthy);
    }

    #[test]
    fn test_stopped_publisher_is_down_even_when_backing_off() {
        let liveness = PublisherLiveness::new();
        liveness.set_backing_off(true);

        assert_eq!(liveness.check_health().status.status_label(), "OUT_OF_SERVICE");
    }
}
