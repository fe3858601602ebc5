// ============================================================================
// Background Workers
// ============================================================================
//
// - publisher: relays unpublished outbox rows to the broker on a fixed tick
// - cleanup:   deletes published rows past retention on its own schedule
//
// Each worker runs as one tokio task and is stopped through its
// `WorkerHandle`. Stopping never interrupts a cycle that is already running.
//
// ============================================================================

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod cleanup;
pub mod health;
pub mod publisher;
pub mod schedule;

pub use cleanup::{CleanupConfig, OutboxCleanup};
pub use health::{ComponentHealth, HealthCheckable, HealthStatus, PublisherLiveness};
pub use publisher::{CycleReport, OutboxPublisher, PublisherConfig};
pub use schedule::Schedule;

pub struct WorkerHandle {
    name: &'static str,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub(crate) fn new(name: &'static str, token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { name, token, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the worker and wait for it to wind down.
    pub async fn shutdown(self) {
        tracing::info!(worker = self.name, "🛑 Stopping worker");
        self.token.cancel();

        if let Err(e) = self.task.await {
            tracing::error!(worker = self.name, error = %e, "Worker task ended abnormally");
        }
    }
}
