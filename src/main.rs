use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod domain;
mod messaging;
mod metrics;
mod outbox;
mod utils;
mod workers;

use config::AppConfig;
use domain::order::{LoggingEventListener, OrderCommandHandler, PlaceOrderCommand};
use messaging::{MessageBroker, RedpandaClient};
use metrics::Metrics;
use outbox::{InMemoryStore, OrderStore, OutboxStore, PgOutboxStore};
use workers::{HealthCheckable, OutboxCleanup, OutboxPublisher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the environment.
    let _ = dotenvy::dotenv();

    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_outbox=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order outbox service");

    let config = AppConfig::from_env()?;
    tracing::info!(
        brokers = %config.brokers,
        topic = %config.topic,
        durable = config.database_url.is_some(),
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        batch_size = config.batch_size,
        cleanup_schedule = %config.cleanup_schedule,
        "Configuration loaded"
    );

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    // === 2. Pick the durable store ===
    match config.database_url.clone() {
        Some(url) => {
            let store = PgOutboxStore::connect(&url, config.database_max_connections).await?;
            store.ensure_schema().await?;
            run(store, config, metrics).await
        }
        None => {
            tracing::warn!("⚠️ DATABASE_URL not set, using the in-memory store (not durable)");
            run(InMemoryStore::new(), config, metrics).await
        }
    }
}

async fn run<S>(store: S, config: AppConfig, metrics: Arc<Metrics>) -> anyhow::Result<()>
where
    S: OrderStore + OutboxStore + 'static,
{
    let store = Arc::new(store);

    // === 3. Broker and publisher ===
    let broker: Arc<dyn MessageBroker> = Arc::new(RedpandaClient::new(&config.redpanda())?);
    let publisher = OutboxPublisher::new(
        store.clone(),
        broker,
        metrics.clone(),
        config.publisher(),
    );

    // === 4. Metrics + liveness HTTP server on its own thread ===
    let registry = Arc::new(metrics.registry().clone());
    let liveness: Arc<dyn HealthCheckable> = Arc::new(publisher.liveness());
    let port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(registry, liveness, port)) {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 5. Background workers ===
    let publisher_handle = if config.outbox_enabled {
        Some(publisher.start())
    } else {
        tracing::warn!("Outbox publisher disabled (OUTBOX_ENABLED=false)");
        None
    };
    let cleanup_handle = OutboxCleanup::new(store.clone(), metrics.clone(), config.cleanup()).start();

    // === 6. Optional order lifecycle demo ===
    if config.demo_lifecycle {
        let handler = OrderCommandHandler::new(store.clone())
            .with_listener(Arc::new(LoggingEventListener));
        if let Err(e) = demo_lifecycle(&handler).await {
            tracing::error!(error = %e, "Demo lifecycle failed");
        }
    }

    tracing::info!("✅ Running. Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    // Publisher first so its final cycle can still mark rows.
    if let Some(handle) = publisher_handle {
        handle.shutdown().await;
    }
    cleanup_handle.shutdown().await;

    tracing::info!("👋 Shutdown complete");
    Ok(())
}

async fn demo_lifecycle(handler: &OrderCommandHandler) -> anyhow::Result<()> {
    tracing::info!("📝 Demonstrating order lifecycle with outbox pattern");

    let cmd = PlaceOrderCommand::new("demo@example.com", Decimal::new(4999, 2))?;
    let order_id = handler.place_order(cmd).await?;
    tracing::info!("✅ Order placed: {}", order_id);

    handler.pay_order(order_id).await?;
    tracing::info!("✅ Order paid: {}", order_id);

    Ok(())
}
