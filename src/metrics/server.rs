use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

use crate::workers::health::HealthCheckable;

/// Start the metrics HTTP server.
/// Runs on its own actix system thread; it only touches the registry and the
/// liveness handle, never the store.
pub async fn start_metrics_server(
    registry: Arc<Registry>,
    liveness: Arc<dyn HealthCheckable>,
    port: u16,
) -> std::io::Result<()> {
    tracing::info!("📊 Starting metrics server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(liveness.clone()))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

async fn metrics_handler(registry: web::Data<Arc<Registry>>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(liveness: web::Data<Arc<dyn HealthCheckable>>) -> impl Responder {
    let health = liveness.check_health();
    let body = serde_json::json!({
        "status": health.status.status_label(),
        "component": health.name,
        "details": health.details,
        "checkedAt": health.last_check.to_rfc3339(),
    });

    if health.status.is_serving() {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
