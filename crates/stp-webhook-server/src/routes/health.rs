use actix_web::{web, HttpRequest, HttpResponse};
use stp::StoreError;

use crate::error::ApiError;
use crate::metrics::{self, BACKEND_ERRORS};
use crate::state::AppState;

/// GET /health - probes the backend with the stats query
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();

    match state.store.stats().await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "timestamp": timestamp,
            "services": {
                "database": "healthy",
                "api": "healthy",
            }
        })),
        Err(StoreError::Internal(e)) => {
            tracing::error!(error = %e, "health check failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "status": "unhealthy",
                "timestamp": timestamp,
                "error": "Error interno del servidor",
            }))
        }
        Err(e) => {
            BACKEND_ERRORS.with_label_values(&["stats"]).inc();
            tracing::warn!(error = %e, "health check: backend stats query failed");
            HttpResponse::Ok().json(serde_json::json!({
                "status": "degraded",
                "timestamp": timestamp,
                "services": {
                    "database": "unhealthy",
                    "api": "healthy",
                },
                "error": "database query failed",
            }))
        }
    }
}

/// GET /metrics - Prometheus metrics endpoint (optionally auth-gated)
pub async fn metrics(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    if let Some(ref expected_token) = state.metrics_token {
        let authorized = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| metrics::constant_time_eq(token.as_bytes(), expected_token.as_bytes()))
            .unwrap_or(false);

        if !authorized {
            return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
                "success": false,
                "error": "Valid Bearer token required for /metrics"
            })));
        }
    }

    let output = metrics::metrics_output()
        .map_err(|e| ApiError::Internal(format!("failed to encode metrics: {e}")))?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(output))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics));
}
