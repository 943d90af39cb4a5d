use actix_web::{web, HttpResponse};

/// Routes listed in the 404 directory.
pub const AVAILABLE_ROUTES: [&str; 6] = [
    "GET /",
    "GET /health",
    "POST /webhook/pagos-stp",
    "GET /api/stats",
    "GET /api/transacciones",
    "GET /metrics",
];

/// GET / - liveness banner
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Backend Webhook STP activo",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "endpoints": {
            "webhook": "/webhook/pagos-stp",
            "health": "/health",
            "stats": "/api/stats",
            "transacciones": "/api/transacciones",
        }
    }))
}

/// Default service for unmatched routes
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({
        "success": false,
        "error": "Ruta no encontrada",
        "availableRoutes": AVAILABLE_ROUTES,
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index));
}
