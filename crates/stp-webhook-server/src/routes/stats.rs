use actix_web::{web, HttpRequest, HttpResponse};
use stp::constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

use crate::error::ApiError;
use crate::metrics::BACKEND_ERRORS;
use crate::state::AppState;

/// Raw pagination parameters; anything unparseable falls back to the defaults.
#[derive(Debug, Default)]
pub struct PaginationQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl PaginationQuery {
    /// Never fails: the first occurrence of a repeated key wins and an
    /// undecodable query string yields the defaults.
    pub fn from_query_string(query: &str) -> Self {
        let pairs = web::Query::<Vec<(String, String)>>::from_query(query)
            .map(web::Query::into_inner)
            .unwrap_or_default();
        let first = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        Self {
            limit: first("limit"),
            offset: first("offset"),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map(|n| n.min(i64::from(MAX_PAGE_LIMIT)) as u32)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        self.offset
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|n| *n >= 0)
            .map(|n| n.min(i64::from(u32::MAX)) as u32)
            .unwrap_or(0)
    }
}

/// GET /api/stats - aggregate totals
pub async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let snapshot = state.store.stats().await.map_err(|e| {
        BACKEND_ERRORS.with_label_values(&["stats"]).inc();
        ApiError::backend("Error obteniendo estadísticas", e)
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": {
            "totalTransacciones": snapshot.total_transactions,
            "montoTotal": snapshot.total_amount,
            "transaccionesRecientes": [],
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }
    })))
}

/// GET /api/transacciones?limit=&offset= - most recent payments, paginated
pub async fn list_transactions(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let query = PaginationQuery::from_query_string(req.query_string());
    let limit = query.limit();
    let offset = query.offset();

    let rows = state
        .store
        .recent_payments(limit, offset)
        .await
        .map_err(|e| {
            BACKEND_ERRORS.with_label_values(&["recent"]).inc();
            ApiError::backend("Error obteniendo transacciones", e)
        })?;

    let count = rows.len();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": rows,
        "pagination": {
            "limit": limit,
            "offset": offset,
            "count": count,
        }
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/stats", web::get().to(stats))
        .route("/api/transacciones", web::get().to(list_transactions));
}
