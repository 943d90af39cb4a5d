use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::{HttpResponse, ResponseError};
use stp::StoreError;

/// Errors surfaced at the route boundary.
///
/// Only the fixed caller-facing message is rendered; detail goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A backend call failed; `message` is what the caller sees.
    #[error("{message}: {source}")]
    Backend {
        message: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn backend(message: &'static str, source: StoreError) -> Self {
        ApiError::Backend { message, source }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Backend { message, source } => {
                tracing::error!(error = %source, "{}", message);
                *message
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Error interno del servidor"
            }
        };
        HttpResponse::InternalServerError().json(serde_json::json!({
            "success": false,
            "error": message
        }))
    }
}

/// Caller-facing text for error statuses produced outside the handlers.
fn status_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => "Payload demasiado grande",
        StatusCode::METHOD_NOT_ALLOWED => "Método no permitido",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "Tipo de contenido no soportado",
        s if s.is_client_error() => "Solicitud inválida",
        _ => "Error interno del servidor",
    }
}

/// Replace any non-JSON error body (extractor and framework errors) with the
/// generic `{success:false, error}` shape. JSON error bodies pass through.
fn render_json_error<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let is_json = res
        .response()
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);
    if is_json {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }

    let status = res.status();
    if status.is_server_error() {
        tracing::error!(status = %status, path = %res.request().path(), "unhandled error");
    } else {
        tracing::warn!(status = %status, path = %res.request().path(), "request rejected");
    }

    let (req, _) = res.into_parts();
    let response = HttpResponse::build(status).json(serde_json::json!({
        "success": false,
        "error": status_message(status),
    }));
    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, response).map_into_right_body(),
    ))
}

/// Outermost error boundary: every 4xx/5xx leaves the app as JSON.
pub fn json_errors<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new().default_handler(render_json_error)
}
