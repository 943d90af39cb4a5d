//! CORS configuration for the webhook server.

use actix_cors::Cors;
use actix_web::http::header;

/// Build the CORS middleware from the configured origins.
///
/// `*` admits any origin. STP itself does not send an `Origin` header, so
/// this only affects browser dashboards reading `/api/*`.
pub fn build_cors(allowed_origins: &[String]) -> Cors {
    if allowed_origins.iter().any(|o| o == "*") {
        return Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);
    }

    let allowed = allowed_origins.to_vec();
    Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            let origin_str = origin.to_str().unwrap_or("");
            allowed.iter().any(|a| a == origin_str)
        })
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600)
}
