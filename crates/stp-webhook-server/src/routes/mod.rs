use actix_web::web;

pub mod health;
pub mod index;
pub mod stats;
pub mod webhook;

/// Routes served outside the rate limiter. STP retries on anything but a
/// 2xx, so notifications are never throttled.
pub fn configure_unlimited(cfg: &mut web::ServiceConfig) {
    webhook::configure(cfg);
}

/// Routes served behind the per-IP rate limiter.
pub fn configure_limited(cfg: &mut web::ServiceConfig) {
    index::configure(cfg);
    health::configure(cfg);
    stats::configure(cfg);
}
