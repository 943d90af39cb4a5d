//! HTTP surface for STP payment webhooks.
//!
//! Routes live in [`routes`]; each handler receives the shared [`AppState`]
//! built once in `main`.

pub mod config;
pub mod cors;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;
