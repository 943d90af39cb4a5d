use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stp_server::{
    config::{ServerConfig, StoreConfig, BODY_LIMIT_BYTES},
    error::json_errors,
    metrics::register_metrics,
    routes,
    state::AppState,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let port = config.port;
    let allowed_origins = config.allowed_origins.clone();
    let rate_limit_rpm = config.rate_limit_rpm;

    tracing::info!("Starting stp-webhook-server on port {}", port);
    match &config.store {
        StoreConfig::Supabase { url, .. } => tracing::info!("Store backend: Supabase ({})", url),
        StoreConfig::Sqlite { path } => tracing::info!("Store backend: SQLite ({})", path),
    }
    tracing::info!(
        "Duplicate check failure policy: {:?}",
        config.duplicate_check_policy
    );

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };
    if !state.processor.forwarding_enabled() {
        tracing::info!("Partner forwarding: disabled (bypass)");
    }
    let state_data = web::Data::new(state);

    register_metrics();

    let governor_conf = match GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm as u64)
        .finish()
    {
        Some(conf) => conf,
        None => {
            tracing::error!("Invalid rate limit: {} requests per minute", rate_limit_rpm);
            std::process::exit(1);
        }
    };

    tracing::info!("Webhook endpoint: http://localhost:{}/webhook/pagos-stp", port);
    tracing::info!("Health check: http://localhost:{}/health", port);
    tracing::info!("Stats: http://localhost:{}/api/stats", port);

    HttpServer::new(move || {
        let cors = stp_server::cors::build_cors(&allowed_origins);

        App::new()
            .app_data(state_data.clone())
            .app_data(web::PayloadConfig::new(BODY_LIMIT_BYTES))
            .wrap(json_errors())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(routes::configure_unlimited)
            .service(
                web::scope("")
                    .wrap(Governor::new(&governor_conf))
                    .configure(routes::configure_limited),
            )
            .default_service(web::to(routes::index::not_found))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
