use std::sync::Arc;

use stp::{
    BypassForwarder, HttpForwarder, PartnerForwarder, PaymentStore, StoreError, SupabaseStore,
    WebhookProcessor,
};

use crate::config::{ServerConfig, StoreConfig};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to open payment store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<WebhookProcessor>,
    pub store: Arc<dyn PaymentStore>,
    /// Bearer token for /metrics
    pub metrics_token: Option<String>,
}

impl AppState {
    /// Wire a state from already-built dependencies.
    pub fn new(
        store: Arc<dyn PaymentStore>,
        forwarder: Arc<dyn PartnerForwarder>,
        config: &ServerConfig,
    ) -> Self {
        let processor = WebhookProcessor::new(
            store.clone(),
            forwarder,
            config.duplicate_check_policy,
        );

        Self {
            processor: Arc::new(processor),
            store,
            metrics_token: config.metrics_token.clone(),
        }
    }

    /// Construct the backend client and partner forwarder described by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, StateError> {
        let store: Arc<dyn PaymentStore> = match &config.store {
            StoreConfig::Supabase { url, service_key } => {
                // No request timeout on backend calls; only the partner forward is bounded
                let client = reqwest::Client::builder().build()?;
                Arc::new(SupabaseStore::new(client, url, service_key.clone())?)
            }
            StoreConfig::Sqlite { path } => Arc::new(stp::SqliteStore::open(path)?),
        };

        let forwarder: Arc<dyn PartnerForwarder> = if config.partner_forward_enabled {
            let client = reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()?;
            let forwarder = HttpForwarder::new(client, config.partner_api_url.clone())
                .with_timeout(config.partner_timeout);
            tracing::info!(
                endpoint = %forwarder.endpoint(),
                timeout = ?config.partner_timeout,
                "partner forwarding enabled"
            );
            Arc::new(forwarder)
        } else {
            Arc::new(BypassForwarder)
        };

        Ok(Self::new(store, forwarder, config))
    }
}
