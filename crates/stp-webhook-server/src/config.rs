use std::env;
use std::time::Duration;
use stp::constants::{DEFAULT_PARTNER_API_URL, PARTNER_TIMEOUT};
use stp::DuplicateCheckPolicy;
use url::Url;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SQLITE_PATH: &str = "./stp-payments.db";
const DEFAULT_RATE_LIMIT_RPM: u32 = 600;
/// Largest accepted request body.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Where payments are persisted.
#[derive(Clone)]
pub enum StoreConfig {
    Supabase { url: String, service_key: String },
    Sqlite { path: String },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Supabase { url, .. } => f
                .debug_struct("Supabase")
                .field("url", url)
                .field("service_key", &"[REDACTED]")
                .finish(),
            StoreConfig::Sqlite { path } => f.debug_struct("Sqlite").field("path", path).finish(),
        }
    }
}

#[derive(Clone)]
pub struct ServerConfig {
    pub store: StoreConfig,
    /// Server port
    pub port: u16,
    /// Relay recorded payments to the partner API (off = bypass)
    pub partner_forward_enabled: bool,
    pub partner_api_url: Url,
    /// Per-request bound on the partner POST
    pub partner_timeout: Duration,
    /// Behaviour when the existence check fails
    pub duplicate_check_policy: DuplicateCheckPolicy,
    /// CORS allowed origins ("*" allows any)
    pub allowed_origins: Vec<String>,
    /// Rate limit requests per minute per client IP
    pub rate_limit_rpm: u32,
    /// Bearer token required for /metrics (None = public)
    pub metrics_token: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("store", &self.store)
            .field("port", &self.port)
            .field("partner_forward_enabled", &self.partner_forward_enabled)
            .field("partner_api_url", &self.partner_api_url.as_str())
            .field("partner_timeout", &self.partner_timeout)
            .field("duplicate_check_policy", &self.duplicate_check_policy)
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = get("STORE_BACKEND").unwrap_or_else(|| "supabase".to_string());
        let store = match backend.to_ascii_lowercase().as_str() {
            "supabase" => {
                let url = get("SUPABASE_URL").ok_or(ConfigError::MissingRequired("SUPABASE_URL"))?;
                Url::parse(&url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
                let service_key = get("SUPABASE_SERVICE_KEY")
                    .ok_or(ConfigError::MissingRequired("SUPABASE_SERVICE_KEY"))?;
                StoreConfig::Supabase { url, service_key }
            }
            "sqlite" => StoreConfig::Sqlite {
                path: get("SQLITE_PATH").unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
            },
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let port = match get("PORT") {
            Some(p) => p.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: p,
            })?,
            None => DEFAULT_PORT,
        };

        let partner_forward_enabled = get("PARTNER_FORWARD_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let partner_url =
            get("PARTNER_API_URL").unwrap_or_else(|| DEFAULT_PARTNER_API_URL.to_string());
        let partner_api_url =
            Url::parse(&partner_url).map_err(|_| ConfigError::InvalidUrl(partner_url.clone()))?;

        let partner_timeout = match get("PARTNER_TIMEOUT_SECS") {
            Some(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "PARTNER_TIMEOUT_SECS",
                        value: v,
                    })
                }
            },
            None => PARTNER_TIMEOUT,
        };

        let duplicate_check_policy = match get("DUPLICATE_CHECK_ON_ERROR") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DUPLICATE_CHECK_ON_ERROR",
                value: v,
            })?,
            None => DuplicateCheckPolicy::default(),
        };

        let allowed_origins: Vec<String> = get("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["*".to_string()]);

        let rate_limit_rpm = get("RATE_LIMIT_RPM")
            .and_then(|s| s.parse().ok())
            .filter(|rpm| *rpm > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPM);

        let metrics_token = get("METRICS_TOKEN");

        if partner_forward_enabled && partner_api_url.scheme() != "https" {
            tracing::warn!(
                url = %partner_api_url,
                "partner API URL does not use HTTPS, payments will be sent in cleartext"
            );
        }
        if metrics_token.is_none() {
            tracing::warn!("METRICS_TOKEN not set, /metrics endpoint is publicly accessible");
        }

        Ok(Self {
            store,
            port,
            partner_forward_enabled,
            partner_api_url,
            partner_timeout,
            duplicate_check_policy,
            allowed_origins,
            rate_limit_rpm,
            metrics_token,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
