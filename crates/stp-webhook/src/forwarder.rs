//! Relaying recorded payments to the partner API.
//!
//! [`HttpForwarder`] performs the real POST; [`BypassForwarder`] is selected
//! when forwarding is switched off and reports success without any I/O.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::constants::{FORWARDER_USER_AGENT, PARTNER_TIMEOUT};
use crate::error::ForwardError;
use crate::notification::PaymentNotification;

#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    /// The partner accepted the payment.
    Delivered {
        status: u16,
        body: serde_json::Value,
    },
    /// Forwarding is disabled by configuration.
    Bypassed,
}

#[async_trait]
pub trait PartnerForwarder: Send + Sync {
    /// Relay one payment. Exactly one attempt.
    async fn forward(
        &self,
        notification: &PaymentNotification,
    ) -> Result<ForwardOutcome, ForwardError>;

    /// Whether calls reach the partner at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// POSTs the notification, as received from STP, to a fixed partner endpoint.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            timeout: PARTNER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl PartnerForwarder for HttpForwarder {
    async fn forward(
        &self,
        notification: &PaymentNotification,
    ) -> Result<ForwardOutcome, ForwardError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::USER_AGENT, FORWARDER_USER_AGENT)
            .timeout(self.timeout)
            .json(notification.as_received().as_ref())
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(ForwardError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        // Partners do not always answer with JSON
        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
        };

        Ok(ForwardOutcome::Delivered {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BypassForwarder;

#[async_trait]
impl PartnerForwarder for BypassForwarder {
    async fn forward(
        &self,
        notification: &PaymentNotification,
    ) -> Result<ForwardOutcome, ForwardError> {
        tracing::debug!(
            tracking_key = %notification.tracking_key,
            "partner forwarding disabled, skipping"
        );
        Ok(ForwardOutcome::Bypassed)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
