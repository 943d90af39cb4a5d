//! Per-request ingestion flow:
//! validate → duplicate check → insert → forward.
//!
//! Each step runs at most once. A failure carries the [`Actions`] that had
//! already completed so the caller can report them.

use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ProcessError;
use crate::forwarder::{ForwardOutcome, PartnerForwarder};
use crate::notification::PaymentNotification;
use crate::store::{InsertOutcome, PaymentStore};
use crate::validation::validate_payload;

/// What to do when the existence check itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateCheckPolicy {
    /// Fail the request without writing. STP redelivers unacknowledged notifications.
    #[default]
    Reject,
    /// Continue to the insert and rely on the backend's uniqueness constraint.
    Proceed,
}

impl FromStr for DuplicateCheckPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "fail-closed" => Ok(Self::Reject),
            "proceed" | "fail-open" => Ok(Self::Proceed),
            other => Err(format!("expected 'reject' or 'proceed', got '{other}'")),
        }
    }
}

/// Side effects completed while handling one notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Actions {
    pub database_insert: bool,
    pub api_forward: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// The tracking key was already recorded; nothing was written.
    Duplicate(PaymentNotification),
    Processed {
        notification: PaymentNotification,
        forward: ForwardOutcome,
    },
}

impl ProcessOutcome {
    pub fn notification(&self) -> &PaymentNotification {
        match self {
            ProcessOutcome::Duplicate(n) => n,
            ProcessOutcome::Processed { notification, .. } => notification,
        }
    }

    pub fn actions(&self) -> Actions {
        match self {
            ProcessOutcome::Duplicate(_) => Actions::default(),
            ProcessOutcome::Processed { .. } => Actions {
                database_insert: true,
                api_forward: true,
            },
        }
    }
}

#[derive(Debug)]
pub struct ProcessFailure {
    pub error: ProcessError,
    pub actions: Actions,
}

impl ProcessFailure {
    fn new(error: ProcessError, actions: Actions) -> Self {
        Self { error, actions }
    }
}

pub struct WebhookProcessor {
    store: Arc<dyn PaymentStore>,
    forwarder: Arc<dyn PartnerForwarder>,
    on_check_failure: DuplicateCheckPolicy,
}

impl WebhookProcessor {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        forwarder: Arc<dyn PartnerForwarder>,
        on_check_failure: DuplicateCheckPolicy,
    ) -> Self {
        Self {
            store,
            forwarder,
            on_check_failure,
        }
    }

    pub fn forwarding_enabled(&self) -> bool {
        self.forwarder.is_enabled()
    }

    pub async fn process(
        &self,
        payload: serde_json::Value,
    ) -> Result<ProcessOutcome, ProcessFailure> {
        let mut actions = Actions::default();

        let report = validate_payload(&payload);
        if !report.is_valid() {
            tracing::warn!(missing = ?report.missing, "notification rejected: missing fields");
            return Err(ProcessFailure::new(
                ProcessError::MissingFields(report.missing),
                actions,
            ));
        }

        let notification = PaymentNotification::from_json(payload).map_err(|e| {
            tracing::warn!(error = %e, "notification rejected: malformed fields");
            ProcessFailure::new(ProcessError::Malformed(e.to_string()), actions)
        })?;
        let tracking_key = notification.tracking_key();

        match self.store.payment_exists(&tracking_key).await {
            Ok(true) => {
                tracing::info!(tracking_key = %tracking_key, "payment already recorded, skipping insert");
                return Ok(ProcessOutcome::Duplicate(notification));
            }
            Ok(false) => {}
            Err(e) => match self.on_check_failure {
                DuplicateCheckPolicy::Reject => {
                    tracing::error!(tracking_key = %tracking_key, error = %e, "duplicate check failed");
                    return Err(ProcessFailure::new(ProcessError::DuplicateCheck(e), actions));
                }
                DuplicateCheckPolicy::Proceed => {
                    tracing::warn!(
                        tracking_key = %tracking_key,
                        error = %e,
                        "duplicate check failed, relying on backend uniqueness"
                    );
                }
            },
        }

        match self.store.insert_payment(&notification).await {
            Ok(InsertOutcome::Inserted(result)) => {
                actions.database_insert = true;
                tracing::info!(tracking_key = %tracking_key, result = %result, "payment recorded");
            }
            Ok(InsertOutcome::Duplicate) => {
                tracing::info!(tracking_key = %tracking_key, "backend reported duplicate tracking key");
                return Ok(ProcessOutcome::Duplicate(notification));
            }
            Err(e) => {
                tracing::error!(tracking_key = %tracking_key, error = %e, "failed to record payment");
                return Err(ProcessFailure::new(ProcessError::Persistence(e), actions));
            }
        }

        let forward = match self.forwarder.forward(&notification).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(tracking_key = %tracking_key, error = %e, "failed to forward payment");
                return Err(ProcessFailure::new(ProcessError::Forwarding(e), actions));
            }
        };
        actions.api_forward = true;

        Ok(ProcessOutcome::Processed {
            notification,
            forward,
        })
    }
}
