//! Persistence capability for payment notifications.
//!
//! Implementations: [`crate::supabase::SupabaseStore`] (remote RPC) and
//! [`crate::sqlite::SqliteStore`] (embedded). Records are create-only; nothing
//! here updates or deletes a payment.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;
use crate::notification::PaymentNotification;

/// Aggregate totals computed by the backend on every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_transactions: u64,
    pub total_amount: f64,
}

/// Result of a single insert attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// Stored. Carries whatever the backend returned for the insert.
    Inserted(serde_json::Value),
    /// The backend's uniqueness constraint on the tracking key refused the write.
    Duplicate,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Whether a payment with this tracking key is already recorded.
    async fn payment_exists(&self, tracking_key: &str) -> Result<bool, StoreError>;

    /// Atomically insert one payment. Exactly one attempt, no retries.
    async fn insert_payment(
        &self,
        notification: &PaymentNotification,
    ) -> Result<InsertOutcome, StoreError>;

    async fn stats(&self) -> Result<StatsSnapshot, StoreError>;

    /// Most recent payments first.
    async fn recent_payments(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<serde_json::Value>, StoreError>;
}
