//! STP payment-notification ingestion.
//!
//! STP (the SPEI clearing provider) posts a JSON notification for every
//! incoming transfer. This crate validates those notifications, records each
//! tracking key at most once in a persistence backend, and optionally relays
//! the payment to a partner API.
//!
//! # Modules
//!
//! - [`validation`]: presence check for the required notification fields
//! - [`notification`]: typed [`PaymentNotification`] and its scalar values
//! - [`store`]: the [`PaymentStore`] capability (existence check, insert, stats)
//! - [`supabase`]: [`SupabaseStore`], backed by Supabase RPC functions
//! - [`sqlite`]: [`SqliteStore`], an embedded backend (feature `sqlite`)
//! - [`forwarder`]: the [`PartnerForwarder`] capability and its HTTP/bypass implementations
//! - [`processor`]: [`WebhookProcessor`], the per-request ingestion flow

pub mod constants;
pub mod error;
pub mod forwarder;
pub mod notification;
pub mod processor;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;
pub mod supabase;
pub mod validation;

pub use error::{ForwardError, ProcessError, StoreError};
pub use forwarder::{BypassForwarder, ForwardOutcome, HttpForwarder, PartnerForwarder};
pub use notification::{PaymentNotification, StpValue};
pub use processor::{
    Actions, DuplicateCheckPolicy, ProcessFailure, ProcessOutcome, WebhookProcessor,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use store::{InsertOutcome, PaymentStore, StatsSnapshot};
pub use supabase::SupabaseStore;
pub use validation::{validate_payload, ValidationReport};
