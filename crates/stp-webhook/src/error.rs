use thiserror::Error;

/// Errors raised by a [`PaymentStore`](crate::store::PaymentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached at all (DNS, connect, TLS, reset).
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with an error status.
    #[error("backend rejected request ({status}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("unexpected backend response: {0}")]
    UnexpectedResponse(String),

    /// Local database failure (embedded backend).
    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// True when the backend refused the write because the tracking key exists.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Rejected { code, .. } => {
                code.as_deref() == Some(crate::constants::PG_UNIQUE_VIOLATION)
            }
            _ => false,
        }
    }
}

/// Errors raised while relaying a payment to the partner API.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("partner API timed out")]
    Timeout,

    #[error("partner API transport error: {0}")]
    Transport(String),

    #[error("partner API rejected payment ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for ForwardError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ForwardError::Timeout
        } else {
            ForwardError::Transport(e.to_string())
        }
    }
}

/// Failure of one stage of the ingestion flow.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("malformed notification: {0}")]
    Malformed(String),

    #[error("duplicate check failed: {0}")]
    DuplicateCheck(#[source] StoreError),

    #[error("persistence failed: {0}")]
    Persistence(#[source] StoreError),

    #[error("forwarding failed: {0}")]
    Forwarding(#[source] ForwardError),
}

impl ProcessError {
    /// True for errors caused by the caller's payload rather than a dependency.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ProcessError::MissingFields(_) | ProcessError::Malformed(_)
        )
    }

    /// Caller-facing description. Backend and partner detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ProcessError::MissingFields(fields) => {
                format!("missing required fields: {}", fields.join(", "))
            }
            ProcessError::Malformed(msg) => msg.clone(),
            ProcessError::DuplicateCheck(_) => "could not verify existing payment".to_string(),
            ProcessError::Persistence(_) => "could not persist payment".to_string(),
            ProcessError::Forwarding(_) => "could not forward payment to partner API".to_string(),
        }
    }
}
