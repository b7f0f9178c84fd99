//! Error types for the ledger client.

use thiserror::Error;

/// Errors from talking to the ledger service.
///
/// The [`LedgerAnchor`](crate::LedgerAnchor) surface never returns these;
/// it degrades to empty values and logs instead. They are returned by the
/// fallible `try_*` calls for callers that want the reason.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Network failure, timeout, or the service is switched off.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The service answered with a status the contract does not allow.
    #[error("unexpected status {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: String },

    /// The response body did not match the wire schema.
    #[error("malformed ledger response: {0}")]
    Decode(String),

    /// The client could not be constructed.
    #[error("invalid ledger configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            LedgerError::Decode(e.to_string())
        } else {
            LedgerError::Unavailable(e.to_string())
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Decode(e.to_string())
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
