//! Error types for the triage desk.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Mail credential expired. Sign in again before fetching or sending.")]
    AuthExpired,

    #[error("Classification failed: {0}")]
    Oracle(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeskError {
    /// True when the error means the mail credential must be refreshed
    /// before any further gateway call.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, DeskError::AuthExpired)
    }
}
