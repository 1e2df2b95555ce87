//! DevTools wire errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdpError {
    /// Nothing answered on the debugging endpoint.
    #[error("Chrome not available at {0}")]
    ChromeNotAvailable(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Error object returned by Chrome for a command.
    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Exception thrown by evaluated page script.
    #[error("JavaScript error: {0}")]
    JavaScript(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// The debugging socket is gone.
    #[error("Session closed")]
    SessionClosed,

    #[error("Target closed: {0}")]
    TargetClosed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CdpError {
    /// The socket or the target went away; waiting longer cannot help.
    pub fn is_gone(&self) -> bool {
        matches!(self, CdpError::SessionClosed | CdpError::TargetClosed(_))
    }
}
