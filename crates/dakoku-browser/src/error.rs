//! Browser-level error types.

use thiserror::Error;

use crate::cdp::CdpError;

/// Errors raised while driving the browser.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Navigation timed out: {0}")]
    NavigationTimeout(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Page closed")]
    PageClosed,

    #[error("Browser disconnected")]
    Disconnected,

    #[error("Chrome not found. Please install Google Chrome or set browser.chrome_path.")]
    ChromeNotFound,

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),
}

impl BrowserError {
    /// Whether the browser or page is gone, so retrying on the same page is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrowserError::PageClosed | BrowserError::Disconnected)
    }
}

impl From<CdpError> for BrowserError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::ConnectionFailed(msg) => BrowserError::ConnectionFailed(msg),
            CdpError::ChromeNotAvailable(msg) => BrowserError::ConnectionFailed(msg),
            CdpError::NavigationFailed(msg) => BrowserError::NavigationFailed(msg),
            CdpError::JavaScript(msg) => BrowserError::ActionFailed(format!("JS error: {}", msg)),
            CdpError::Timeout(msg) => BrowserError::ActionFailed(format!("Timeout: {}", msg)),
            CdpError::SessionClosed => BrowserError::Disconnected,
            CdpError::TargetClosed(_) => BrowserError::PageClosed,
            _ => BrowserError::ActionFailed(e.to_string()),
        }
    }
}

/// Selector resolution failure.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Every candidate in the list was tried without a visible match.
    #[error("Element not found: {element}")]
    ElementNotFound { element: String },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Session lifecycle violations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Browser session already launched")]
    AlreadyLaunched,

    #[error("Browser session not initialized")]
    NotInitialized,

    #[error("Browser session already closed")]
    Closed,

    #[error(transparent)]
    Browser(#[from] BrowserError),
}
