//! Automation error types.

use dakoku_browser::{BrowserError, ResolveError, SessionError, TeardownReason};
use dakoku_daemon::DaemonError;
use thiserror::Error;

use crate::request::Site;

/// Errors that abort an automation run.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Missing credentials for {site}: {}", .missing.join(", "))]
    MissingCredentials { site: Site, missing: Vec<String> },

    #[error("Element not found: {element}")]
    ElementNotFound { element: String },

    #[error("Navigation timed out: {what}")]
    NavigationTimeout { what: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The site showed an explicit error after submission.
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error(transparent)]
    Browser(BrowserError),

    #[error(transparent)]
    Session(SessionError),

    #[error("Process lock error: {0}")]
    Lock(#[from] DaemonError),
}

impl AutomationError {
    /// The teardown reason when this error only says the browser or page is gone.
    pub fn lost_browser(&self) -> Option<TeardownReason> {
        match self {
            AutomationError::Browser(BrowserError::Disconnected) => Some(TeardownReason::BrowserDisconnected),
            AutomationError::Browser(BrowserError::PageClosed) => Some(TeardownReason::PageClosed),
            _ => None,
        }
    }

    /// Localized description for the end user, without selector or DOM detail.
    pub fn user_message(&self) -> String {
        match self {
            AutomationError::MissingCredentials { site, .. } => {
                format!("{}の認証情報が設定されていません", site.display_name())
            }
            AutomationError::ElementNotFound { .. } => {
                "画面上の要素が見つかりませんでした。サイトの画面が変更された可能性があります".to_string()
            }
            AutomationError::NavigationTimeout { .. } => {
                "ページの読み込みがタイムアウトしました".to_string()
            }
            AutomationError::AuthenticationFailed(_) => "ログインに失敗しました".to_string(),
            AutomationError::SubmissionRejected(_) => "送信時にエラーが表示されました".to_string(),
            AutomationError::InvalidAction(action) => format!("不正なアクションです: {}", action),
            AutomationError::UnknownSite(site) => format!("不明なサイトです: {}", site),
            AutomationError::InvalidTime(time) => format!("時刻の形式が不正です: {}", time),
            AutomationError::Browser(e) if e.is_fatal() => {
                "ブラウザが閉じられたため処理を中断しました".to_string()
            }
            AutomationError::Browser(BrowserError::ChromeNotFound) => {
                "Google Chromeが見つかりません".to_string()
            }
            AutomationError::Browser(_) | AutomationError::Session(_) => {
                "ブラウザの操作中にエラーが発生しました".to_string()
            }
            AutomationError::Lock(_) => "実行中の処理を確認できませんでした".to_string(),
        }
    }
}

impl From<BrowserError> for AutomationError {
    fn from(e: BrowserError) -> Self {
        match e {
            BrowserError::NavigationTimeout(what) => AutomationError::NavigationTimeout { what },
            other => AutomationError::Browser(other),
        }
    }
}

impl From<ResolveError> for AutomationError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::ElementNotFound { element } => AutomationError::ElementNotFound { element },
            ResolveError::Browser(e) => e.into(),
        }
    }
}

impl From<SessionError> for AutomationError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Browser(e) => e.into(),
            other => AutomationError::Session(other),
        }
    }
}
