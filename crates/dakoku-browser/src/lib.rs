//! # dakoku-browser
//!
//! Browser control for attendance automation.
//!
//! ## Features
//!
//! - Chrome launch with remote debugging and a throwaway profile
//! - CDP client with flattened page sessions and automatic dialog dismissal
//! - Selector resolution over ordered fallback lists
//! - Session lifecycle with a single teardown path
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dakoku_browser::{ChromeLauncher, LaunchOptions, SessionManager, SelectorList, resolve};
//!
//! let launcher = Arc::new(ChromeLauncher::new(LaunchOptions::default()));
//! let session = SessionManager::new(launcher);
//! let page = session.launch().await?;
//!
//! let email = SelectorList::new("email field").css("#user_email").css("input[type=\"email\"]");
//! let field = resolve(page.as_ref(), &email, REQUIRED_TIMEOUT).await?;
//! page.fill(&field, "user@example.com").await?;
//! ```

pub mod cdp;
pub mod chrome;
pub mod error;
pub mod launcher;
pub mod page;
pub mod resolver;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use chrome::{CdpBrowser, CdpPage};
pub use error::{BrowserError, ResolveError, SessionError};
pub use launcher::{ChromeLauncher, LaunchOptions};
pub use page::{
    Browser, BrowserEvent, Cookie, ElementHandle, Launcher, LoadState, Page, Selector, SelectorList,
};
pub use resolver::{is_present, resolve, resolve_nth, OPTIONAL_TIMEOUT, REQUIRED_TIMEOUT};
pub use session::{LivenessConfig, SessionManager, SessionState, TeardownReason};
