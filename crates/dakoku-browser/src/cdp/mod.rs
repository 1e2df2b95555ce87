//! Chrome DevTools Protocol (CDP) client.
//!
//! One WebSocket connection to the browser endpoint carries every page
//! session (flattened `Target.attachToTarget`). Browser-level target events
//! are fanned out as [`LifecycleEvent`]s, and every attached page gets a pump
//! that dismisses JavaScript dialogs and tracks document load milestones.
//!
//! ```rust,ignore
//! let client = CdpClient::connect("http://127.0.0.1:9222").await?;
//! let target = client.create_target("about:blank", None).await?;
//! let page = client.attach(&target).await?;
//! page.navigate_and_wait("https://example.com", LoadState::Load, timeout).await?;
//! ```

mod client;
mod error;
mod protocol;
mod session;
mod transport;

pub use client::{CdpClient, LifecycleEvent};
pub use error::CdpError;
pub use protocol::*;
pub use session::PageSession;
