//! Navigation and load-state waits for a CDP page session.

use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::cdp::error::CdpError;
use crate::page::LoadState;

use super::PageSession;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resource count must stay flat this long to count as network idle.
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);

const NETWORK_PROBE: &str =
    "({ ready: document.readyState, resources: performance.getEntriesByType('resource').length })";

impl PageSession {
    /// Start navigating to `url`. Does not wait for the load.
    ///
    /// Returns the new document's loader id, or `None` for a same-document
    /// navigation such as a fragment change.
    pub async fn navigate(&self, url: &str) -> Result<Option<String>, CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText").and_then(|e| e.as_str()) {
            return Err(CdpError::NavigationFailed(format!("{}: {}", url, error)));
        }

        debug!("Navigating to {}", url);
        Ok(result["loaderId"].as_str().map(str::to_string))
    }

    /// Navigate and wait until the new document reaches `state`.
    ///
    /// Waits on the lifecycle events of the loader `Page.navigate` started,
    /// so the previous document's state never counts. Same-document
    /// navigations fall back to polling `readyState`.
    pub async fn navigate_and_wait(&self, url: &str, state: LoadState, timeout: Duration) -> Result<(), CdpError> {
        let mut loads = self.loads();
        let Some(loader_id) = self.navigate(url).await? else {
            return self.wait_for_load_state(state, timeout).await;
        };

        let reached = loads.wait_for(|progress| {
            progress
                .get(&loader_id)
                .is_some_and(|milestones| milestones.reached(state))
        });
        match tokio::time::timeout(timeout, reached).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => Err(CdpError::Timeout(format!("{} never reached {:?}", url, state))),
        }
    }

    /// Poll `document.readyState` until it reaches `state`.
    ///
    /// Evaluation errors while the old document is torn down are expected and retried.
    pub async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<(), CdpError> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.evaluate("document.readyState").await {
                Ok(value) => {
                    let ready = match (state, value.as_str()) {
                        (_, Some("complete")) => true,
                        (LoadState::DomContentLoaded, Some("interactive")) => true,
                        _ => false,
                    };
                    if ready {
                        return Ok(());
                    }
                }
                Err(e) if e.is_gone() => return Err(e),
                Err(e) => trace!("readyState probe failed: {}", e),
            }

            if Instant::now() >= deadline {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait until the page is loaded and no new resources were requested for a short window.
    /// Returns `false` if `timeout` elapsed first.
    pub async fn wait_for_network_idle(&self, timeout: Duration) -> Result<bool, CdpError> {
        let deadline = Instant::now() + timeout;
        let mut last_count: Option<u64> = None;
        let mut quiet_since = Instant::now();

        loop {
            match self.evaluate(NETWORK_PROBE).await {
                Ok(probe) => {
                    let complete = probe["ready"].as_str() == Some("complete");
                    let count = probe["resources"].as_u64();
                    let now = Instant::now();

                    if !complete || count != last_count {
                        last_count = count;
                        quiet_since = now;
                    } else if now.duration_since(quiet_since) >= NETWORK_QUIET_WINDOW {
                        return Ok(true);
                    }
                }
                Err(e) if e.is_gone() => return Err(e),
                Err(e) => {
                    trace!("network probe failed: {}", e);
                    last_count = None;
                    quiet_since = Instant::now();
                }
            }

            if Instant::now() >= deadline {
                return Ok(false);
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Get current URL.
    pub async fn get_url(&self) -> Result<String, CdpError> {
        let result = self.evaluate("window.location.href").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }
}
