//! [`Browser`] backed by a CDP connection to a Chrome process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::process::Child;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::page::CdpPage;
use crate::cdp::{CdpClient, LifecycleEvent};
use crate::error::BrowserError;
use crate::page::{Browser, BrowserEvent, Cookie, Page};

/// How long Chrome gets to exit on its own after `Browser.close`.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// A Chrome instance we launched and connected to.
pub struct CdpBrowser {
    client: Arc<CdpClient>,
    pages: Mutex<HashMap<String, Arc<CdpPage>>>,
    slow_mo: Duration,
    events: broadcast::Sender<BrowserEvent>,
    process: tokio::sync::Mutex<Option<Child>>,
    /// Throwaway profile, removed once Chrome has exited.
    profile: Mutex<Option<TempDir>>,
    _forward: tokio::task::JoinHandle<()>,
}

impl CdpBrowser {
    pub(crate) fn new(
        client: CdpClient,
        process: Option<Child>,
        profile: Option<TempDir>,
        slow_mo: Duration,
    ) -> Self {
        let client = Arc::new(client);
        let (events, _) = broadcast::channel(64);

        let forward = {
            let mut lifecycle = client.subscribe();
            let events = events.clone();
            tokio::spawn(async move {
                loop {
                    match lifecycle.recv().await {
                        Ok(LifecycleEvent::TargetDestroyed(target_id)) => {
                            let _ = events.send(BrowserEvent::PageClosed { page_id: target_id });
                        }
                        Ok(LifecycleEvent::Disconnected) | Err(broadcast::error::RecvError::Closed) => {
                            let _ = events.send(BrowserEvent::Disconnected);
                            break;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Dropped {} browser lifecycle events", n);
                        }
                    }
                }
            })
        };

        Self {
            client,
            pages: Mutex::new(HashMap::new()),
            slow_mo,
            events,
            process: tokio::sync::Mutex::new(process),
            profile: Mutex::new(profile),
            _forward: forward,
        }
    }

    async fn attach_page(
        &self,
        target_id: &str,
        context: Option<String>,
    ) -> Result<Arc<CdpPage>, BrowserError> {
        let session = self.client.attach(target_id).await?;
        let page = Arc::new(CdpPage::new(
            session,
            self.client.clone(),
            context,
            self.slow_mo,
        ));
        self.pages
            .lock()
            .insert(target_id.to_string(), page.clone());
        Ok(page)
    }

    /// Wait for the Chrome process to exit, killing it after the grace period.
    async fn reap_process(&self) {
        let Some(mut child) = self.process.lock().await.take() else {
            return;
        };

        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!("Chrome exited: {}", status),
            Ok(Err(e)) => warn!("Failed to wait for Chrome: {}", e),
            Err(_) => {
                info!("Chrome still running after close, killing it");
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill Chrome: {}", e);
                }
            }
        }
    }
}

#[async_trait]
impl Browser for CdpBrowser {
    async fn new_context(&self) -> Result<String, BrowserError> {
        let context = self.client.create_browser_context().await?;
        debug!("Created browser context {}", context);
        Ok(context)
    }

    async fn new_page(&self, context: Option<&str>) -> Result<Arc<dyn Page>, BrowserError> {
        let target_id = self.client.create_target("about:blank", context).await?;
        let page: Arc<dyn Page> = self
            .attach_page(&target_id, context.map(|c| c.to_string()))
            .await?;
        Ok(page)
    }

    async fn pages(&self, context: Option<&str>) -> Result<Vec<Arc<dyn Page>>, BrowserError> {
        let targets = self.client.get_targets().await?;
        let mut pages: Vec<Arc<dyn Page>> = Vec::new();

        for target in targets {
            if !target.is_page() || self.client.is_target_destroyed(&target.target_id) {
                continue;
            }
            if context.is_some() && target.browser_context_id.as_deref() != context {
                continue;
            }

            let known = self.pages.lock().get(&target.target_id).cloned();
            let page: Arc<dyn Page> = match known {
                Some(page) => page,
                None => {
                    self.attach_page(&target.target_id, target.browser_context_id.clone())
                        .await?
                }
            };
            pages.push(page);
        }

        Ok(pages)
    }

    async fn cookies(&self, context: Option<&str>) -> Result<Vec<Cookie>, BrowserError> {
        Ok(self.client.get_cookies(context).await?)
    }

    async fn set_cookies(&self, context: Option<&str>, cookies: &[Cookie]) -> Result<(), BrowserError> {
        self.client.set_cookies(context, cookies).await?;
        debug!("Installed {} cookies", cookies.len());
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<BrowserEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let result = if self.client.is_connected() {
            self.client.close_browser().await.map_err(BrowserError::from)
        } else {
            Ok(())
        };

        self.pages.lock().clear();
        self.reap_process().await;
        drop(self.profile.lock().take());

        info!("Browser closed");
        result
    }
}

impl Drop for CdpBrowser {
    fn drop(&mut self) {
        self._forward.abort();
    }
}
