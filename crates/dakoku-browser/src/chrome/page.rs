//! [`Page`] backed by a CDP page session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::script;
use crate::cdp::{CdpClient, CdpError, PageSession};
use crate::error::BrowserError;
use crate::page::{ElementHandle, LoadState, Page, Selector};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A browser tab driven over CDP.
pub struct CdpPage {
    session: PageSession,
    client: Arc<CdpClient>,
    context_id: Option<String>,
    /// Delay before each input action.
    slow_mo: Duration,
    closed: AtomicBool,
}

impl CdpPage {
    pub(crate) fn new(
        session: PageSession,
        client: Arc<CdpClient>,
        context_id: Option<String>,
        slow_mo: Duration,
    ) -> Self {
        Self {
            session,
            client,
            context_id,
            slow_mo,
            closed: AtomicBool::new(false),
        }
    }

    /// Translate a CDP failure, recognising calls into a destroyed target.
    fn map_err(&self, e: CdpError) -> BrowserError {
        if self.client.is_target_destroyed(self.session.target_id()) {
            self.closed.store(true, Ordering::SeqCst);
            return BrowserError::PageClosed;
        }
        e.into()
    }

    fn ensure_open(&self) -> Result<(), BrowserError> {
        if !self.client.is_connected() {
            return Err(BrowserError::Disconnected);
        }
        if self.is_closed() {
            return Err(BrowserError::PageClosed);
        }
        Ok(())
    }

    async fn pace(&self) {
        if !self.slow_mo.is_zero() {
            tokio::time::sleep(self.slow_mo).await;
        }
    }

    async fn visible_handles(&self, selector: &Selector) -> Result<Vec<ElementHandle>, BrowserError> {
        let array = self
            .session
            .evaluate_handle(&script::query_visible(selector))
            .await
            .map_err(|e| self.map_err(e))?;

        let Some(array_id) = array.object_id else {
            return Ok(Vec::new());
        };

        let props = self
            .session
            .get_properties(&array_id)
            .await
            .map_err(|e| self.map_err(e))?;

        let mut indexed: Vec<(usize, String)> = props
            .into_iter()
            .filter_map(|p| {
                let index = p.name.parse::<usize>().ok()?;
                let object_id = p.value?.object_id?;
                Some((index, object_id))
            })
            .collect();
        indexed.sort_by_key(|(index, _)| *index);

        if let Err(e) = self.session.release_object(&array_id).await {
            trace!("Failed to release query result: {}", e);
        }

        Ok(indexed
            .into_iter()
            .map(|(_, id)| ElementHandle {
                id,
                selector: selector.clone(),
            })
            .collect())
    }

    async fn call_on(&self, element: &ElementHandle, function: &str) -> Result<Value, BrowserError> {
        self.session
            .call_function_on(&element.id, function, None)
            .await
            .map_err(|e| self.map_err(e))
    }

    /// Poll `probe` until it yields `true` or the deadline passes.
    ///
    /// Non-fatal errors (e.g. mid-navigation context teardown) count as a miss.
    async fn poll_until<F, Fut>(&self, timeout: Duration, mut probe: F) -> Result<bool, BrowserError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<bool, BrowserError>>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            match probe().await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => trace!("probe failed: {}", e),
            }

            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Page for CdpPage {
    fn id(&self) -> &str {
        self.session.target_id()
    }

    fn context_id(&self) -> Option<&str> {
        self.context_id.as_deref()
    }

    async fn goto(&self, url: &str, state: LoadState, timeout: Duration) -> Result<(), BrowserError> {
        self.ensure_open()?;
        let navigation = self.session.navigate_and_wait(url, state, timeout);

        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => {
                debug!("Loaded {}", url);
                Ok(())
            }
            Ok(Err(CdpError::Timeout(_))) | Err(_) => {
                Err(BrowserError::NavigationTimeout(url.to_string()))
            }
            Ok(Err(e)) => Err(self.map_err(e)),
        }
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.ensure_open()?;
        self.session.get_url().await.map_err(|e| self.map_err(e))
    }

    async fn wait_for_selector(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>, BrowserError> {
        self.ensure_open()?;
        let deadline = Instant::now() + timeout;

        loop {
            match self.visible_handles(selector).await {
                Ok(mut handles) if !handles.is_empty() => return Ok(Some(handles.swap_remove(0))),
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => trace!("query for {} failed: {}", selector, e),
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn query_all(&self, selector: &Selector) -> Result<Vec<ElementHandle>, BrowserError> {
        self.ensure_open()?;
        self.visible_handles(selector).await
    }

    async fn click(&self, element: &ElementHandle, click_count: u32) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.pace().await;

        let center = self.call_on(element, script::ELEMENT_CENTER).await?;
        let (Some(x), Some(y)) = (center["x"].as_f64(), center["y"].as_f64()) else {
            return Err(BrowserError::ActionFailed(format!(
                "{} has no clickable box",
                element.selector
            )));
        };

        self.session
            .click_at(x, y, click_count)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.pace().await;

        self.call_on(element, script::FOCUS_AND_SELECT).await?;
        if value.is_empty() {
            self.call_on(element, script::CLEAR).await?;
            return Ok(());
        }

        self.session
            .insert_text(value)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn press(&self, element: &ElementHandle, key: &str) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.pace().await;

        self.call_on(element, script::FOCUS).await?;
        self.session.press_key(key).await.map_err(|e| self.map_err(e))
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        self.ensure_open()?;
        self.session
            .evaluate(expression)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn click_anchor(&self, href: &str) -> Result<bool, BrowserError> {
        self.ensure_open()?;
        self.pace().await;

        let clicked = self.evaluate(&script::click_anchor(href)).await?;
        Ok(clicked.as_bool().unwrap_or(false))
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<bool, BrowserError> {
        self.ensure_open()?;
        self.session
            .wait_for_network_idle(timeout)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn wait_for_hidden(&self, selector: &Selector, timeout: Duration) -> Result<bool, BrowserError> {
        self.ensure_open()?;
        let this = self;
        self.poll_until(timeout, move || async move {
            Ok::<bool, BrowserError>(this.visible_handles(selector).await?.is_empty())
        })
        .await
    }

    async fn wait_for_function(&self, expression: &str, timeout: Duration) -> Result<bool, BrowserError> {
        self.ensure_open()?;
        let wrapped = script::predicate(expression);
        let (this, wrapped) = (self, wrapped.as_str());
        self.poll_until(timeout, move || async move {
            let value = this.evaluate(wrapped).await?;
            Ok::<bool, BrowserError>(value.as_bool().unwrap_or(false))
        })
        .await
    }

    async fn is_text_visible(&self, text: &str) -> Result<bool, BrowserError> {
        self.ensure_open()?;
        let value = self.evaluate(&script::text_visible(text)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.client.is_target_destroyed(self.session.target_id())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if !self.client.is_connected() {
            return Ok(());
        }

        match self.client.close_target(self.session.target_id()).await {
            Ok(()) => {
                debug!("Closed page {}", self.session.target_id());
                Ok(())
            }
            Err(_) if self.client.is_target_destroyed(self.session.target_id()) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
