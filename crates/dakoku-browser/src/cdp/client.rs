//! CDP WebSocket client.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::SplitStream;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use super::error::CdpError;
use super::protocol::{CdpMessage, DetachedFromTarget, TargetDestroyed, TargetInfo, VersionInfo};
use super::session::PageSession;
use super::transport::{CdpTransport, WsStream};
use crate::page::Cookie;

type WsSource = SplitStream<WsStream>;
type EventHandlers = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<CdpMessage>>>>;

/// Browser-level lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A target (tab, worker, ...) went away.
    TargetDestroyed(String),
    /// The WebSocket connection closed.
    Disconnected,
}

/// CDP client for browser automation.
///
/// Connects to Chrome via WebSocket and multiplexes page sessions over it.
pub struct CdpClient {
    transport: Arc<CdpTransport>,
    /// Event channels by session ID.
    event_handlers: EventHandlers,
    lifecycle: broadcast::Sender<LifecycleEvent>,
    destroyed: Arc<Mutex<HashSet<String>>>,
    /// Background task handle.
    _recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to Chrome at the given debugging endpoint (e.g. `http://127.0.0.1:9222`).
    pub async fn connect(endpoint: &str) -> Result<Self, CdpError> {
        let http_endpoint = endpoint.trim_end_matches('/');
        url::Url::parse(http_endpoint)?;

        let version_url = format!("{}/json/version", http_endpoint);
        debug!("Fetching browser version from {}", version_url);

        let version: VersionInfo = reqwest::get(&version_url)
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?
            .json()
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?;

        info!("Connected to browser: {}", version.browser);
        Self::connect_ws(&version.ws_url).await
    }

    /// Connect straight to a browser WebSocket URL.
    pub async fn connect_ws(browser_ws_url: &str) -> Result<Self, CdpError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(browser_ws_url)
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let transport = Arc::new(CdpTransport::new(ws_sink));
        let event_handlers: EventHandlers = Arc::new(RwLock::new(HashMap::new()));
        let (lifecycle, _) = broadcast::channel(64);
        let destroyed = Arc::new(Mutex::new(HashSet::new()));

        let recv_task = {
            let transport = transport.clone();
            let event_handlers = event_handlers.clone();
            let lifecycle = lifecycle.clone();
            let destroyed = destroyed.clone();
            tokio::spawn(async move {
                Self::receive_loop(ws_source, &transport, &event_handlers, &lifecycle, &destroyed)
                    .await;
                transport.shutdown();
                event_handlers.write().await.clear();
                let _ = lifecycle.send(LifecycleEvent::Disconnected);
            })
        };

        debug!("CDP client connected to {}", browser_ws_url);

        Ok(Self {
            transport,
            event_handlers,
            lifecycle,
            destroyed,
            _recv_task: recv_task,
        })
    }

    /// Route every frame until the socket closes: replies to their waiter,
    /// page events to their session, the rest to [`Self::on_browser_event`].
    async fn receive_loop(
        mut ws_source: WsSource,
        transport: &CdpTransport,
        event_handlers: &EventHandlers,
        lifecycle: &broadcast::Sender<LifecycleEvent>,
        destroyed: &Mutex<HashSet<String>>,
    ) {
        loop {
            let text = match ws_source.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(frame))) => {
                    debug!("Browser closed the socket: {:?}", frame);
                    return;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    return;
                }
                None => return,
            };

            trace!("CDP recv: {}", text);
            let msg: CdpMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Unreadable CDP frame: {}", e);
                    continue;
                }
            };

            match (msg.id, msg.session_id.clone()) {
                (Some(id), _) => transport.resolve(id, msg),
                (None, Some(session)) => {
                    if let Some(tx) = event_handlers.read().await.get(&session) {
                        let _ = tx.send(msg);
                    }
                }
                (None, None) => {
                    Self::on_browser_event(&msg, event_handlers, lifecycle, destroyed).await;
                }
            }
        }
    }

    async fn on_browser_event(
        msg: &CdpMessage,
        event_handlers: &EventHandlers,
        lifecycle: &broadcast::Sender<LifecycleEvent>,
        destroyed: &Mutex<HashSet<String>>,
    ) {
        if msg.is_event("Target.targetDestroyed") {
            if let Some(TargetDestroyed { target_id }) = msg.event_params() {
                debug!("Target destroyed: {}", target_id);
                destroyed.lock().insert(target_id.clone());
                let _ = lifecycle.send(LifecycleEvent::TargetDestroyed(target_id));
            }
        } else if msg.is_event("Target.detachedFromTarget") {
            if let Some(DetachedFromTarget { session_id }) = msg.event_params() {
                debug!("Detached from session {}", session_id);
                // Dropping the sender ends that session's event pump
                event_handlers.write().await.remove(&session_id);
            }
        }
    }

    /// Send a browser-level CDP command and wait for the response.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport.call(method, params, None).await
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Subscribe to target lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }

    /// Whether a `Target.targetDestroyed` was seen for this target.
    pub fn is_target_destroyed(&self, target_id: &str) -> bool {
        self.destroyed.lock().contains(target_id)
    }

    // ========================================================================
    // Target Management
    // ========================================================================

    /// Enable `Target.targetCreated` / `Target.targetDestroyed` notifications.
    pub async fn discover_targets(&self) -> Result<(), CdpError> {
        self.call("Target.setDiscoverTargets", Some(json!({"discover": true})))
            .await?;
        Ok(())
    }

    /// Create an isolated browser context (fresh cookie jar).
    pub async fn create_browser_context(&self) -> Result<String, CdpError> {
        let result = self.call("Target.createBrowserContext", None).await?;
        result["browserContextId"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::InvalidResponse("Missing browserContextId".to_string()))
    }

    /// Open a new page target and return its target id.
    pub async fn create_target(&self, url: &str, context: Option<&str>) -> Result<String, CdpError> {
        let mut params = json!({ "url": url });
        if let Some(ctx) = context {
            params["browserContextId"] = json!(ctx);
        }

        let result = self.call("Target.createTarget", Some(params)).await?;
        let target_id = result["targetId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing targetId".to_string()))?
            .to_string();

        debug!("Created target {} ({})", target_id, url);
        Ok(target_id)
    }

    /// Attach to a target with a flattened session.
    pub async fn attach(&self, target_id: &str) -> Result<PageSession, CdpError> {
        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true
                })),
            )
            .await?;

        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing sessionId".to_string()))?
            .to_string();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.event_handlers
            .write()
            .await
            .insert(session_id.clone(), event_tx);

        let session = PageSession::new(
            target_id.to_string(),
            session_id,
            self.transport.clone(),
            event_rx,
        );

        session.enable_domains().await?;

        Ok(session)
    }

    /// Get all targets.
    pub async fn get_targets(&self) -> Result<Vec<TargetInfo>, CdpError> {
        let result = self.call("Target.getTargets", None).await?;
        let targets: Vec<TargetInfo> = serde_json::from_value(result["targetInfos"].clone())?;
        Ok(targets)
    }

    /// Close a page/target.
    pub async fn close_target(&self, target_id: &str) -> Result<(), CdpError> {
        self.call("Target.closeTarget", Some(json!({"targetId": target_id})))
            .await?;
        Ok(())
    }

    // ========================================================================
    // Storage
    // ========================================================================

    /// All cookies of a browser context (the default context when `None`).
    pub async fn get_cookies(&self, context: Option<&str>) -> Result<Vec<Cookie>, CdpError> {
        let params = context.map(|ctx| json!({ "browserContextId": ctx }));
        let result = self.call("Storage.getCookies", params).await?;
        let cookies: Vec<Cookie> = serde_json::from_value(result["cookies"].clone())?;
        Ok(cookies.into_iter().map(Cookie::normalized).collect())
    }

    /// Install cookies into a browser context.
    pub async fn set_cookies(&self, context: Option<&str>, cookies: &[Cookie]) -> Result<(), CdpError> {
        let mut params = json!({ "cookies": cookies });
        if let Some(ctx) = context {
            params["browserContextId"] = json!(ctx);
        }
        self.call("Storage.setCookies", Some(params)).await?;
        Ok(())
    }

    /// Ask the browser to exit. The connection drops before a reply, so that is not an error.
    pub async fn close_browser(&self) -> Result<(), CdpError> {
        match self.call("Browser.close", None).await {
            Ok(_) | Err(CdpError::SessionClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._recv_task.abort();
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
