//! Request/response plumbing shared by the browser client and page sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::SinkExt;
use futures::stream::SplitSink;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::trace;

use super::error::CdpError;
use super::protocol::{CdpMessage, CdpRequest};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Outgoing half of the CDP connection plus the table of in-flight requests.
pub(crate) struct CdpTransport {
    ws_tx: tokio::sync::Mutex<WsSink>,
    request_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>>,
    connected: AtomicBool,
    call_timeout: Duration,
}

impl CdpTransport {
    pub(crate) fn new(ws_tx: WsSink) -> Self {
        Self {
            ws_tx: tokio::sync::Mutex::new(ws_tx),
            request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send a command and wait for its response.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        if !self.is_connected() {
            return Err(CdpError::SessionClosed);
        }

        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&CdpRequest {
            id,
            method,
            params,
            session_id,
        })?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        {
            let mut ws = self.ws_tx.lock().await;
            if let Err(e) = ws.send(Message::Text(json.into())).await {
                self.pending.lock().remove(&id);
                return Err(CdpError::ConnectionFailed(e.to_string()));
            }
        }

        match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }

    /// Hand a reply to whoever is waiting on `id`.
    pub(crate) fn resolve(&self, id: u64, reply: CdpMessage) {
        match self.pending.lock().remove(&id) {
            Some(waiter) => {
                let _ = waiter.send(reply.into_result());
            }
            None => trace!("Dropping reply to unknown request {}", id),
        }
    }

    /// Mark the connection dead and fail every in-flight request.
    pub(crate) fn shutdown(&self) {
        self.connected.store(false, Ordering::SeqCst);
        // Dropping the senders wakes each waiter with `SessionClosed`.
        self.pending.lock().clear();
    }
}
