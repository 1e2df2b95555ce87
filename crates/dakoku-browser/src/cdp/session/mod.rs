//! A flattened DevTools session bound to one page target.
//!
//! Commands go out over the shared browser socket tagged with this
//! session's id. Events for the session arrive on a channel fed by the
//! client's receive loop and are drained by a small pump that dismisses
//! JavaScript dialogs and records how far each document has loaded.

mod input;
mod js;
mod navigation;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::CdpError;
use super::protocol::{CdpMessage, DialogOpening, PageLifecycle};
use super::transport::CdpTransport;
use crate::page::LoadState;

/// Milestones a document (one loader) has reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadMilestones {
    pub dom_content_loaded: bool,
    pub loaded: bool,
}

impl LoadMilestones {
    pub fn reached(&self, state: LoadState) -> bool {
        match state {
            LoadState::DomContentLoaded => self.dom_content_loaded || self.loaded,
            LoadState::Load => self.loaded,
        }
    }
}

/// Milestones by loader id, for every document this session has seen.
type LoaderProgress = HashMap<String, LoadMilestones>;

pub struct PageSession {
    target_id: String,
    session_id: String,
    transport: Arc<CdpTransport>,
    loads: watch::Receiver<LoaderProgress>,
    pump: JoinHandle<()>,
}

impl PageSession {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        transport: Arc<CdpTransport>,
        events: mpsc::UnboundedReceiver<CdpMessage>,
    ) -> Self {
        let (loads_tx, loads) = watch::channel(LoaderProgress::new());
        let pump = tokio::spawn(pump_events(transport.clone(), session_id.clone(), events, loads_tx));
        Self {
            target_id,
            session_id,
            transport,
            loads,
            pump,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport
            .call(method, params, Some(&self.session_id))
            .await
    }

    pub(crate) fn loads(&self) -> watch::Receiver<LoaderProgress> {
        self.loads.clone()
    }

    /// Page events drive load waits and dialogs; Runtime backs evaluation.
    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("Page.setLifecycleEventsEnabled", Some(json!({ "enabled": true })))
            .await?;
        self.call("Runtime.enable", None).await?;
        debug!("Session {} ready on target {}", self.session_id, self.target_id);
        Ok(())
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Record lifecycle milestones per loader, and decline every dialog the
/// page opens (alerts, "open in the app?" prompts) so no step blocks on it.
/// Ends when the client drops the sender.
async fn pump_events(
    transport: Arc<CdpTransport>,
    session_id: String,
    mut events: mpsc::UnboundedReceiver<CdpMessage>,
    loads: watch::Sender<LoaderProgress>,
) {
    while let Some(msg) = events.recv().await {
        if msg.is_event("Page.lifecycleEvent") {
            if let Some(event) = msg.event_params::<PageLifecycle>() {
                record_milestone(&loads, event);
            }
            continue;
        }
        if !msg.is_event("Page.javascriptDialogOpening") {
            continue;
        }
        match msg.event_params::<DialogOpening>() {
            Some(d) => info!("Dismissing {} dialog on {}: {}", d.kind, d.url, d.message),
            None => info!("Dismissing dialog"),
        }

        let dismissed = transport
            .call(
                "Page.handleJavaScriptDialog",
                Some(json!({ "accept": false })),
                Some(&session_id),
            )
            .await;
        if let Err(e) = dismissed {
            warn!("Dialog stayed open: {}", e);
        }
    }
    debug!("Session {} stopped receiving events", session_id);
}

fn record_milestone(loads: &watch::Sender<LoaderProgress>, event: PageLifecycle) {
    loads.send_modify(|progress| {
        let milestones = progress.entry(event.loader_id).or_default();
        match event.name.as_str() {
            "DOMContentLoaded" => milestones.dom_content_loaded = true,
            "load" => milestones.loaded = true,
            _ => {}
        }
    });
}
