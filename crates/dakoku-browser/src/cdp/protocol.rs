//! Wire shapes of the DevTools protocol that this crate reads or writes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::CdpError;

/// Outgoing command. `sessionId` routes it to an attached page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpRequest<'a> {
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
}

/// Anything Chrome sends: a reply when `id` is set, an event otherwise.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpMessage {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<WireError>,
    pub method: Option<String>,
    pub params: Option<Value>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireError {
    pub code: i64,
    pub message: String,
}

impl CdpMessage {
    /// Reply payload, or the protocol error Chrome answered with.
    pub fn into_result(self) -> Result<Value, CdpError> {
        match self.error {
            Some(WireError { code, message }) => Err(CdpError::Protocol { code, message }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    pub fn is_event(&self, method: &str) -> bool {
        self.id.is_none() && self.method.as_deref() == Some(method)
    }

    /// Event parameters decoded as `T`. Malformed payloads yield `None`.
    pub fn event_params<T: DeserializeOwned>(&self) -> Option<T> {
        self.params
            .as_ref()
            .and_then(|p| T::deserialize(p).ok())
    }
}

/// `/json/version` answer. Chrome uses mixed-case keys here.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub browser_context_id: Option<String>,
}

impl TargetInfo {
    pub fn is_page(&self) -> bool {
        self.kind == "page"
    }
}

/// `Target.targetDestroyed`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDestroyed {
    pub target_id: String,
}

/// `Target.detachedFromTarget`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachedFromTarget {
    pub session_id: String,
}

/// `Page.javascriptDialogOpening`
#[derive(Debug, Clone, Deserialize)]
pub struct DialogOpening {
    pub url: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// `Page.lifecycleEvent`: a frame's document reached a milestone such as
/// `DOMContentLoaded` or `load`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLifecycle {
    pub frame_id: String,
    pub loader_id: String,
    pub name: String,
}

/// Handle to a value living in the page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    pub object_id: Option<String>,
    pub value: Option<Value>,
}

/// One entry of `Runtime.getProperties`.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub value: Option<RemoteObject>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    None,
    Left,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseEventType {
    MousePressed,
    MouseReleased,
    MouseMoved,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyEventType {
    KeyDown,
    KeyUp,
}

/// What `Input.dispatchKeyEvent` needs to synthesize a named key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDefinition {
    pub key: &'static str,
    pub key_code: u32,
    pub text: Option<&'static str>,
}

const KEYS: &[KeyDefinition] = &[
    KeyDefinition { key: "Enter", key_code: 13, text: Some("\r") },
    KeyDefinition { key: "Tab", key_code: 9, text: None },
    KeyDefinition { key: "Escape", key_code: 27, text: None },
    KeyDefinition { key: "Backspace", key_code: 8, text: None },
    KeyDefinition { key: "ArrowDown", key_code: 40, text: None },
];

impl KeyDefinition {
    /// The named keys above use the key name as their `code` too.
    pub fn named(key: &str) -> Option<Self> {
        KEYS.iter().find(|def| def.key == key).copied()
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
