//! Browser and page abstractions.
//!
//! The automation core only talks to these traits. The CDP-backed
//! implementations live in [`crate::chrome`]; tests use in-memory fakes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::BrowserError;

/// One way of locating an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Plain CSS selector.
    Css(String),
    /// CSS selector restricted to elements whose text contains `text`.
    HasText { css: String, text: String },
    /// Any element whose own text contains `text`.
    Text(String),
}

impl Selector {
    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css(css.into())
    }

    pub fn has_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Selector::HasText {
            css: css.into(),
            text: text.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Selector::Text(text.into())
    }

    /// JSON form consumed by the in-page query script.
    pub fn to_query(&self) -> Value {
        match self {
            Selector::Css(css) => serde_json::json!({ "css": css }),
            Selector::HasText { css, text } => serde_json::json!({ "css": css, "text": text }),
            Selector::Text(text) => serde_json::json!({ "css": "*", "text": text, "leaf": true }),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "{}", css),
            Selector::HasText { css, text } => write!(f, "{}:has-text(\"{}\")", css, text),
            Selector::Text(text) => write!(f, "text={}", text),
        }
    }
}

/// Ordered fallback candidates for one logical element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub name: String,
    pub candidates: Vec<Selector>,
}

impl SelectorList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidates: Vec::new(),
        }
    }

    pub fn css(mut self, css: impl Into<String>) -> Self {
        self.candidates.push(Selector::css(css));
        self
    }

    pub fn has_text(mut self, css: impl Into<String>, text: impl Into<String>) -> Self {
        self.candidates.push(Selector::has_text(css, text));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.candidates.push(Selector::text(text));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// A located element. Only valid on the page that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    /// Backend reference (a CDP remote object id for real pages).
    pub id: String,
    /// Selector that matched.
    pub selector: Selector,
}

/// Ready state to wait for after navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    DomContentLoaded,
    #[default]
    Load,
}

/// A browser cookie, as exchanged with `Storage.getCookies` / `Storage.setCookies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Seconds since the epoch. `None` for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl Cookie {
    /// Chrome reports session cookies with `expires <= 0`; drop that so they stay session cookies.
    pub fn normalized(mut self) -> Self {
        if self.expires.is_some_and(|e| e <= 0.0) {
            self.expires = None;
        }
        self
    }
}

/// Lifecycle notifications from the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    /// The debugging connection dropped, usually because the user closed the window.
    Disconnected,
    /// A page (tab) was closed.
    PageClosed { page_id: String },
}

/// A single browser tab.
#[async_trait]
pub trait Page: Send + Sync {
    /// Stable page identifier (the CDP target id).
    fn id(&self) -> &str;

    /// Browser context the page belongs to. `None` is the default context.
    fn context_id(&self) -> Option<&str>;

    /// Navigate and wait for `state` within `timeout`.
    async fn goto(&self, url: &str, state: LoadState, timeout: Duration) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Wait up to `timeout` for a visible match. `Ok(None)` on timeout.
    async fn wait_for_selector(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>, BrowserError>;

    /// All currently visible matches, in document order.
    async fn query_all(&self, selector: &Selector) -> Result<Vec<ElementHandle>, BrowserError>;

    /// Click the element `click_count` times in a row (3 selects the field contents).
    async fn click(&self, element: &ElementHandle, click_count: u32) -> Result<(), BrowserError>;

    /// Replace the element's contents with `value`.
    async fn fill(&self, element: &ElementHandle, value: &str) -> Result<(), BrowserError>;

    /// Press a named key (e.g. `Enter`) with the element focused.
    async fn press(&self, element: &ElementHandle, key: &str) -> Result<(), BrowserError>;

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError>;

    /// Click a visible anchor with exactly this `href` from page script.
    /// Returns `false` when no such anchor is visible.
    async fn click_anchor(&self, href: &str) -> Result<bool, BrowserError>;

    /// Wait for network quiet. Returns `false` if `timeout` elapsed first.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<bool, BrowserError>;

    /// Wait until no visible element matches. Returns `false` on timeout.
    async fn wait_for_hidden(&self, selector: &Selector, timeout: Duration) -> Result<bool, BrowserError>;

    /// Wait until the JS expression is truthy. Returns `false` on timeout.
    async fn wait_for_function(&self, expression: &str, timeout: Duration) -> Result<bool, BrowserError>;

    async fn is_text_visible(&self, text: &str) -> Result<bool, BrowserError>;

    fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// A running browser instance.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Create an isolated browser context and return its id.
    async fn new_context(&self) -> Result<String, BrowserError>;

    /// Open a blank page in `context` (the default context when `None`).
    async fn new_page(&self, context: Option<&str>) -> Result<Arc<dyn Page>, BrowserError>;

    /// Open pages, optionally restricted to one context.
    async fn pages(&self, context: Option<&str>) -> Result<Vec<Arc<dyn Page>>, BrowserError>;

    async fn cookies(&self, context: Option<&str>) -> Result<Vec<Cookie>, BrowserError>;

    async fn set_cookies(&self, context: Option<&str>, cookies: &[Cookie]) -> Result<(), BrowserError>;

    fn events(&self) -> broadcast::Receiver<BrowserEvent>;

    fn is_connected(&self) -> bool;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// Starts browsers.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_display() {
        assert_eq!(Selector::css("#email").to_string(), "#email");
        assert_eq!(
            Selector::has_text("button", "ログイン").to_string(),
            "button:has-text(\"ログイン\")"
        );
        assert_eq!(Selector::text("次へ").to_string(), "text=次へ");
    }

    #[test]
    fn test_selector_query_json() {
        let q = Selector::has_text("button", "Google").to_query();
        assert_eq!(q["css"], "button");
        assert_eq!(q["text"], "Google");

        let q = Selector::text("送信する").to_query();
        assert_eq!(q["leaf"], true);
    }

    #[test]
    fn test_selector_list_builder_keeps_order() {
        let list = SelectorList::new("login button")
            .css("button[type=\"submit\"]")
            .has_text("button", "ログイン")
            .text("サインイン");

        assert_eq!(list.candidates.len(), 3);
        assert_eq!(list.candidates[0], Selector::css("button[type=\"submit\"]"));
        assert_eq!(list.candidates[2], Selector::text("サインイン"));
    }

    #[test]
    fn test_cookie_deserialize_ignores_extra_fields() {
        let json = r#"{
            "name": "d", "value": "xoxd", "domain": ".slack.com", "path": "/",
            "expires": -1, "size": 10, "httpOnly": true, "secure": true,
            "session": true, "sameSite": "Lax", "priority": "Medium"
        }"#;
        let cookie: Cookie = serde_json::from_str(json).unwrap();
        let cookie = cookie.normalized();
        assert_eq!(cookie.domain, ".slack.com");
        assert!(cookie.http_only);
        assert_eq!(cookie.expires, None);
        assert_eq!(cookie.same_site.as_deref(), Some("Lax"));
    }

    #[test]
    fn test_cookie_serialize_skips_session_expiry() {
        let cookie = Cookie {
            name: "b".to_string(),
            value: "1".to_string(),
            domain: ".slack.com".to_string(),
            path: "/".to_string(),
            expires: None,
            http_only: false,
            secure: true,
            same_site: None,
        };
        let json = serde_json::to_value(&cookie).unwrap();
        assert!(json.get("expires").is_none());
        assert_eq!(json["httpOnly"], false);
    }
}
