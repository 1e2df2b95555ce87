//! In-memory [`Browser`], [`Page`] and [`Launcher`] fakes.
//!
//! Pages record every interaction so tests can assert on order. A page is
//! either strict (only configured selectors are visible) or permissive
//! (everything is visible unless excluded).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::BrowserError;
use crate::page::{Browser, BrowserEvent, Cookie, ElementHandle, Launcher, LoadState, Page, Selector};

/// Default number of matches a permissive page reports for any selector.
const PERMISSIVE_COUNT: usize = 2;

/// One recorded page interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    Goto { url: String, state: LoadState },
    Probe(String),
    Click { selector: String, count: u32 },
    Fill { selector: String, value: String },
    Press { selector: String, key: String },
    ClickAnchor(String),
    WaitNetworkIdle,
    WaitHidden(String),
    WaitFunction(String),
    Evaluate(String),
    Close,
}

type AnchorHook = Arc<dyn Fn(&str) + Send + Sync>;

struct FakePageState {
    url: String,
    permissive: bool,
    counts: HashMap<String, usize>,
    excluded: HashSet<String>,
    broken: HashSet<String>,
    texts: HashSet<String>,
    anchors: HashSet<String>,
    redirects: HashMap<String, String>,
    anchor_hook: Option<AnchorHook>,
    network_idle: bool,
    hidden_waits_pass: bool,
    functions_pass: bool,
    actions: Vec<PageAction>,
}

/// Scriptable page.
pub struct FakePage {
    id: String,
    context_id: Option<String>,
    state: Mutex<FakePageState>,
    closed: AtomicBool,
    events: Mutex<Option<broadcast::Sender<BrowserEvent>>>,
    browser_connected: Mutex<Option<Arc<AtomicBool>>>,
}

impl FakePage {
    /// A page where nothing is visible until configured.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context_id: None,
            state: Mutex::new(FakePageState {
                url: "about:blank".to_string(),
                permissive: false,
                counts: HashMap::new(),
                excluded: HashSet::new(),
                broken: HashSet::new(),
                texts: HashSet::new(),
                anchors: HashSet::new(),
                redirects: HashMap::new(),
                anchor_hook: None,
                network_idle: true,
                hidden_waits_pass: true,
                functions_pass: true,
                actions: Vec::new(),
            }),
            closed: AtomicBool::new(false),
            events: Mutex::new(None),
            browser_connected: Mutex::new(None),
        }
    }

    /// A page where every selector has visible matches.
    pub fn permissive(id: impl Into<String>) -> Self {
        let page = Self::new(id);
        page.state.lock().permissive = true;
        page
    }

    pub fn in_context(mut self, context: impl Into<String>) -> Self {
        self.context_id = Some(context.into());
        self
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.set_url(url);
        self
    }

    pub fn with_visible(self, selector: &Selector) -> Self {
        self.set_count(selector, 1);
        self
    }

    pub fn with_count(self, selector: &Selector, count: usize) -> Self {
        self.set_count(selector, count);
        self
    }

    /// Hide a selector on a permissive page.
    pub fn without(self, selector: &Selector) -> Self {
        self.state.lock().excluded.insert(selector.to_string());
        self
    }

    /// Make queries for this selector fail with a non-fatal error.
    pub fn with_broken(self, selector: &Selector) -> Self {
        self.state.lock().broken.insert(selector.to_string());
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.state.lock().texts.insert(text.into());
        self
    }

    pub fn with_anchor(self, href: impl Into<String>) -> Self {
        self.state.lock().anchors.insert(href.into());
        self
    }

    /// Clicking an element matched by `selector` moves the page to `url`.
    pub fn with_redirect(self, selector: &Selector, url: impl Into<String>) -> Self {
        self.state
            .lock()
            .redirects
            .insert(selector.to_string(), url.into());
        self
    }

    pub fn with_network_idle(self, idle: bool) -> Self {
        self.state.lock().network_idle = idle;
        self
    }

    pub fn with_hidden_waits(self, pass: bool) -> Self {
        self.state.lock().hidden_waits_pass = pass;
        self
    }

    pub fn with_functions(self, pass: bool) -> Self {
        self.state.lock().functions_pass = pass;
        self
    }

    /// Run `hook` after a successful anchor click.
    pub fn on_anchor_click(self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.state.lock().anchor_hook = Some(Arc::new(hook));
        self
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.state.lock().url = url.into();
    }

    pub fn set_count(&self, selector: &Selector, count: usize) {
        let mut state = self.state.lock();
        state.excluded.remove(&selector.to_string());
        state.counts.insert(selector.to_string(), count);
    }

    /// Close the page as if the user closed the tab. Later operations fail
    /// with [`BrowserError::PageClosed`].
    pub fn close_by_user(&self) {
        self.mark_closed();
    }

    pub fn actions(&self) -> Vec<PageAction> {
        self.state.lock().actions.clone()
    }

    /// Interactions other than selector probes.
    pub fn interactions(&self) -> Vec<PageAction> {
        self.actions()
            .into_iter()
            .filter(|a| !matches!(a, PageAction::Probe(_)))
            .collect()
    }

    pub fn probes(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                PageAction::Probe(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn attach(&self, events: broadcast::Sender<BrowserEvent>, connected: Arc<AtomicBool>) {
        *self.events.lock() = Some(events);
        *self.browser_connected.lock() = Some(connected);
    }

    fn record(&self, action: PageAction) {
        self.state.lock().actions.push(action);
    }

    fn mark_closed(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Some(events) = self.events.lock().as_ref() {
                let _ = events.send(BrowserEvent::PageClosed {
                    page_id: self.id.clone(),
                });
            }
        }
    }

    fn ensure_open(&self) -> Result<(), BrowserError> {
        let connected = self
            .browser_connected
            .lock()
            .as_ref()
            .is_none_or(|flag| flag.load(Ordering::SeqCst));
        if !connected {
            return Err(BrowserError::Disconnected);
        }
        if self.closed.load(Ordering::SeqCst) {
            Err(BrowserError::PageClosed)
        } else {
            Ok(())
        }
    }

    fn visible_count(&self, selector: &Selector) -> Result<usize, BrowserError> {
        self.ensure_open()?;
        let key = selector.to_string();
        let state = self.state.lock();
        if state.broken.contains(&key) {
            return Err(BrowserError::ActionFailed(format!("bad selector {}", key)));
        }
        if let Some(count) = state.counts.get(&key) {
            return Ok(*count);
        }
        if state.permissive && !state.excluded.contains(&key) {
            return Ok(PERMISSIVE_COUNT);
        }
        Ok(0)
    }

    fn handle(&self, selector: &Selector, n: usize) -> ElementHandle {
        ElementHandle {
            id: format!("{}:{}:{}", self.id, selector, n),
            selector: selector.clone(),
        }
    }
}

#[async_trait]
impl Page for FakePage {
    fn id(&self) -> &str {
        &self.id
    }

    fn context_id(&self) -> Option<&str> {
        self.context_id.as_deref()
    }

    async fn goto(&self, url: &str, state: LoadState, _timeout: Duration) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.record(PageAction::Goto {
            url: url.to_string(),
            state,
        });
        self.set_url(url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.ensure_open()?;
        Ok(self.state.lock().url.clone())
    }

    async fn wait_for_selector(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>, BrowserError> {
        self.record(PageAction::Probe(selector.to_string()));
        if self.visible_count(selector)? > 0 {
            return Ok(Some(self.handle(selector, 0)));
        }
        tokio::time::sleep(timeout).await;
        Ok(None)
    }

    async fn query_all(&self, selector: &Selector) -> Result<Vec<ElementHandle>, BrowserError> {
        let count = self.visible_count(selector)?;
        Ok((0..count).map(|n| self.handle(selector, n)).collect())
    }

    async fn click(&self, element: &ElementHandle, click_count: u32) -> Result<(), BrowserError> {
        self.ensure_open()?;
        let key = element.selector.to_string();
        self.record(PageAction::Click {
            selector: key.clone(),
            count: click_count,
        });
        let mut state = self.state.lock();
        if let Some(url) = state.redirects.get(&key).cloned() {
            state.url = url;
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.record(PageAction::Fill {
            selector: element.selector.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn press(&self, element: &ElementHandle, key: &str) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.record(PageAction::Press {
            selector: element.selector.to_string(),
            key: key.to_string(),
        });
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        self.ensure_open()?;
        self.record(PageAction::Evaluate(expression.to_string()));
        Ok(Value::Null)
    }

    async fn click_anchor(&self, href: &str) -> Result<bool, BrowserError> {
        self.ensure_open()?;
        self.record(PageAction::ClickAnchor(href.to_string()));
        let (found, hook) = {
            let state = self.state.lock();
            (state.anchors.contains(href), state.anchor_hook.clone())
        };
        if found {
            if let Some(hook) = hook {
                hook(href);
            }
        }
        Ok(found)
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<bool, BrowserError> {
        self.ensure_open()?;
        self.record(PageAction::WaitNetworkIdle);
        let idle = self.state.lock().network_idle;
        if !idle {
            tokio::time::sleep(timeout).await;
        }
        Ok(idle)
    }

    async fn wait_for_hidden(&self, selector: &Selector, timeout: Duration) -> Result<bool, BrowserError> {
        self.ensure_open()?;
        self.record(PageAction::WaitHidden(selector.to_string()));
        let pass = self.state.lock().hidden_waits_pass;
        if !pass {
            tokio::time::sleep(timeout).await;
        }
        Ok(pass)
    }

    async fn wait_for_function(&self, expression: &str, timeout: Duration) -> Result<bool, BrowserError> {
        self.ensure_open()?;
        self.record(PageAction::WaitFunction(expression.to_string()));
        let pass = self.state.lock().functions_pass;
        if !pass {
            tokio::time::sleep(timeout).await;
        }
        Ok(pass)
    }

    async fn is_text_visible(&self, text: &str) -> Result<bool, BrowserError> {
        self.ensure_open()?;
        Ok(self.state.lock().texts.contains(text))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if !self.is_closed() {
            self.record(PageAction::Close);
        }
        self.mark_closed();
        Ok(())
    }
}

/// Scriptable browser. New pages are permissive.
pub struct FakeBrowser {
    pages: Mutex<Vec<Arc<FakePage>>>,
    next_page: AtomicUsize,
    contexts: AtomicUsize,
    cookies: Mutex<HashMap<Option<String>, Vec<Cookie>>>,
    events: broadcast::Sender<BrowserEvent>,
    connected: Arc<AtomicBool>,
    close_calls: AtomicUsize,
    fail_close: AtomicBool,
}

impl Default for FakeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBrowser {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            pages: Mutex::new(Vec::new()),
            next_page: AtomicUsize::new(1),
            contexts: AtomicUsize::new(0),
            cookies: Mutex::new(HashMap::new()),
            events,
            connected: Arc::new(AtomicBool::new(true)),
            close_calls: AtomicUsize::new(0),
            fail_close: AtomicBool::new(false),
        }
    }

    /// Register an already-open page.
    pub fn add_page(&self, page: FakePage) -> Arc<FakePage> {
        page.attach(self.events.clone(), self.connected.clone());
        let page = Arc::new(page);
        self.pages.lock().push(page.clone());
        page
    }

    pub fn fake_pages(&self) -> Vec<Arc<FakePage>> {
        self.pages.lock().clone()
    }

    pub fn page(&self, id: &str) -> Option<Arc<FakePage>> {
        self.pages.lock().iter().find(|p| p.id == id).cloned()
    }

    pub fn with_cookies(self, context: Option<&str>, cookies: Vec<Cookie>) -> Self {
        self.cookies
            .lock()
            .insert(context.map(|c| c.to_string()), cookies);
        self
    }

    pub fn cookies_in(&self, context: Option<&str>) -> Vec<Cookie> {
        self.cookies
            .lock()
            .get(&context.map(|c| c.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn contexts_created(&self) -> usize {
        self.contexts.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Drop the connection and announce it. Operations on every page fail
    /// with [`BrowserError::Disconnected`] from then on.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events.send(BrowserEvent::Disconnected);
    }

    /// Drop the connection without an event, so only polling notices.
    pub fn disconnect_silently(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn emit(&self, event: BrowserEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_context(&self) -> Result<String, BrowserError> {
        let n = self.contexts.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("context-{}", n))
    }

    async fn new_page(&self, context: Option<&str>) -> Result<Arc<dyn Page>, BrowserError> {
        if !self.is_connected() {
            return Err(BrowserError::Disconnected);
        }
        let n = self.next_page.fetch_add(1, Ordering::SeqCst);
        let mut page = FakePage::permissive(format!("page-{}", n));
        if let Some(context) = context {
            page = page.in_context(context);
        }
        let page: Arc<dyn Page> = self.add_page(page);
        Ok(page)
    }

    async fn pages(&self, context: Option<&str>) -> Result<Vec<Arc<dyn Page>>, BrowserError> {
        Ok(self
            .pages
            .lock()
            .iter()
            .filter(|p| !p.is_closed())
            .filter(|p| context.is_none() || p.context_id() == context)
            .map(|p| {
                let page: Arc<dyn Page> = p.clone();
                page
            })
            .collect())
    }

    async fn cookies(&self, context: Option<&str>) -> Result<Vec<Cookie>, BrowserError> {
        Ok(self.cookies_in(context))
    }

    async fn set_cookies(&self, context: Option<&str>, cookies: &[Cookie]) -> Result<(), BrowserError> {
        self.cookies
            .lock()
            .entry(context.map(|c| c.to_string()))
            .or_default()
            .extend(cookies.iter().cloned());
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<BrowserEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(BrowserError::ActionFailed("close refused".to_string()));
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out the same [`FakeBrowser`] on every launch.
pub struct FakeLauncher {
    browser: Arc<FakeBrowser>,
    launches: AtomicUsize,
    fail: AtomicBool,
    startup: Duration,
}

impl FakeLauncher {
    pub fn new(browser: Arc<FakeBrowser>) -> Self {
        Self {
            browser,
            launches: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            startup: Duration::ZERO,
        }
    }

    pub fn failing(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    /// Take `startup` to hand out the browser, like a slow Chrome start.
    pub fn with_startup(mut self, startup: Duration) -> Self {
        self.startup = startup;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowserError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if !self.startup.is_zero() {
            tokio::time::sleep(self.startup).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(BrowserError::ChromeNotFound);
        }
        let browser: Arc<dyn Browser> = self.browser.clone();
        Ok(browser)
    }
}
