//! Browser session lifecycle.
//!
//! One [`SessionManager`] owns the browser for a run: launch, the current
//! page pointer, liveness watching and a single teardown path that every
//! trigger (disconnect, tab close, signal, timeout) funnels into.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dakoku_daemon::StopSignal;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::page::{Browser, BrowserEvent, Launcher, Page};

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// No browser yet.
    Unstarted = 0,
    /// Browser process is up, no page yet.
    Launched = 1,
    /// Browser and current page ready.
    Active = 2,
    /// Cleanup in progress.
    Closing = 3,
    /// Browser closed.
    Closed = 4,
}

impl From<u8> for SessionState {
    fn from(v: u8) -> Self {
        match v {
            0 => SessionState::Unstarted,
            1 => SessionState::Launched,
            2 => SessionState::Active,
            3 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Liveness watch settings.
#[derive(Debug, Clone, Copy)]
pub struct LivenessConfig {
    /// How often to poll the connection and page as a backstop for missed events.
    pub poll_interval: Duration,
    /// Hard ceiling on how long the session may live.
    pub max_lifetime: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_lifetime: Duration::from_secs(15 * 60),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownReason {
    BrowserDisconnected,
    PageClosed,
    Signal(StopSignal),
    Timeout,
    Completed,
    Error(String),
}

impl TeardownReason {
    /// Process exit code for this reason. Only errors are non-zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            TeardownReason::Error(_) => 1,
            _ => 0,
        }
    }

    /// Whether the session ended from outside the automation rather than by
    /// finishing or failing.
    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            TeardownReason::BrowserDisconnected
                | TeardownReason::PageClosed
                | TeardownReason::Signal(_)
                | TeardownReason::Timeout
        )
    }
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownReason::BrowserDisconnected => write!(f, "browser disconnected"),
            TeardownReason::PageClosed => write!(f, "page closed"),
            TeardownReason::Signal(signal) => write!(f, "received {}", signal),
            TeardownReason::Timeout => write!(f, "session lifetime exceeded"),
            TeardownReason::Completed => write!(f, "completed"),
            TeardownReason::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// Owns the browser and the current page for one run.
pub struct SessionManager {
    launcher: Arc<dyn Launcher>,
    state: AtomicU8,
    browser: Mutex<Option<Arc<dyn Browser>>>,
    page: Mutex<Option<Arc<dyn Page>>>,
    closing: AtomicBool,
    reason: Mutex<Option<TeardownReason>>,
}

impl SessionManager {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self {
            launcher,
            state: AtomicU8::new(SessionState::Unstarted as u8),
            browser: Mutex::new(None),
            page: Mutex::new(None),
            closing: AtomicBool::new(false),
            reason: Mutex::new(None),
        }
    }

    /// Get current state.
    pub fn state(&self) -> SessionState {
        SessionState::from(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn claim_launch(&self) -> Result<SessionState, SessionError> {
        for from in [SessionState::Unstarted, SessionState::Closed] {
            if self
                .state
                .compare_exchange(
                    from as u8,
                    SessionState::Launched as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return Ok(from);
            }
        }

        match self.state() {
            SessionState::Launched | SessionState::Active => Err(SessionError::AlreadyLaunched),
            _ => Err(SessionError::Closed),
        }
    }

    /// Launch the browser and open the first page.
    ///
    /// Fails with [`SessionError::AlreadyLaunched`] while a session is live.
    /// A closed session may be launched again.
    pub async fn launch(&self) -> Result<Arc<dyn Page>, SessionError> {
        let previous = self.claim_launch()?;

        let browser = match self.launcher.launch().await {
            Ok(browser) => browser,
            Err(e) => {
                self.set_state(previous);
                return Err(e.into());
            }
        };

        let existing = match browser.pages(None).await {
            Ok(pages) => pages.into_iter().next(),
            Err(e) => {
                debug!("Could not list initial pages: {}", e);
                None
            }
        };
        let page = match existing {
            Some(page) => page,
            None => match browser.new_page(None).await {
                Ok(page) => page,
                Err(e) => {
                    if let Err(close_err) = browser.close().await {
                        warn!("Failed to close browser after launch error: {}", close_err);
                    }
                    self.set_state(previous);
                    return Err(e.into());
                }
            },
        };

        *self.browser.lock() = Some(browser);
        *self.page.lock() = Some(page.clone());
        self.reason.lock().take();
        self.closing.store(false, Ordering::SeqCst);
        self.set_state(SessionState::Active);

        info!("Browser session active on page {}", page.id());
        Ok(page)
    }

    /// The page the automation currently drives.
    pub fn current_page(&self) -> Result<Arc<dyn Page>, SessionError> {
        if self.state() != SessionState::Active {
            return Err(SessionError::NotInitialized);
        }
        self.page.lock().clone().ok_or(SessionError::NotInitialized)
    }

    pub fn browser(&self) -> Result<Arc<dyn Browser>, SessionError> {
        if self.state() != SessionState::Active {
            return Err(SessionError::NotInitialized);
        }
        self.browser.lock().clone().ok_or(SessionError::NotInitialized)
    }

    /// Make `page` the current page. Returns the page it replaced.
    pub fn adopt_page(&self, page: Arc<dyn Page>) -> Result<Arc<dyn Page>, SessionError> {
        if self.state() != SessionState::Active {
            return Err(SessionError::NotInitialized);
        }
        let mut current = self.page.lock();
        let previous = current.replace(page.clone()).ok_or(SessionError::NotInitialized)?;
        info!("Switched current page {} -> {}", previous.id(), page.id());
        Ok(previous)
    }

    /// Close the browser if open and end in [`SessionState::Closed`].
    ///
    /// Close errors are logged, not returned. Calling again is a no-op.
    pub async fn cleanup(&self) {
        loop {
            let current = self.state();
            if matches!(current, SessionState::Closing | SessionState::Closed) {
                debug!("Cleanup skipped, session already {:?}", current);
                return;
            }
            if self
                .state
                .compare_exchange(
                    current as u8,
                    SessionState::Closing as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                break;
            }
        }

        self.page.lock().take();
        let browser = self.browser.lock().take();
        if let Some(browser) = browser {
            if let Err(e) = browser.close().await {
                warn!("Error while closing browser: {}", e);
            }
        }

        self.set_state(SessionState::Closed);
        info!("Browser session closed");
    }

    /// Run cleanup once for the first caller. Returns whether this call did it.
    pub async fn teardown(&self, reason: &TeardownReason) -> bool {
        if self.closing.swap(true, Ordering::SeqCst) {
            debug!("Teardown already in progress, ignoring: {}", reason);
            return false;
        }

        info!("Tearing down browser session: {}", reason);
        *self.reason.lock() = Some(reason.clone());
        self.cleanup().await;
        true
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// The reason the winning [`SessionManager::teardown`] was given.
    pub fn teardown_reason(&self) -> Option<TeardownReason> {
        self.reason.lock().clone()
    }

    /// Whether the browser or the current page went away underneath the
    /// automation. `None` while both are alive or before launch.
    pub fn lost(&self) -> Option<TeardownReason> {
        let browser = self.browser.lock().clone()?;
        if !browser.is_connected() {
            return Some(TeardownReason::BrowserDisconnected);
        }
        let page = self.page.lock().clone()?;
        page.is_closed().then_some(TeardownReason::PageClosed)
    }

    /// Wait for the first reason to end the session.
    ///
    /// Sources: browser events, OS signals, a periodic liveness poll and the
    /// lifetime ceiling. Closing a page other than the current one is ignored.
    /// Signals queued on `signals` before the call are seen first.
    pub async fn watch(
        &self,
        signals: &mut broadcast::Receiver<StopSignal>,
        config: LivenessConfig,
    ) -> Result<TeardownReason, SessionError> {
        let browser = self.browser()?;
        let mut events = browser.events();

        let started = Instant::now();
        let deadline = tokio::time::sleep_until(started + config.max_lifetime);
        tokio::pin!(deadline);

        let mut poll = tokio::time::interval_at(started + config.poll_interval, config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut signals_open = true;

        loop {
            tokio::select! {
                biased;

                signal = signals.recv(), if signals_open => match signal {
                    Ok(signal) => return Ok(TeardownReason::Signal(signal)),
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => signals_open = false,
                },
                event = events.recv() => match event {
                    Ok(BrowserEvent::Disconnected) | Err(RecvError::Closed) => {
                        return Ok(TeardownReason::BrowserDisconnected);
                    }
                    Ok(BrowserEvent::PageClosed { page_id }) => {
                        if self.is_current_page(&page_id) {
                            return Ok(TeardownReason::PageClosed);
                        }
                        debug!("Ignoring close of non-current page {}", page_id);
                    }
                    Err(RecvError::Lagged(n)) => warn!("Missed {} browser events", n),
                },
                _ = poll.tick() => {
                    if let Some(reason) = self.lost() {
                        return Ok(reason);
                    }
                    if self.current_page().is_err() {
                        return Ok(TeardownReason::Completed);
                    }
                },
                _ = &mut deadline => {
                    warn!("Session exceeded {:?}", config.max_lifetime);
                    return Ok(TeardownReason::Timeout);
                }
            }
        }
    }

    fn is_current_page(&self, page_id: &str) -> bool {
        self.page
            .lock()
            .as_ref()
            .is_some_and(|page| page.id() == page_id)
    }
}
