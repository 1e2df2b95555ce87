use super::*;
use crate::error::BrowserError;
use crate::testing::{FakeBrowser, FakeLauncher, FakePage};
use dakoku_daemon::SignalHandler;

fn setup() -> (Arc<FakeBrowser>, Arc<FakeLauncher>, Arc<SessionManager>) {
    let browser = Arc::new(FakeBrowser::new());
    let launcher = Arc::new(FakeLauncher::new(browser.clone()));
    let manager = Arc::new(SessionManager::new(launcher.clone()));
    (browser, launcher, manager)
}

#[tokio::test]
async fn test_launch_opens_page() {
    let (browser, launcher, manager) = setup();
    assert_eq!(manager.state(), SessionState::Unstarted);

    let page = manager.launch().await.unwrap();

    assert_eq!(manager.state(), SessionState::Active);
    assert_eq!(page.id(), "page-1");
    assert_eq!(manager.current_page().unwrap().id(), "page-1");
    assert_eq!(launcher.launches(), 1);
    assert_eq!(browser.fake_pages().len(), 1);
}

#[tokio::test]
async fn test_launch_reuses_initial_page() {
    let (browser, _launcher, manager) = setup();
    browser.add_page(FakePage::permissive("initial"));

    let page = manager.launch().await.unwrap();

    assert_eq!(page.id(), "initial");
    assert_eq!(browser.fake_pages().len(), 1);
}

#[tokio::test]
async fn test_launch_twice_fails() {
    let (_browser, launcher, manager) = setup();
    manager.launch().await.unwrap();

    let err = manager.launch().await.err().unwrap();

    assert!(matches!(err, SessionError::AlreadyLaunched));
    assert_eq!(launcher.launches(), 1);
    assert_eq!(manager.state(), SessionState::Active);
}

#[tokio::test]
async fn test_launch_failure_reverts_state() {
    let browser = Arc::new(FakeBrowser::new());
    let launcher = Arc::new(FakeLauncher::new(browser).failing());
    let manager = SessionManager::new(launcher);

    let err = manager.launch().await.err().unwrap();

    assert!(matches!(err, SessionError::Browser(BrowserError::ChromeNotFound)));
    assert_eq!(manager.state(), SessionState::Unstarted);
}

#[tokio::test]
async fn test_relaunch_after_cleanup() {
    let (_browser, launcher, manager) = setup();
    manager.launch().await.unwrap();
    manager.cleanup().await;

    manager.launch().await.unwrap();

    assert_eq!(manager.state(), SessionState::Active);
    assert_eq!(launcher.launches(), 2);
}

#[tokio::test]
async fn test_current_page_before_launch() {
    let (_browser, _launcher, manager) = setup();
    assert!(matches!(manager.current_page(), Err(SessionError::NotInitialized)));
    assert!(matches!(manager.browser(), Err(SessionError::NotInitialized)));
}

#[tokio::test]
async fn test_adopt_page_switches_current() {
    let (browser, _launcher, manager) = setup();
    manager.launch().await.unwrap();
    let second = browser.new_page(None).await.unwrap();

    let previous = manager.adopt_page(second).unwrap();

    assert_eq!(previous.id(), "page-1");
    assert_eq!(manager.current_page().unwrap().id(), "page-2");
}

#[tokio::test]
async fn test_adopt_page_requires_active() {
    let (_browser, _launcher, manager) = setup();
    let page: Arc<dyn Page> = Arc::new(FakePage::new("stray"));
    assert!(matches!(manager.adopt_page(page), Err(SessionError::NotInitialized)));
}

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let (browser, _launcher, manager) = setup();
    manager.launch().await.unwrap();

    manager.cleanup().await;
    assert_eq!(manager.state(), SessionState::Closed);

    manager.cleanup().await;
    assert_eq!(manager.state(), SessionState::Closed);
    assert_eq!(browser.close_calls(), 1);
    assert!(matches!(manager.current_page(), Err(SessionError::NotInitialized)));
}

#[tokio::test]
async fn test_cleanup_without_launch() {
    let (browser, _launcher, manager) = setup();
    manager.cleanup().await;
    assert_eq!(manager.state(), SessionState::Closed);
    assert_eq!(browser.close_calls(), 0);
}

#[tokio::test]
async fn test_cleanup_swallows_close_error() {
    let (browser, _launcher, manager) = setup();
    manager.launch().await.unwrap();
    browser.fail_close(true);

    manager.cleanup().await;

    assert_eq!(manager.state(), SessionState::Closed);
    assert_eq!(browser.close_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_teardowns_run_once() {
    let (browser, _launcher, manager) = setup();
    manager.launch().await.unwrap();

    let reasons = [
        TeardownReason::BrowserDisconnected,
        TeardownReason::PageClosed,
        TeardownReason::Timeout,
    ];
    let handles: Vec<_> = reasons
        .into_iter()
        .map(|reason| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.teardown(&reason).await })
        })
        .collect();

    let mut ran = 0;
    for handle in handles {
        if handle.await.unwrap() {
            ran += 1;
        }
    }

    assert_eq!(ran, 1);
    assert_eq!(browser.close_calls(), 1);
    assert!(manager.is_closing());
    assert_eq!(manager.state(), SessionState::Closed);
}

#[test]
fn test_teardown_reason_exit_codes() {
    assert_eq!(TeardownReason::BrowserDisconnected.exit_code(), 0);
    assert_eq!(TeardownReason::PageClosed.exit_code(), 0);
    assert_eq!(TeardownReason::Signal(StopSignal::Terminate).exit_code(), 0);
    assert_eq!(TeardownReason::Timeout.exit_code(), 0);
    assert_eq!(TeardownReason::Completed.exit_code(), 0);
    assert_eq!(TeardownReason::Error("boom".to_string()).exit_code(), 1);

    assert!(TeardownReason::Timeout.is_user_initiated());
    assert!(!TeardownReason::Completed.is_user_initiated());
}

#[test]
fn test_state_from_u8() {
    assert_eq!(SessionState::from(0), SessionState::Unstarted);
    assert_eq!(SessionState::from(2), SessionState::Active);
    assert_eq!(SessionState::from(4), SessionState::Closed);
}

fn spawn_watch(
    manager: &Arc<SessionManager>,
    signals: &SignalHandler,
    config: LivenessConfig,
) -> tokio::task::JoinHandle<Result<TeardownReason, SessionError>> {
    let manager = manager.clone();
    let mut rx = signals.subscribe();
    tokio::spawn(async move { manager.watch(&mut rx, config).await })
}

#[tokio::test(start_paused = true)]
async fn test_watch_detects_current_page_close() {
    let (browser, _launcher, manager) = setup();
    manager.launch().await.unwrap();
    let signals = SignalHandler::new();

    let watch = spawn_watch(&manager, &signals, LivenessConfig::default());
    tokio::task::yield_now().await;
    browser.page("page-1").unwrap().close_by_user();

    assert_eq!(watch.await.unwrap().unwrap(), TeardownReason::PageClosed);
}

#[tokio::test(start_paused = true)]
async fn test_watch_ignores_other_page_close() {
    let (browser, _launcher, manager) = setup();
    manager.launch().await.unwrap();
    let other = browser.add_page(FakePage::permissive("other"));
    let signals = SignalHandler::new();
    let config = LivenessConfig {
        poll_interval: Duration::from_secs(10),
        max_lifetime: Duration::from_secs(60),
    };

    let started = Instant::now();
    let watch = spawn_watch(&manager, &signals, config);
    tokio::task::yield_now().await;
    other.close_by_user();

    assert_eq!(watch.await.unwrap().unwrap(), TeardownReason::Timeout);
    assert!(started.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_watch_detects_disconnect_event() {
    let (browser, _launcher, manager) = setup();
    manager.launch().await.unwrap();
    let signals = SignalHandler::new();

    let watch = spawn_watch(&manager, &signals, LivenessConfig::default());
    tokio::task::yield_now().await;
    browser.disconnect();

    assert_eq!(
        watch.await.unwrap().unwrap(),
        TeardownReason::BrowserDisconnected
    );
}

#[tokio::test(start_paused = true)]
async fn test_watch_poll_detects_silent_disconnect() {
    let (browser, _launcher, manager) = setup();
    manager.launch().await.unwrap();
    let signals = SignalHandler::new();
    browser.disconnect_silently();

    let started = Instant::now();
    let reason = manager
        .watch(&mut signals.subscribe(), LivenessConfig::default())
        .await
        .unwrap();

    assert_eq!(reason, TeardownReason::BrowserDisconnected);
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(started.elapsed() < Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn test_watch_returns_signal() {
    let (_browser, _launcher, manager) = setup();
    manager.launch().await.unwrap();
    let signals = SignalHandler::new();

    let watch = spawn_watch(&manager, &signals, LivenessConfig::default());
    tokio::task::yield_now().await;
    signals.stop(StopSignal::Terminate);

    assert_eq!(
        watch.await.unwrap().unwrap(),
        TeardownReason::Signal(StopSignal::Terminate)
    );
}

#[tokio::test(start_paused = true)]
async fn test_watch_times_out() {
    let (_browser, _launcher, manager) = setup();
    manager.launch().await.unwrap();
    let signals = SignalHandler::new();
    let config = LivenessConfig {
        poll_interval: Duration::from_secs(10),
        max_lifetime: Duration::from_secs(30),
    };

    let reason = manager.watch(&mut signals.subscribe(), config).await.unwrap();
    assert_eq!(reason, TeardownReason::Timeout);
}

#[tokio::test]
async fn test_watch_requires_active_session() {
    let (_browser, _launcher, manager) = setup();
    let signals = SignalHandler::new();

    let err = manager
        .watch(&mut signals.subscribe(), LivenessConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotInitialized));
}

#[tokio::test(start_paused = true)]
async fn test_watch_sees_signal_queued_before_it_started() {
    let (_browser, _launcher, manager) = setup();
    let signals = SignalHandler::new();
    let mut rx = signals.subscribe();
    signals.stop(StopSignal::Interrupt);

    manager.launch().await.unwrap();
    let reason = manager.watch(&mut rx, LivenessConfig::default()).await.unwrap();

    assert_eq!(reason, TeardownReason::Signal(StopSignal::Interrupt));
}

#[tokio::test]
async fn test_lost_reports_closed_page_and_disconnect() {
    let (browser, _launcher, manager) = setup();
    assert_eq!(manager.lost(), None);
    manager.launch().await.unwrap();
    assert_eq!(manager.lost(), None);

    browser.page("page-1").unwrap().close_by_user();
    assert_eq!(manager.lost(), Some(TeardownReason::PageClosed));

    browser.disconnect();
    assert_eq!(manager.lost(), Some(TeardownReason::BrowserDisconnected));
}

#[tokio::test]
async fn test_teardown_keeps_first_reason() {
    let (_browser, _launcher, manager) = setup();
    manager.launch().await.unwrap();
    assert_eq!(manager.teardown_reason(), None);

    manager.teardown(&TeardownReason::PageClosed).await;
    manager.teardown(&TeardownReason::Error("late".to_string())).await;

    assert_eq!(manager.teardown_reason(), Some(TeardownReason::PageClosed));
}
