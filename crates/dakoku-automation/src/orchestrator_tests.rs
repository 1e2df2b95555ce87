use std::sync::Arc;

use super::*;
use crate::jobcan::{JobcanDriver, ATTENDANCE_LINK};
use crate::request::{field, Action, CredentialBundle, Site};
use crate::schedule::AttendanceSchedule;
use dakoku_browser::testing::{FakeBrowser, FakeLauncher, FakePage, PageAction};
use dakoku_browser::SessionState;

fn jobcan() -> JobcanDriver {
    let credentials = CredentialBundle::new(Site::Jobcan, "https://id.jobcan.jp/users/sign_in")
        .with_field(field::EMAIL, Some("user@example.com"))
        .with_field(field::PASSWORD, Some("hunter2"));
    let schedule = AttendanceSchedule::parse("09:00", "18:00").unwrap();
    JobcanDriver::new(&credentials, schedule, "打刻").unwrap()
}

async fn session_on(page: FakePage) -> (Arc<FakeBrowser>, SessionManager, Arc<FakePage>) {
    let browser = Arc::new(FakeBrowser::new());
    let page = browser.add_page(page);
    let session = SessionManager::new(Arc::new(FakeLauncher::new(browser.clone())));
    session.launch().await.unwrap();
    (browser, session, page)
}

fn portal() -> FakePage {
    FakePage::permissive("portal").with_anchor(ATTENDANCE_LINK)
}

fn time_fill(value: &str) -> PageAction {
    PageAction::Fill {
        selector: "#ter_time".to_string(),
        value: value.to_string(),
    }
}

fn punch_click() -> PageAction {
    PageAction::Click {
        selector: "#insert_button".to_string(),
        count: 1,
    }
}

fn position(actions: &[PageAction], wanted: &PageAction) -> usize {
    actions.iter().position(|a| a == wanted).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_check_both_submits_start_before_end() {
    let (_browser, session, page) = session_on(portal()).await;
    let request = RunRequest::new(Site::Jobcan, Action::CheckBoth, false);

    let report = Orchestrator::new(&session).execute(&request, &jobcan()).await.unwrap();

    assert_eq!(
        report.outcomes,
        vec![
            (PunchKind::Start, SubmitOutcome::Confirmed),
            (PunchKind::End, SubmitOutcome::Confirmed),
        ]
    );

    let actions = page.interactions();
    let start_fill = position(&actions, &time_fill("0900"));
    let first_submit = position(&actions, &punch_click());
    let end_fill = position(&actions, &time_fill("1800"));
    assert!(start_fill < first_submit);
    assert!(first_submit < end_fill);
    assert_eq!(actions.iter().filter(|a| **a == punch_click()).count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_check_out_only_punches_end() {
    let (_browser, session, page) = session_on(portal()).await;
    let request = RunRequest::new(Site::Jobcan, Action::CheckOut, false);

    let report = Orchestrator::new(&session).execute(&request, &jobcan()).await.unwrap();

    assert_eq!(report.outcomes, vec![(PunchKind::End, SubmitOutcome::Confirmed)]);
    let actions = page.interactions();
    assert!(actions.contains(&time_fill("1800")));
    assert!(!actions.contains(&time_fill("0900")));
    assert_eq!(report.message, "Jobcanの退勤打刻が完了しました");
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_reports_test_mode() {
    let (_browser, session, page) = session_on(portal()).await;
    let request = RunRequest::new(Site::Jobcan, Action::CheckBoth, true);

    let report = Orchestrator::new(&session).execute(&request, &jobcan()).await.unwrap();

    assert!(report.message.contains("テストモード"));
    assert!(report
        .outcomes
        .iter()
        .all(|(_, outcome)| *outcome == SubmitOutcome::Skipped));
    assert!(!page.interactions().contains(&punch_click()));
    assert_eq!(session.state(), SessionState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_punch_is_named() {
    let (_browser, session, _page) = session_on(portal().with_functions(false)).await;
    let request = RunRequest::new(Site::Jobcan, Action::CheckIn, false);

    let report = Orchestrator::new(&session).execute(&request, &jobcan()).await.unwrap();

    assert_eq!(report.outcomes, vec![(PunchKind::Start, SubmitOutcome::Unconfirmed)]);
    assert!(report.message.contains("出勤は完了を確認できませんでした"));
}

#[tokio::test(start_paused = true)]
async fn test_failure_tears_session_down() {
    let (browser, session, _page) = session_on(FakePage::new("portal")).await;
    let request = RunRequest::new(Site::Jobcan, Action::CheckIn, false);

    let err = Orchestrator::new(&session)
        .execute(&request, &jobcan())
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::ElementNotFound { ref element } if element == "email field"));
    assert!(session.is_closing());
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(browser.close_calls(), 1);
    assert_eq!(
        session.teardown_reason(),
        Some(TeardownReason::Error(err.to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_page_closed_mid_step_tears_down_as_close() {
    let browser = Arc::new(FakeBrowser::new());
    let closer = browser.clone();
    browser.add_page(portal().on_anchor_click(move |_| {
        if let Some(page) = closer.page("portal") {
            page.close_by_user();
        }
    }));
    let session = SessionManager::new(Arc::new(FakeLauncher::new(browser.clone())));
    session.launch().await.unwrap();
    let request = RunRequest::new(Site::Jobcan, Action::CheckIn, false);

    let err = Orchestrator::new(&session)
        .execute(&request, &jobcan())
        .await
        .unwrap_err();

    assert_eq!(err.lost_browser(), Some(TeardownReason::PageClosed));
    assert_eq!(session.teardown_reason(), Some(TeardownReason::PageClosed));
    assert_eq!(session.state(), SessionState::Closed);
}
