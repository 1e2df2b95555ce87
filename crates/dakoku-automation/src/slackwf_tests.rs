use std::sync::Arc;

use super::*;
use crate::step::{StepRunner, SubmitOutcome};
use dakoku_browser::testing::{FakeBrowser, FakeLauncher, FakePage, PageAction};
use dakoku_browser::{Page, SessionManager};

const SIGN_IN: &str = "https://slack.com/intl/ja-jp/workspace-signin";
const CHANNEL: &str = "https://app.slack.com/client/T0001/C0001";
const TEXT_INPUT: &str = "input[placeholder=\"内容を入力する\"][type=\"text\"]";
const SUBMIT: &str = "button[data-qa=\"wizard_modal_next\"]";

fn credentials() -> CredentialBundle {
    CredentialBundle::new(Site::SlackWf, SIGN_IN)
        .with_field(field::WORKSPACE, Some("acme"))
        .with_field(field::GOOGLE_EMAIL, Some("user@acme.example"))
        .with_field(field::GOOGLE_PASSWORD, Some("hunter2"))
        .with_channel_url(Some(CHANNEL.to_string()))
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 3).unwrap()
}

fn driver_with(bundle: &CredentialBundle, note: &str) -> SlackWfDriver {
    let schedule = AttendanceSchedule::parse("09:00", "18:00").unwrap();
    SlackWfDriver::new(bundle, schedule, date(), note, TransplantStrategy::NewContext).unwrap()
}

fn driver() -> SlackWfDriver {
    driver_with(&credentials(), "")
}

/// Sign-in page whose Google button leads to Google.
fn sign_in_page() -> FakePage {
    FakePage::permissive("sign-in").with_redirect(
        &Selector::has_text("button", "Google"),
        "https://accounts.google.com/v3/signin/identifier",
    )
}

async fn session_on(page: FakePage) -> (Arc<FakeBrowser>, SessionManager, Arc<FakePage>) {
    let browser = Arc::new(FakeBrowser::new());
    let page = browser.add_page(page);
    let session = SessionManager::new(Arc::new(FakeLauncher::new(browser.clone())));
    session.launch().await.unwrap();
    (browser, session, page)
}

fn fill_values(steps: &[Step]) -> Vec<String> {
    steps
        .iter()
        .filter_map(|step| match step {
            Step::Fill { value, .. } | Step::SelectOption { value, .. } => Some(value.expose().to_string()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_missing_google_credentials_fail_fast() {
    let bundle = CredentialBundle::new(Site::SlackWf, SIGN_IN).with_field(field::WORKSPACE, Some("acme"));
    let schedule = AttendanceSchedule::parse("09:00", "18:00").unwrap();

    let err = SlackWfDriver::new(&bundle, schedule, date(), "", TransplantStrategy::NewContext)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        AutomationError::MissingCredentials { site: Site::SlackWf, ref missing }
            if missing == &["google_email", "google_password"]
    ));
}

#[test]
fn test_punch_values_use_chat_encoding() {
    let driver = driver();

    assert_eq!(
        fill_values(&driver.punch(PunchKind::Start)),
        vec!["出勤", "2025/05/03", "9:00"]
    );
    assert_eq!(
        fill_values(&driver.punch(PunchKind::End)),
        vec!["退勤", "2025/05/03", "18:00"]
    );
}

#[test]
fn test_note_only_when_configured() {
    let has_note = |driver: &SlackWfDriver| {
        driver
            .punch(PunchKind::Start)
            .iter()
            .any(|step| matches!(step, Step::Optional(_)))
    };

    assert!(!has_note(&driver()));
    assert!(!has_note(&driver_with(&credentials(), "   ")));
    assert!(has_note(&driver_with(&credentials(), "在宅")));
}

#[test]
fn test_channel_falls_back_to_app_root() {
    let bundle = CredentialBundle::new(Site::SlackWf, SIGN_IN)
        .with_field(field::WORKSPACE, Some("acme"))
        .with_field(field::GOOGLE_EMAIL, Some("user@acme.example"))
        .with_field(field::GOOGLE_PASSWORD, Some("hunter2"));

    let transplant_url = driver_with(&bundle, "").prepare().into_iter().find_map(|step| match step {
        Step::TransplantSession { url, .. } => Some(url),
        _ => None,
    });
    assert_eq!(transplant_url.as_deref(), Some(DEFAULT_CHANNEL_URL));
}

#[tokio::test(start_paused = true)]
async fn test_full_dry_run_moves_to_channel_and_skips_submit() {
    let (browser, session, sign_in) = session_on(sign_in_page()).await;
    let driver = driver();
    let runner = StepRunner::new(&session, true);

    runner.run(&driver.prepare()).await.unwrap();
    let outcomes = runner.run(&driver.punch(PunchKind::Start)).await.unwrap();

    assert_eq!(outcomes, vec![SubmitOutcome::Skipped]);

    let sign_in_actions = sign_in.interactions();
    assert!(sign_in_actions.contains(&PageAction::Fill {
        selector: "input[type=\"email\"]".to_string(),
        value: "user@acme.example".to_string(),
    }));
    assert!(sign_in.is_closed());

    let channel = browser.page("page-1").unwrap();
    assert_eq!(channel.context_id(), Some("context-1"));
    let actions = channel.interactions();
    assert_eq!(
        actions.first(),
        Some(&PageAction::Goto {
            url: CHANNEL.to_string(),
            state: LoadState::DomContentLoaded,
        })
    );
    assert!(actions.contains(&PageAction::Fill {
        selector: TEXT_INPUT.to_string(),
        value: "2025/05/03".to_string(),
    }));
    assert!(actions.contains(&PageAction::Fill {
        selector: TEXT_INPUT.to_string(),
        value: "9:00".to_string(),
    }));
    assert!(!actions.iter().any(|a| matches!(a, PageAction::Click { selector, .. } if selector == SUBMIT)));
}

#[tokio::test(start_paused = true)]
async fn test_existing_session_skips_google() {
    let (_browser, session, sign_in) = session_on(FakePage::permissive("sign-in")).await;
    let runner = StepRunner::new(&session, true);

    runner.run(&driver().prepare()).await.unwrap();

    let filled: Vec<String> = sign_in
        .interactions()
        .into_iter()
        .filter_map(|a| match a {
            PageAction::Fill { value, .. } => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(filled, vec!["acme"]);
}

#[tokio::test(start_paused = true)]
async fn test_google_error_fails_authentication() {
    let (_browser, session, _page) = session_on(sign_in_page().with_text("問題が発生しました")).await;
    let runner = StepRunner::new(&session, true);

    let err = runner.run(&driver().prepare()).await.unwrap_err();
    assert!(matches!(err, AutomationError::AuthenticationFailed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_live_punch_submits_and_confirms() {
    let (browser, session, _page) = session_on(sign_in_page()).await;
    let driver = driver();
    let runner = StepRunner::new(&session, false);

    runner.run(&driver.prepare()).await.unwrap();
    let outcomes = runner.run(&driver.punch(PunchKind::End)).await.unwrap();

    assert_eq!(outcomes, vec![SubmitOutcome::Confirmed]);
    let channel = browser.page("page-1").unwrap();
    assert!(channel.interactions().contains(&PageAction::Click {
        selector: SUBMIT.to_string(),
        count: 1,
    }));
}

async fn punch_interactions(dry_run: bool) -> (Vec<PageAction>, Vec<PageAction>) {
    let (browser, session, sign_in) = session_on(sign_in_page()).await;
    let driver = driver_with(&credentials(), "直行");
    let runner = StepRunner::new(&session, dry_run);

    runner.run(&driver.prepare()).await.unwrap();
    runner.run(&driver.punch(PunchKind::Start)).await.unwrap();
    let channel = browser.page("page-1").unwrap();
    (sign_in.interactions(), channel.interactions())
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_matches_live_run_up_to_submit() {
    let (live_sign_in, live) = punch_interactions(false).await;
    let (dry_sign_in, dry) = punch_interactions(true).await;

    assert_eq!(dry_sign_in, live_sign_in);
    let (before_submit, submit) = live.split_at(live.len() - 2);
    assert_eq!(
        submit.to_vec(),
        vec![
            PageAction::Click {
                selector: SUBMIT.to_string(),
                count: 1,
            },
            PageAction::WaitHidden(Selector::css(r#"[data-qa="wizard_modal"]"#).to_string()),
        ]
    );
    assert_eq!(dry, before_submit.to_vec());
}
