//! Jobcan attendance correction flow.
//!
//! Login happens on the id.jobcan.jp portal. The attendance service lives on
//! ssl.jobcan.jp and is reached through the portal's OAuth link, after which
//! the correction form is opened directly by URL.

use std::time::Duration;

use dakoku_browser::{LoadState, SelectorList};

use crate::error::AutomationError;
use crate::request::{field, CredentialBundle, Secret, Site};
use crate::schedule::AttendanceSchedule;
use crate::step::{Confirmation, PunchKind, SiteDriver, Step, Target};

/// Portal link into the attendance service.
pub const ATTENDANCE_LINK: &str = "https://ssl.jobcan.jp/jbcoauth/login";

/// Attendance correction form.
pub const MODIFY_URL: &str = "https://ssl.jobcan.jp/employee/adit/modify/";

pub const REQUIRED_FIELDS: &[&str] = &[field::EMAIL, field::PASSWORD];

/// True once the "saving" label is gone or hidden again.
const SAVED_EXPRESSION: &str = "(() => { \
     const label = document.getElementById('insert_label'); \
     return !label || label.classList.contains('d-none'); \
     })()";

const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

fn email_field() -> SelectorList {
    SelectorList::new("email field")
        .css(r#"input[name="user[email]"]"#)
        .css(r#"input[type="email"]"#)
        .css(r#"input[name="email"]"#)
        .css(r#"input[placeholder*="メール"]"#)
        .css(r#"input[placeholder*="mail"]"#)
        .css("#email")
        .css("#user_email")
}

fn password_field() -> SelectorList {
    SelectorList::new("password field")
        .css(r#"input[type="password"]"#)
        .css(r#"input[name="password"]"#)
        .css(r#"input[name="user[password]"]"#)
        .css("#password")
        .css("#user_password")
}

fn login_button() -> SelectorList {
    SelectorList::new("login button")
        .css(r#"button[type="submit"]"#)
        .css(r#"input[type="submit"]"#)
        .has_text("button", "ログイン")
        .has_text("button", "サインイン")
        .css(r#"input[value*="ログイン"]"#)
        .css(r#"input[value*="サインイン"]"#)
        .css(".login-button")
        .css("#login-button")
}

fn notice_field() -> SelectorList {
    SelectorList::new("notice field").css(r#"textarea[name="notice"]"#)
}

fn time_field() -> SelectorList {
    SelectorList::new("time field").css("#ter_time")
}

fn punch_button() -> SelectorList {
    SelectorList::new("punch button").css("#insert_button")
}

pub struct JobcanDriver {
    sign_in_url: String,
    email: Secret,
    password: Secret,
    notice: String,
    schedule: AttendanceSchedule,
}

impl JobcanDriver {
    /// Fails with [`AutomationError::MissingCredentials`] before anything is launched.
    pub fn new(
        credentials: &CredentialBundle,
        schedule: AttendanceSchedule,
        notice: impl Into<String>,
    ) -> Result<Self, AutomationError> {
        credentials.require(REQUIRED_FIELDS)?;
        Ok(Self {
            sign_in_url: credentials.target_url.clone(),
            email: credentials.value(field::EMAIL)?,
            password: credentials.value(field::PASSWORD)?,
            notice: notice.into(),
            schedule,
        })
    }
}

impl SiteDriver for JobcanDriver {
    fn site(&self) -> Site {
        Site::Jobcan
    }

    fn required_fields(&self) -> &'static [&'static str] {
        REQUIRED_FIELDS
    }

    fn prepare(&self) -> Vec<Step> {
        vec![
            Step::Navigate {
                url: self.sign_in_url.clone(),
                state: LoadState::Load,
                timeout: PAGE_LOAD_TIMEOUT,
            },
            Step::Fill {
                target: Target::discover(email_field()),
                value: self.email.clone(),
            },
            Step::Fill {
                target: Target::discover(password_field()),
                value: self.password.clone(),
            },
            Step::Click {
                target: Target::discover(login_button()),
            },
            Step::WaitNetworkIdle {
                timeout: Duration::from_secs(10),
                required: false,
            },
            Step::Pause(Duration::from_secs(3)),
            Step::ClickLinkByScript {
                href: ATTENDANCE_LINK.to_string(),
                settle: Duration::from_secs(2),
                load_timeout: Duration::from_secs(15),
            },
            Step::Pause(Duration::from_secs(2)),
            Step::Navigate {
                url: MODIFY_URL.to_string(),
                state: LoadState::Load,
                timeout: PAGE_LOAD_TIMEOUT,
            },
            Step::WaitNetworkIdle {
                timeout: Duration::from_secs(15),
                required: false,
            },
        ]
    }

    fn punch(&self, kind: PunchKind) -> Vec<Step> {
        vec![
            Step::Fill {
                target: Target::required(notice_field()),
                value: Secret::new(self.notice.clone()),
            },
            Step::ClearAndFill {
                target: Target::required(time_field()),
                value: Secret::new(self.schedule.time_for(kind).jobcan()),
            },
            Step::Pause(Duration::from_secs(1)),
            Step::Submit {
                target: Target::required(punch_button()),
            },
            Step::ConfirmSubmission(Confirmation::Function {
                expression: SAVED_EXPRESSION.to_string(),
                settle: Duration::from_secs(1),
                timeout: Duration::from_secs(30),
            }),
        ]
    }

    fn between_punches(&self) -> Duration {
        Duration::from_secs(2)
    }
}

#[cfg(test)]
#[path = "jobcan_tests.rs"]
mod tests;
