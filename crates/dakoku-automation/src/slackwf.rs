//! Slack workflow ("勤怠ログ") submission flow.
//!
//! Sign-in goes through the workspace picker and Google SSO. The Google
//! sub-flow only runs when the browser actually lands on Google, so an
//! existing session in a configured profile skips it. After login the
//! session is transplanted onto a fresh page that opens the channel, and the
//! attendance workflow is filled and submitted from there.

use std::time::Duration;

use chrono::NaiveDate;
use dakoku_browser::{LoadState, Selector, SelectorList};

use crate::error::AutomationError;
use crate::request::{field, CredentialBundle, Secret, Site};
use crate::schedule::{workflow_date, AttendanceSchedule};
use crate::step::{Condition, Confirmation, PunchKind, SiteDriver, Step, Target, TransplantStrategy};

/// Where the session continues when no channel is configured.
pub const DEFAULT_CHANNEL_URL: &str = "https://app.slack.com/";

pub const REQUIRED_FIELDS: &[&str] = &[field::WORKSPACE, field::GOOGLE_EMAIL, field::GOOGLE_PASSWORD];

const GOOGLE_HOST: &str = "accounts.google.com";
const APP_HOST: &str = "app.slack.com";

const BACK_ON_SLACK: &str =
    "location.href.includes('slack.com') && !location.href.includes('accounts.google.com')";

const GOOGLE_ERRORS: [&str; 2] = ["問題が発生しました", "エラーが発生しました"];
const SUBMIT_ERRORS: [&str; 2] = ["エラー", "失敗"];

fn workspace_field() -> SelectorList {
    SelectorList::new("workspace field").css(r#"input[data-qa="signin_domain_input"]"#)
}

fn continue_button() -> SelectorList {
    SelectorList::new("continue button").css(r#"button[data-qa="submit_team_domain_button"]"#)
}

fn google_button() -> SelectorList {
    SelectorList::new("Google sign-in button").has_text("button", "Google")
}

fn google_email() -> SelectorList {
    SelectorList::new("Google email field").css(r#"input[type="email"]"#)
}

fn google_password() -> SelectorList {
    SelectorList::new("Google password field").css(r#"input[type="password"]"#)
}

fn google_consent() -> SelectorList {
    SelectorList::new("Google confirmation button")
        .has_text("button", "次へ")
        .has_text("button", "Continue")
}

fn workflow_launcher() -> SelectorList {
    SelectorList::new("attendance workflow button")
        .css(r#"button[aria-label="勤怠ログ"]"#)
        .css(r#"button[data-qa="composer-workflow-button"]"#)
        .has_text("button", "勤怠ログ")
        .css(".workflowBtn__qfczc")
        .has_text("button.c-button--primary", "勤怠ログ")
}

fn type_combobox() -> SelectorList {
    SelectorList::new("attendance type")
        .css(r#"input[role="combobox"][aria-label="オプションを選択する"]"#)
        .css("input.c-select_input")
        .css(r#"input[placeholder="オプションを選択する"]"#)
}

fn text_inputs(name: &str) -> SelectorList {
    SelectorList::new(name)
        .css(r#"input[placeholder="内容を入力する"][type="text"]"#)
        .css(".p-block_kit_plain_text_input_element")
}

fn note_editor() -> SelectorList {
    SelectorList::new("note editor")
        .css(r#".ql-editor[contenteditable="true"]"#)
        .css(r#"[data-qa="block_kit_rich_text_input_element--input"] .ql-editor"#)
}

fn submit_button() -> SelectorList {
    SelectorList::new("workflow submit button")
        .css(r#"button[data-qa="wizard_modal_next"]"#)
        .has_text("button", "送信する")
        .css(".c-wizard_modal__next")
}

pub struct SlackWfDriver {
    sign_in_url: String,
    channel_url: String,
    workspace: Secret,
    email: Secret,
    password: Secret,
    schedule: AttendanceSchedule,
    date: NaiveDate,
    note: String,
    strategy: TransplantStrategy,
}

impl SlackWfDriver {
    /// `date` is the day the workflow entry is for.
    pub fn new(
        credentials: &CredentialBundle,
        schedule: AttendanceSchedule,
        date: NaiveDate,
        note: impl Into<String>,
        strategy: TransplantStrategy,
    ) -> Result<Self, AutomationError> {
        credentials.require(REQUIRED_FIELDS)?;
        Ok(Self {
            sign_in_url: credentials.target_url.clone(),
            channel_url: credentials
                .channel_url
                .clone()
                .unwrap_or_else(|| DEFAULT_CHANNEL_URL.to_string()),
            workspace: credentials.value(field::WORKSPACE)?,
            email: credentials.value(field::GOOGLE_EMAIL)?,
            password: credentials.value(field::GOOGLE_PASSWORD)?,
            schedule,
            date,
            note: note.into(),
            strategy,
        })
    }

    fn google_sign_in(&self) -> Vec<Step> {
        vec![
            Step::Fill {
                target: Target::required(google_email()),
                value: self.email.clone(),
            },
            Step::Click {
                target: Target::required(SelectorList::new("Google next button").css("#identifierNext"))
                    .with_timeout(Duration::from_secs(5)),
            },
            Step::Pause(Duration::from_secs(3)),
            Step::Fill {
                target: Target::required(google_password()),
                value: self.password.clone(),
            },
            Step::Click {
                target: Target::required(SelectorList::new("Google password next button").css("#passwordNext")),
            },
            Step::Pause(Duration::from_secs(5)),
            Step::optional(Step::Click {
                target: Target::discover(google_consent()),
            }),
            Step::Pause(Duration::from_secs(3)),
            Step::FailIfTextVisible {
                texts: GOOGLE_ERRORS.iter().map(|t| t.to_string()).collect(),
                message: "Google sign-in reported an error".to_string(),
            },
        ]
    }
}

impl SiteDriver for SlackWfDriver {
    fn site(&self) -> Site {
        Site::SlackWf
    }

    fn required_fields(&self) -> &'static [&'static str] {
        REQUIRED_FIELDS
    }

    fn prepare(&self) -> Vec<Step> {
        vec![
            Step::Navigate {
                url: self.sign_in_url.clone(),
                state: LoadState::Load,
                timeout: Duration::from_secs(30),
            },
            Step::Fill {
                target: Target::required(workspace_field()),
                value: self.workspace.clone(),
            },
            Step::Click {
                target: Target::required(continue_button()),
            },
            Step::Click {
                target: Target::required(google_button()),
            },
            Step::Pause(Duration::from_secs(5)),
            Step::When {
                condition: Condition::UrlContains(GOOGLE_HOST.to_string()),
                steps: self.google_sign_in(),
            },
            Step::WaitUntil {
                description: "return to Slack".to_string(),
                expression: BACK_ON_SLACK.to_string(),
                timeout: Duration::from_secs(15),
            },
            Step::TransplantSession {
                url: self.channel_url.clone(),
                strategy: self.strategy,
                timeout: Duration::from_secs(45),
            },
            Step::Pause(Duration::from_secs(3)),
            Step::WaitForUrl {
                contains: APP_HOST.to_string(),
                timeout: Duration::from_secs(15),
                required: false,
            },
        ]
    }

    fn punch(&self, kind: PunchKind) -> Vec<Step> {
        let mut steps = vec![
            Step::Click {
                target: Target::discover(workflow_launcher()),
            },
            Step::Pause(Duration::from_secs(2)),
            Step::SelectOption {
                target: Target::required(type_combobox()),
                value: Secret::new(kind.label()),
                settle: Duration::from_millis(500),
            },
            Step::Fill {
                target: Target::required(text_inputs("date field")).nth(0),
                value: Secret::new(workflow_date(self.date)),
            },
            Step::Fill {
                target: Target::required(text_inputs("time field")).nth(1),
                value: Secret::new(self.schedule.time_for(kind).chat()),
            },
        ];

        if !self.note.trim().is_empty() {
            steps.push(Step::optional(Step::Fill {
                target: Target::discover(note_editor()),
                value: Secret::new(self.note.clone()),
            }));
        }

        steps.push(Step::Submit {
            target: Target::required(submit_button()),
        });
        steps.push(Step::ConfirmSubmission(Confirmation::ModalHidden {
            modal: Selector::css(r#"[data-qa="wizard_modal"]"#),
            timeout: Duration::from_secs(10),
            grace: Duration::from_secs(3),
            error_texts: SUBMIT_ERRORS.iter().map(|t| t.to_string()).collect(),
        }));
        steps
    }

    fn between_punches(&self) -> Duration {
        Duration::from_secs(3)
    }
}

#[cfg(test)]
#[path = "slackwf_tests.rs"]
mod tests;
