//! Declarative automation steps and their interpreter.
//!
//! A site driver is a list of [`Step`]s. [`StepRunner`] executes them in
//! order against the session's current page, which may change mid-run when
//! a step adopts a new tab or transplants the session.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dakoku_browser::{
    resolve, resolve_nth, ElementHandle, LoadState, Page, Selector, SelectorList, SessionManager,
    OPTIONAL_TIMEOUT, REQUIRED_TIMEOUT,
};
use dakoku_config::TransplantMode;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::AutomationError;
use crate::request::{Secret, Site};

const URL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Which half of the day a punch records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PunchKind {
    Start,
    End,
}

impl PunchKind {
    pub fn label(&self) -> &'static str {
        match self {
            PunchKind::Start => "出勤",
            PunchKind::End => "退勤",
        }
    }
}

impl fmt::Display for PunchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PunchKind::Start => write!(f, "start"),
            PunchKind::End => write!(f, "end"),
        }
    }
}

/// How a submission was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The site's success signal was observed.
    Confirmed,
    /// No success signal and no error within the bound. Probably went through.
    Unconfirmed,
    /// Dry run; nothing was submitted.
    Skipped,
}

/// Where the authenticated session continues after login.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransplantStrategy {
    /// Copy cookies into a fresh browser context.
    #[default]
    NewContext,
    /// Open a new tab in the same context.
    SameContextTab,
}

impl From<TransplantMode> for TransplantStrategy {
    fn from(mode: TransplantMode) -> Self {
        match mode {
            TransplantMode::NewContext => TransplantStrategy::NewContext,
            TransplantMode::SameContextTab => TransplantStrategy::SameContextTab,
        }
    }
}

/// An element to act on: candidates, optional position, and wait per candidate.
#[derive(Debug, Clone)]
pub struct Target {
    pub list: SelectorList,
    pub index: Option<usize>,
    pub timeout: Duration,
}

impl Target {
    /// A form field the flow cannot continue without.
    pub fn required(list: SelectorList) -> Self {
        Self {
            list,
            index: None,
            timeout: REQUIRED_TIMEOUT,
        }
    }

    /// A discovery point tried with the short timeout.
    pub fn discover(list: SelectorList) -> Self {
        Self {
            list,
            index: None,
            timeout: OPTIONAL_TIMEOUT,
        }
    }

    /// The `index`-th visible match instead of the first.
    pub fn nth(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.list.name
    }
}

/// Guard for [`Step::When`].
#[derive(Debug, Clone)]
pub enum Condition {
    UrlContains(String),
    Visible(SelectorList),
    Not(Box<Condition>),
}

/// How to judge a submission.
#[derive(Debug, Clone)]
pub enum Confirmation {
    /// Wait `settle`, then for `expression` to become truthy.
    Function {
        expression: String,
        settle: Duration,
        timeout: Duration,
    },
    /// Wait for `modal` to hide. Failing that, wait `grace` and look for error text.
    ModalHidden {
        modal: Selector,
        timeout: Duration,
        grace: Duration,
        error_texts: Vec<String>,
    },
}

/// One automation step.
#[derive(Debug, Clone)]
pub enum Step {
    Navigate {
        url: String,
        state: LoadState,
        timeout: Duration,
    },
    Fill {
        target: Target,
        value: Secret,
    },
    /// Triple-click to select the existing contents, then fill.
    ClearAndFill {
        target: Target,
        value: Secret,
    },
    Click {
        target: Target,
    },
    /// Filtering combobox: click, type, let the list settle, confirm with Enter.
    SelectOption {
        target: Target,
        value: Secret,
        settle: Duration,
    },
    /// Click a visible anchor with this exact href from page script and
    /// follow it into a new tab if one opens.
    ClickLinkByScript {
        href: String,
        settle: Duration,
        load_timeout: Duration,
    },
    WaitNetworkIdle {
        timeout: Duration,
        required: bool,
    },
    /// Soft wait for a JS predicate.
    WaitUntil {
        description: String,
        expression: String,
        timeout: Duration,
    },
    WaitForUrl {
        contains: String,
        timeout: Duration,
        required: bool,
    },
    Pause(Duration),
    /// Run the inner step, treating a missing element as success.
    Optional(Box<Step>),
    When {
        condition: Condition,
        steps: Vec<Step>,
    },
    /// Fail with [`AutomationError::AuthenticationFailed`] if any text is visible.
    FailIfTextVisible {
        texts: Vec<String>,
        message: String,
    },
    /// Move the logged-in session to a fresh page on `url`.
    TransplantSession {
        url: String,
        strategy: TransplantStrategy,
        timeout: Duration,
    },
    /// Final click. Skipped in dry-run.
    Submit {
        target: Target,
    },
    /// Judge the preceding submit. Recorded as skipped in dry-run.
    ConfirmSubmission(Confirmation),
}

impl Step {
    pub fn optional(step: Step) -> Self {
        Step::Optional(Box::new(step))
    }
}

/// A site flow expressed as steps.
pub trait SiteDriver: Send + Sync {
    fn site(&self) -> Site;

    /// Credential fields this driver cannot run without.
    fn required_fields(&self) -> &'static [&'static str];

    /// Login and navigation up to the punch form.
    fn prepare(&self) -> Vec<Step>;

    /// One punch, ending with submit and confirmation.
    fn punch(&self, kind: PunchKind) -> Vec<Step>;

    /// Pause between the two punches of a check-both run.
    fn between_punches(&self) -> Duration;
}

/// Executes steps against the session's current page.
pub struct StepRunner<'a> {
    session: &'a SessionManager,
    dry_run: bool,
}

impl<'a> StepRunner<'a> {
    pub fn new(session: &'a SessionManager, dry_run: bool) -> Self {
        Self { session, dry_run }
    }

    /// Run `steps` in order. Returns the outcome of every confirmation step.
    pub async fn run(&self, steps: &[Step]) -> Result<Vec<SubmitOutcome>, AutomationError> {
        let mut outcomes = Vec::new();
        for step in steps {
            self.run_step(step, &mut outcomes).await?;
        }
        Ok(outcomes)
    }

    fn page(&self) -> Result<Arc<dyn Page>, AutomationError> {
        Ok(self.session.current_page()?)
    }

    async fn locate(&self, page: &dyn Page, target: &Target) -> Result<ElementHandle, AutomationError> {
        let element = match target.index {
            Some(index) => resolve_nth(page, &target.list, index, target.timeout).await?,
            None => resolve(page, &target.list, target.timeout).await?,
        };
        Ok(element)
    }

    fn run_step<'s>(
        &'s self,
        step: &'s Step,
        outcomes: &'s mut Vec<SubmitOutcome>,
    ) -> Pin<Box<dyn Future<Output = Result<(), AutomationError>> + Send + 's>> {
        Box::pin(async move {
            match step {
                Step::Navigate {
                    url,
                    state,
                    timeout,
                } => {
                    info!("Navigating to {}", url);
                    self.page()?.goto(url, *state, *timeout).await?;
                }
                Step::Fill { target, value } => {
                    let page = self.page()?;
                    let element = self.locate(page.as_ref(), target).await?;
                    page.fill(&element, value.expose()).await?;
                    debug!("Filled {}", target.name());
                }
                Step::ClearAndFill { target, value } => {
                    let page = self.page()?;
                    let element = self.locate(page.as_ref(), target).await?;
                    page.click(&element, 3).await?;
                    page.fill(&element, value.expose()).await?;
                    debug!("Replaced contents of {}", target.name());
                }
                Step::Click { target } => {
                    let page = self.page()?;
                    let element = self.locate(page.as_ref(), target).await?;
                    page.click(&element, 1).await?;
                    info!("Clicked {}", target.name());
                }
                Step::SelectOption {
                    target,
                    value,
                    settle,
                } => {
                    let page = self.page()?;
                    let element = self.locate(page.as_ref(), target).await?;
                    page.click(&element, 1).await?;
                    page.fill(&element, value.expose()).await?;
                    tokio::time::sleep(*settle).await;
                    page.press(&element, "Enter").await?;
                    debug!("Selected option in {}", target.name());
                }
                Step::ClickLinkByScript {
                    href,
                    settle,
                    load_timeout,
                } => self.click_link(href, *settle, *load_timeout).await?,
                Step::WaitNetworkIdle { timeout, required } => {
                    if !self.page()?.wait_for_network_idle(*timeout).await? {
                        if *required {
                            return Err(AutomationError::NavigationTimeout {
                                what: "network idle".to_string(),
                            });
                        }
                        warn!("Network did not settle within {:?}, continuing", timeout);
                    }
                }
                Step::WaitUntil {
                    description,
                    expression,
                    timeout,
                } => {
                    if self.page()?.wait_for_function(expression, *timeout).await? {
                        debug!("Condition met: {}", description);
                    } else {
                        warn!("Timed out waiting for {}, continuing", description);
                    }
                }
                Step::WaitForUrl {
                    contains,
                    timeout,
                    required,
                } => {
                    if !self.wait_for_url(contains, *timeout).await? {
                        if *required {
                            return Err(AutomationError::NavigationTimeout {
                                what: format!("URL containing {}", contains),
                            });
                        }
                        warn!("URL never contained {}, continuing", contains);
                    }
                }
                Step::Pause(duration) => tokio::time::sleep(*duration).await,
                Step::Optional(inner) => match self.run_step(inner, outcomes).await {
                    Err(AutomationError::ElementNotFound { element }) => {
                        info!("Optional {} not present, skipping", element);
                    }
                    other => other?,
                },
                Step::When { condition, steps } => {
                    if self.check(condition).await? {
                        for inner in steps {
                            self.run_step(inner, outcomes).await?;
                        }
                    } else {
                        debug!("Condition {:?} not met, skipping {} steps", condition, steps.len());
                    }
                }
                Step::FailIfTextVisible { texts, message } => {
                    let page = self.page()?;
                    for text in texts {
                        if page.is_text_visible(text).await? {
                            warn!("Error text visible: {}", text);
                            return Err(AutomationError::AuthenticationFailed(message.clone()));
                        }
                    }
                }
                Step::TransplantSession {
                    url,
                    strategy,
                    timeout,
                } => self.transplant(url, *strategy, *timeout).await?,
                Step::Submit { target } => {
                    if self.dry_run {
                        info!("Dry run: not clicking {}", target.name());
                    } else {
                        let page = self.page()?;
                        let element = self.locate(page.as_ref(), target).await?;
                        page.click(&element, 1).await?;
                        info!("Submitted via {}", target.name());
                    }
                }
                Step::ConfirmSubmission(confirmation) => {
                    let outcome = if self.dry_run {
                        SubmitOutcome::Skipped
                    } else {
                        self.confirm(confirmation).await?
                    };
                    outcomes.push(outcome);
                }
            }
            Ok(())
        })
    }

    async fn check(&self, condition: &Condition) -> Result<bool, AutomationError> {
        let page = self.page()?;
        let mut negate = false;
        let mut condition = condition;
        while let Condition::Not(inner) = condition {
            negate = !negate;
            condition = inner.as_ref();
        }

        let met = match condition {
            Condition::UrlContains(fragment) => page.current_url().await?.contains(fragment.as_str()),
            Condition::Visible(list) => dakoku_browser::is_present(page.as_ref(), list).await?,
            Condition::Not(_) => false,
        };
        Ok(met != negate)
    }

    async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<bool, AutomationError> {
        let deadline = Instant::now() + timeout;
        loop {
            let url = self.page()?.current_url().await?;
            if url.contains(fragment) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!("Still at {}", url);
                return Ok(false);
            }
            tokio::time::sleep(URL_POLL_INTERVAL).await;
        }
    }

    async fn click_link(
        &self,
        href: &str,
        settle: Duration,
        load_timeout: Duration,
    ) -> Result<(), AutomationError> {
        let page = self.page()?;
        let browser = self.session.browser()?;

        let before: HashSet<String> = browser
            .pages(None)
            .await?
            .iter()
            .map(|p| p.id().to_string())
            .collect();

        if !page.click_anchor(href).await? {
            return Err(AutomationError::ElementNotFound {
                element: format!("link to {}", href),
            });
        }
        info!("Clicked link to {}", href);
        tokio::time::sleep(settle).await;

        let opened = browser
            .pages(None)
            .await?
            .into_iter()
            .filter(|p| !before.contains(p.id()))
            .last();

        let current = match opened {
            Some(new_page) => {
                info!("Link opened a new tab {}", new_page.id());
                self.session.adopt_page(new_page.clone())?;
                new_page
            }
            None => page,
        };

        if !current.wait_for_network_idle(load_timeout).await? {
            warn!("Page behind {} still loading, continuing", href);
        }
        Ok(())
    }

    async fn transplant(
        &self,
        url: &str,
        strategy: TransplantStrategy,
        timeout: Duration,
    ) -> Result<(), AutomationError> {
        let browser = self.session.browser()?;
        let old = self.page()?;

        let new_page = match strategy {
            TransplantStrategy::NewContext => {
                let cookies = browser.cookies(old.context_id()).await?;
                let context = browser.new_context().await?;
                browser.set_cookies(Some(context.as_str()), &cookies).await?;
                info!("Copied {} cookies into context {}", cookies.len(), context);
                browser.new_page(Some(context.as_str())).await?
            }
            TransplantStrategy::SameContextTab => browser.new_page(old.context_id()).await?,
        };

        if let Err(e) = new_page.goto(url, LoadState::DomContentLoaded, timeout).await {
            if let Err(close_err) = new_page.close().await {
                debug!("Failed to close abandoned page: {}", close_err);
            }
            return Err(e.into());
        }

        self.session.adopt_page(new_page)?;
        if let Err(e) = old.close().await {
            warn!("Failed to close the sign-in page: {}", e);
        }
        info!("Session continued on {}", url);
        Ok(())
    }

    async fn confirm(&self, confirmation: &Confirmation) -> Result<SubmitOutcome, AutomationError> {
        let page = self.page()?;
        match confirmation {
            Confirmation::Function {
                expression,
                settle,
                timeout,
            } => {
                tokio::time::sleep(*settle).await;
                if page.wait_for_function(expression, *timeout).await? {
                    Ok(SubmitOutcome::Confirmed)
                } else {
                    warn!("Submission not confirmed within {:?}, assuming it went through", timeout);
                    Ok(SubmitOutcome::Unconfirmed)
                }
            }
            Confirmation::ModalHidden {
                modal,
                timeout,
                grace,
                error_texts,
            } => {
                if page.wait_for_hidden(modal, *timeout).await? {
                    return Ok(SubmitOutcome::Confirmed);
                }
                warn!("{} still visible after {:?}, checking for errors", modal, timeout);
                tokio::time::sleep(*grace).await;

                for text in error_texts {
                    if page.is_text_visible(text).await? {
                        return Err(AutomationError::SubmissionRejected(text.clone()));
                    }
                }
                Ok(SubmitOutcome::Unconfirmed)
            }
        }
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
