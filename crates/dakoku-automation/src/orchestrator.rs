//! Runs a driver's login flow and the punches a request asks for.

use dakoku_browser::{SessionManager, TeardownReason};
use tracing::{info, warn};

use crate::error::AutomationError;
use crate::request::RunRequest;
use crate::step::{PunchKind, SiteDriver, StepRunner, SubmitOutcome};

/// What a successful execution did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Confirmation outcome per punch, in the order performed.
    pub outcomes: Vec<(PunchKind, SubmitOutcome)>,
    /// User-facing summary.
    pub message: String,
}

pub struct Orchestrator<'a> {
    session: &'a SessionManager,
}

impl<'a> Orchestrator<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    /// Log in, then perform each punch in order.
    ///
    /// Any failure abandons the run and tears the session down before the
    /// error is returned. A failure caused by the browser or current page
    /// going away is torn down as that close, not as an error, so
    /// [`SessionManager::teardown_reason`] tells the two apart.
    pub async fn execute(
        &self,
        request: &RunRequest,
        driver: &dyn SiteDriver,
    ) -> Result<RunReport, AutomationError> {
        match self.perform(request, driver).await {
            Ok(report) => Ok(report),
            Err(e) => {
                let reason = self
                    .session
                    .lost()
                    .or_else(|| e.lost_browser())
                    .unwrap_or_else(|| TeardownReason::Error(e.to_string()));
                match &reason {
                    TeardownReason::Error(_) => warn!("{} {} failed: {}", request.site, request.action, e),
                    _ => info!("{} {} stopped, {}: {}", request.site, request.action, reason, e),
                }
                self.session.teardown(&reason).await;
                Err(e)
            }
        }
    }

    async fn perform(
        &self,
        request: &RunRequest,
        driver: &dyn SiteDriver,
    ) -> Result<RunReport, AutomationError> {
        let runner = StepRunner::new(self.session, request.dry_run);

        info!(
            "Starting {} {} (dry run: {})",
            request.site, request.action, request.dry_run
        );
        runner.run(&driver.prepare()).await?;

        let mut outcomes = Vec::new();
        for (i, kind) in request.action.punches().iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(driver.between_punches()).await;
            }
            info!("Punching {} ({})", kind, kind.label());
            let outcome = runner
                .run(&driver.punch(*kind))
                .await?
                .pop()
                .unwrap_or(SubmitOutcome::Unconfirmed);
            outcomes.push((*kind, outcome));
        }

        let message = summary(request, &outcomes);
        info!("{}", message);
        Ok(RunReport { outcomes, message })
    }
}

fn summary(request: &RunRequest, outcomes: &[(PunchKind, SubmitOutcome)]) -> String {
    let site = request.site.display_name();
    let action = request.action.label();

    if request.dry_run {
        return format!("{}の{}フォーム入力が完了しました（テストモード：送信なし）", site, action);
    }

    let unconfirmed: Vec<&str> = outcomes
        .iter()
        .filter(|(_, outcome)| *outcome == SubmitOutcome::Unconfirmed)
        .map(|(kind, _)| kind.label())
        .collect();
    if !unconfirmed.is_empty() {
        warn!("Completion not confirmed for: {}", unconfirmed.join(", "));
    }

    if unconfirmed.is_empty() {
        format!("{}の{}打刻が完了しました", site, action)
    } else {
        format!(
            "{}の{}打刻を送信しました（{}は完了を確認できませんでした）",
            site,
            action,
            unconfirmed.join("・")
        )
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
