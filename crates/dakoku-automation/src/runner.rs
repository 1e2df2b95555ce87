//! Worker entry point: one request, one browser, one process lock.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use dakoku_browser::{LaunchOptions, Launcher, LivenessConfig, SessionManager, TeardownReason};
use dakoku_config::{BrowserConfig, Config};
use dakoku_daemon::{LockAcquisition, ProcessLock, SignalHandler};
use dakoku_daemon::StopSignal;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::AutomationError;
use crate::jobcan::JobcanDriver;
use crate::orchestrator::Orchestrator;
use crate::request::{CredentialBundle, RunRequest, RunResult, Site};
use crate::schedule::AttendanceSchedule;
use crate::slackwf::SlackWfDriver;
use crate::step::{SiteDriver, TransplantStrategy};

/// Everything one worker run needs.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub request: RunRequest,
    pub credentials: CredentialBundle,
    pub schedule: AttendanceSchedule,
    /// Day the workflow entry is for.
    pub date: NaiveDate,
    pub pid_file: PathBuf,
    pub liveness: LivenessConfig,
    /// Leave the window open after success until the user closes it.
    pub keep_open: bool,
    pub transplant: TransplantStrategy,
    pub jobcan_notice: String,
    pub slack_note: String,
    pub kill_grace: Duration,
}

impl RunParams {
    pub fn from_config(request: RunRequest, config: &Config) -> Result<Self, AutomationError> {
        Ok(Self {
            request,
            credentials: CredentialBundle::from_config(request.site, config),
            schedule: AttendanceSchedule::from_config(&config.schedule)?,
            date: Local::now().date_naive(),
            pid_file: config.runtime.pid_path(),
            liveness: LivenessConfig {
                poll_interval: Duration::from_secs(config.runtime.poll_interval_secs),
                max_lifetime: Duration::from_secs(config.runtime.max_lifetime_secs),
            },
            keep_open: config.runtime.keep_open,
            transplant: config.slackwf.transplant.into(),
            jobcan_notice: config.jobcan.notice.clone(),
            slack_note: config.slackwf.note.clone(),
            kill_grace: Duration::from_millis(config.runtime.kill_grace_ms),
        })
    }

    /// Build the driver for the requested site.
    ///
    /// Fails with [`AutomationError::MissingCredentials`] without side effects.
    pub fn driver(&self) -> Result<Box<dyn SiteDriver>, AutomationError> {
        let driver: Box<dyn SiteDriver> = match self.request.site {
            Site::Jobcan => Box::new(JobcanDriver::new(
                &self.credentials,
                self.schedule,
                self.jobcan_notice.clone(),
            )?),
            Site::SlackWf => Box::new(SlackWfDriver::new(
                &self.credentials,
                self.schedule,
                self.date,
                self.slack_note.clone(),
                self.transplant,
            )?),
        };
        Ok(driver)
    }
}

/// Map the `[browser]` section onto launcher options.
pub fn launch_options(config: &BrowserConfig) -> LaunchOptions {
    LaunchOptions {
        chrome_path: config.chrome_path.clone(),
        debug_port: config.debug_port,
        headless: config.headless,
        slow_mo: Duration::from_millis(config.slow_mo_ms),
        profile_dir: config.profile_dir.clone(),
        viewport_width: config.viewport_width,
        viewport_height: config.viewport_height,
        ..LaunchOptions::default()
    }
}

/// How a worker run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub result: RunResult,
    pub reason: TeardownReason,
}

impl RunOutcome {
    /// Zero for success and for runs the user ended.
    pub fn exit_code(&self) -> i32 {
        self.reason.exit_code()
    }
}

/// Execute one request end to end.
///
/// Credentials are checked before the lock is taken or a browser launched.
/// A stop requested before launch ends the run without a browser. The run
/// races against the session watcher; whichever finishes first decides the
/// outcome. A failure caused by the user closing the browser or page ends
/// like the close itself. The browser is closed and the lock released on
/// every path.
pub async fn run_automation(
    params: RunParams,
    launcher: Arc<dyn Launcher>,
    signals: &SignalHandler,
) -> Result<RunOutcome, AutomationError> {
    let driver = params.driver()?;
    // Queue stop requests from here on; earlier ones are in the latch.
    let mut stop_requests = signals.subscribe();
    info!(
        "{} {} requested (fields: {})",
        params.request.site,
        params.request.action,
        params.credentials.present().join(", ")
    );

    let mut lock = ProcessLock::new(&params.pid_file).with_grace_period(params.kill_grace);
    match lock.acquire().await? {
        LockAcquisition::Fresh => debug!("Lock acquired at {}", lock.path().display()),
        LockAcquisition::RecoveredStale { pid } => {
            warn!("Recovered stale lock left by PID {}", pid)
        }
        LockAcquisition::TerminatedPrevious { pid } => {
            warn!("Terminated previous run (PID {})", pid)
        }
    }

    let session = SessionManager::new(launcher);
    let outcome = drive(&params, driver.as_ref(), &session, signals, &mut stop_requests).await;

    session.cleanup().await;
    if let Err(e) = lock.release() {
        warn!("Failed to release lock: {}", e);
    }

    match &outcome {
        Ok(outcome) => info!("Run finished ({}): {}", outcome.reason, outcome.result.message),
        Err(e) => warn!("Run failed: {}", e),
    }
    outcome
}

async fn drive(
    params: &RunParams,
    driver: &dyn SiteDriver,
    session: &SessionManager,
    signals: &SignalHandler,
    stop_requests: &mut broadcast::Receiver<StopSignal>,
) -> Result<RunOutcome, AutomationError> {
    if let Some(signal) = signals.requested() {
        info!("{} arrived before launch, not starting the browser", signal);
        return Ok(stopped(TeardownReason::Signal(signal)));
    }
    session.launch().await?;
    let started = Instant::now();

    let settled = {
        let orchestrator = Orchestrator::new(session);
        let execution = orchestrator.execute(&params.request, driver);
        let watch = session.watch(stop_requests, params.liveness);
        tokio::pin!(execution);
        tokio::pin!(watch);

        // Watch first so a stop queued during launch wins before any step runs.
        tokio::select! {
            biased;

            reason = &mut watch => {
                let reason = reason?;
                if session.is_closing() {
                    // Our own teardown after a failure; let the run report it.
                    execution.await
                } else {
                    session.teardown(&reason).await;
                    return Ok(stopped(reason));
                }
            }
            result = &mut execution => result,
        }
    };

    let report = match settled {
        Ok(report) => report,
        Err(e) => match session.teardown_reason() {
            Some(reason) if reason.is_user_initiated() => {
                info!("Run ended by {}: {}", reason, e);
                return Ok(stopped(reason));
            }
            _ => return Err(e),
        },
    };

    let reason = if params.keep_open {
        let remaining = params.liveness.max_lifetime.saturating_sub(started.elapsed());
        info!("Leaving the browser open for up to {:?}", remaining);
        session
            .watch(
                stop_requests,
                LivenessConfig {
                    max_lifetime: remaining,
                    ..params.liveness
                },
            )
            .await?
    } else {
        TeardownReason::Completed
    };
    session.teardown(&reason).await;

    Ok(RunOutcome {
        result: RunResult::success(report.message),
        reason,
    })
}

/// Outcome of a run something other than the automation ended.
fn stopped(reason: TeardownReason) -> RunOutcome {
    RunOutcome {
        result: RunResult::failure(interrupted(&reason)),
        reason,
    }
}

fn interrupted(reason: &TeardownReason) -> String {
    match reason {
        TeardownReason::BrowserDisconnected | TeardownReason::PageClosed => {
            "ブラウザが閉じられたため処理を中断しました".to_string()
        }
        TeardownReason::Signal(_) => "終了要求を受けたため処理を中断しました".to_string(),
        TeardownReason::Timeout => "制限時間を超えたため処理を中断しました".to_string(),
        TeardownReason::Completed | TeardownReason::Error(_) => "処理を中断しました".to_string(),
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
