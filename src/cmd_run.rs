//! `dakoku run` handler.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use dakoku_automation::{
    launch_options, run_automation, AutomationError, RunOutcome, RunParams, RunRequest, RunResult,
};
use dakoku_browser::{ChromeLauncher, Launcher};
use dakoku_config::{Config, ConfigError};
use dakoku_daemon::SignalHandler;

use crate::cli::RunArgs;

/// Run one request and print its [`RunResult`] as JSON on stdout.
pub(crate) async fn handle_run(config: Result<Config, ConfigError>, args: RunArgs) -> ExitCode {
    let (result, code) = match execute(config, &args).await {
        Ok(outcome) => {
            let code = outcome.exit_code();
            (outcome.result, code)
        }
        Err(e) => {
            error!("{:#}", e);
            (RunResult::failure(describe(&e)), 1)
        }
    };

    match serde_json::to_string(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize result: {}", e),
    }
    ExitCode::from(code.clamp(0, 255) as u8)
}

async fn execute(config: Result<Config, ConfigError>, args: &RunArgs) -> anyhow::Result<RunOutcome> {
    let config = config.context("Failed to load configuration")?;
    let request = RunRequest::parse(&args.site, &args.action, args.dry_run)?;

    let mut params = RunParams::from_config(request, &config)?;
    if let Some(keep_open) = args.keep_open {
        params.keep_open = keep_open;
    }

    let signals = SignalHandler::new();
    signals.setup_os_signals().await?;

    info!("dakoku v{}", env!("CARGO_PKG_VERSION"));
    let launcher: Arc<dyn Launcher> = Arc::new(ChromeLauncher::new(launch_options(&config.browser)));
    Ok(run_automation(params, launcher, &signals).await?)
}

/// User-facing text for a failed run.
fn describe(e: &anyhow::Error) -> String {
    match e.downcast_ref::<AutomationError>() {
        Some(automation) => automation.user_message(),
        None => format!("{:#}", e),
    }
}
