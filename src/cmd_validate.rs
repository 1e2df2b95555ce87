//! `dakoku validate` handler.

use std::process::ExitCode;

use dakoku_config::{Config, ConfigValidator};

/// Validate the configuration and print a summary with secrets redacted.
pub(crate) fn handle_validate(config: &Config) -> ExitCode {
    let result = ConfigValidator::validate(config);

    println!("{}", summary(config));

    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }

    if result.is_valid() {
        println!("Configuration is valid");
        ExitCode::SUCCESS
    } else {
        println!("Configuration has {} error(s)", result.errors.len());
        ExitCode::FAILURE
    }
}

fn presence(value: &Option<String>) -> &'static str {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => "(set)",
        _ => "(not set)",
    }
}

fn summary(config: &Config) -> String {
    let lines = [
        "[jobcan]".to_string(),
        format!("url = {}", config.jobcan.url),
        format!("email = {}", presence(&config.jobcan.email)),
        format!("password = {}", presence(&config.jobcan.password)),
        format!("notice = {}", config.jobcan.notice),
        String::new(),
        "[slackwf]".to_string(),
        format!("url = {}", config.slackwf.url),
        format!("workspace = {}", presence(&config.slackwf.workspace)),
        format!("google_email = {}", presence(&config.slackwf.google_email)),
        format!("google_password = {}", presence(&config.slackwf.google_password)),
        format!(
            "channel_url = {}",
            config.slackwf.channel_url.as_deref().unwrap_or("(default)")
        ),
        format!("transplant = {:?}", config.slackwf.transplant),
        String::new(),
        "[schedule]".to_string(),
        format!("start = {}", config.schedule.start),
        format!("end = {}", config.schedule.end),
        String::new(),
        "[browser]".to_string(),
        format!("headless = {}", config.browser.headless),
        format!("debug_port = {}", config.browser.debug_port),
        format!("slow_mo_ms = {}", config.browser.slow_mo_ms),
        String::new(),
        "[runtime]".to_string(),
        format!("pid_file = {}", config.runtime.pid_file.display()),
        format!("max_lifetime_secs = {}", config.runtime.max_lifetime_secs),
        format!("keep_open = {}", config.runtime.keep_open),
        String::new(),
        "[logging]".to_string(),
        format!("dir = {}", config.logging.log_dir().display()),
        format!("level = {}", config.logging.level),
    ];
    lines.join("\n")
}
