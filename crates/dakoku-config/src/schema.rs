//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::loader::ConfigLoader;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub jobcan: JobcanConfig,

    #[serde(default)]
    pub slackwf: SlackWfConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Jobcan timesheet site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobcanConfig {
    /// Sign-in page.
    #[serde(default = "default_jobcan_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Free-text notice attached to every punch.
    #[serde(default = "default_notice")]
    pub notice: String,
}

impl Default for JobcanConfig {
    fn default() -> Self {
        Self {
            url: default_jobcan_url(),
            email: None,
            password: None,
            notice: default_notice(),
        }
    }
}

fn default_jobcan_url() -> String {
    "https://id.jobcan.jp/users/sign_in".to_string()
}

fn default_notice() -> String {
    "打刻".to_string()
}

/// Slack workflow site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackWfConfig {
    /// Workspace sign-in page.
    #[serde(default = "default_slackwf_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_password: Option<String>,

    /// Channel hosting the attendance workflow. Falls back to the workspace root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_url: Option<String>,

    /// Optional notes typed into the workflow form. Empty leaves the field untouched.
    #[serde(default)]
    pub note: String,

    #[serde(default)]
    pub transplant: TransplantMode,
}

impl Default for SlackWfConfig {
    fn default() -> Self {
        Self {
            url: default_slackwf_url(),
            workspace: None,
            google_email: None,
            google_password: None,
            channel_url: None,
            note: String::new(),
            transplant: TransplantMode::default(),
        }
    }
}

fn default_slackwf_url() -> String {
    "https://slack.com/intl/ja-jp/workspace-signin".to_string()
}

/// How the authenticated Slack session moves to a dialog-free page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransplantMode {
    /// Copy cookies into a brand-new browser context.
    #[default]
    NewContext,
    /// Open a second tab in the authenticated context.
    SameContextTab,
}

/// Attendance schedule, `HH:MM` in 24-hour time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_start")]
    pub start: String,

    #[serde(default = "default_end")]
    pub end: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
        }
    }
}

fn default_start() -> String {
    "09:00".to_string()
}

fn default_end() -> String {
    "18:00".to_string()
}

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Chrome executable. Auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,

    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    #[serde(default)]
    pub headless: bool,

    /// Delay inserted before every input action, for slow third-party scripts.
    #[serde(default = "default_slow_mo_ms")]
    pub slow_mo_ms: u64,

    /// Profile directory. A throwaway directory is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<PathBuf>,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            debug_port: default_debug_port(),
            headless: false,
            slow_mo_ms: default_slow_mo_ms(),
            profile_dir: None,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

fn default_debug_port() -> u16 {
    9222
}

fn default_slow_mo_ms() -> u64 {
    100
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    720
}

/// Worker process limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Hard wall-clock ceiling for one worker process.
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,

    /// Liveness poll period.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Keep the browser window open after a successful run until the user closes it.
    #[serde(default = "default_keep_open")]
    pub keep_open: bool,

    /// Grace period between SIGTERM and SIGKILL for a leftover run.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

impl RuntimeConfig {
    /// Lock file path with `~` expanded.
    pub fn pid_path(&self) -> PathBuf {
        expand_tilde(&self.pid_file)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            pid_file: default_pid_file(),
            max_lifetime_secs: default_max_lifetime_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            keep_open: default_keep_open(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("temp/dakoku.pid")
}

fn default_max_lifetime_secs() -> u64 {
    15 * 60
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_keep_open() -> bool {
    true
}

fn default_kill_grace_ms() -> u64 {
    2000
}

/// Log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files. Defaults to `~/.dakoku/logs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Configured directory with `~` expanded, else `~/.dakoku/logs`.
    pub fn log_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => expand_tilde(dir),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".dakoku")
                .join("logs"),
        }
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(text) => PathBuf::from(ConfigLoader::expand_path(text)),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
