//! Run requests, credentials and results.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use dakoku_config::Config;
use serde::{Deserialize, Serialize};

use crate::error::AutomationError;
use crate::step::PunchKind;

/// Credential field names.
pub mod field {
    pub const EMAIL: &str = "email";
    pub const PASSWORD: &str = "password";
    pub const WORKSPACE: &str = "workspace";
    pub const GOOGLE_EMAIL: &str = "google_email";
    pub const GOOGLE_PASSWORD: &str = "google_password";
}

/// Target site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Jobcan,
    SlackWf,
}

impl Site {
    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Jobcan => "jobcan",
            Site::SlackWf => "slackwf",
        }
    }

    /// Name shown to the user.
    pub fn display_name(&self) -> &'static str {
        match self {
            Site::Jobcan => "Jobcan",
            Site::SlackWf => "SlackWF",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Site {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jobcan" => Ok(Site::Jobcan),
            "slackwf" => Ok(Site::SlackWf),
            _ => Err(AutomationError::UnknownSite(s.to_string())),
        }
    }
}

/// Requested attendance action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    CheckIn,
    CheckOut,
    CheckBoth,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CheckIn => "check-in",
            Action::CheckOut => "check-out",
            Action::CheckBoth => "check-both",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::CheckIn => "出勤",
            Action::CheckOut => "退勤",
            Action::CheckBoth => "出退勤",
        }
    }

    /// Punches to perform, in order.
    pub fn punches(&self) -> &'static [PunchKind] {
        match self {
            Action::CheckIn => &[PunchKind::Start],
            Action::CheckOut => &[PunchKind::End],
            Action::CheckBoth => &[PunchKind::Start, PunchKind::End],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "check-in" => Ok(Action::CheckIn),
            "check-out" => Ok(Action::CheckOut),
            "check-both" => Ok(Action::CheckBoth),
            _ => Err(AutomationError::InvalidAction(s.to_string())),
        }
    }
}

/// One invocation. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRequest {
    pub site: Site,
    pub action: Action,
    /// Fill every form but never submit.
    pub dry_run: bool,
}

impl RunRequest {
    pub fn new(site: Site, action: Action, dry_run: bool) -> Self {
        Self {
            site,
            action,
            dry_run,
        }
    }

    pub fn parse(site: &str, action: &str, dry_run: bool) -> Result<Self, AutomationError> {
        Ok(Self::new(site.parse()?, action.parse()?, dry_run))
    }
}

/// A value that must never reach the logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Login material and URLs for one site.
#[derive(Debug, Clone)]
pub struct CredentialBundle {
    pub site: Site,
    /// Sign-in page to start from.
    pub target_url: String,
    /// Page to land on after login (SlackWF only).
    pub channel_url: Option<String>,
    fields: BTreeMap<String, Secret>,
}

impl CredentialBundle {
    pub fn new(site: Site, target_url: impl Into<String>) -> Self {
        Self {
            site,
            target_url: target_url.into(),
            channel_url: None,
            fields: BTreeMap::new(),
        }
    }

    /// Set a field. Blank values count as absent.
    pub fn with_field(mut self, name: &str, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value.map(Secret::new).filter(|v| !v.is_blank()) {
            self.fields.insert(name.to_string(), value);
        }
        self
    }

    pub fn with_channel_url(mut self, url: Option<String>) -> Self {
        self.channel_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Secret> {
        self.fields.get(name)
    }

    /// Names of the fields that are set, for logging.
    pub fn present(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.fields.contains_key(**name))
            .map(|name| name.to_string())
            .collect()
    }

    /// Fail with [`AutomationError::MissingCredentials`] unless every field is present.
    pub fn require(&self, required: &[&str]) -> Result<(), AutomationError> {
        let missing = self.missing(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AutomationError::MissingCredentials {
                site: self.site,
                missing,
            })
        }
    }

    /// The required field's value. Call [`Self::require`] first.
    pub(crate) fn value(&self, name: &str) -> Result<Secret, AutomationError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| AutomationError::MissingCredentials {
                site: self.site,
                missing: vec![name.to_string()],
            })
    }

    pub fn from_config(site: Site, config: &Config) -> Self {
        match site {
            Site::Jobcan => Self::new(site, config.jobcan.url.clone())
                .with_field(field::EMAIL, config.jobcan.email.clone())
                .with_field(field::PASSWORD, config.jobcan.password.clone()),
            Site::SlackWf => Self::new(site, config.slackwf.url.clone())
                .with_field(field::WORKSPACE, config.slackwf.workspace.clone())
                .with_field(field::GOOGLE_EMAIL, config.slackwf.google_email.clone())
                .with_field(field::GOOGLE_PASSWORD, config.slackwf.google_password.clone())
                .with_channel_url(config.slackwf.channel_url.clone()),
        }
    }
}

/// Outcome reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub message: String,
}

impl RunResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
