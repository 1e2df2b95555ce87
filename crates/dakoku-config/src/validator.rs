//! Sanity checks on a loaded [`Config`].
//!
//! Errors make `dakoku validate` fail. Warnings are reported but do not,
//! most notably missing credentials, which may still arrive via environment.
//! `browser.debug_port = 0` is accepted and lets Chrome pick the port.

use crate::schema::Config;

/// One problem found at a dotted config path such as `schedule.start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(Finding {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: &str, message: impl Into<String>) {
        self.warnings.push(Finding {
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Minutes since midnight for an `H:MM` or `HH:MM` clock time.
pub fn parse_hhmm(value: &str) -> Option<u32> {
    let (h, m) = value.trim().split_once(':')?;
    if !(1..=2).contains(&h.len()) || m.len() != 2 {
        return None;
    }
    let (hours, minutes) = (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?);
    (hours < 24 && minutes < 60).then_some(hours * 60 + minutes)
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();
        Self::schedule(config, &mut result);
        Self::urls(config, &mut result);
        Self::credentials(config, &mut result);
        Self::browser(config, &mut result);
        Self::runtime(config, &mut result);
        result
    }

    fn schedule(config: &Config, result: &mut ValidationResult) {
        let mut parsed = [("schedule.start", &config.schedule.start), ("schedule.end", &config.schedule.end)]
            .map(|(path, value)| {
                let minutes = parse_hhmm(value);
                if minutes.is_none() {
                    result.error(path, format!("'{}' is not a valid HH:MM time", value));
                }
                minutes
            })
            .into_iter();

        if let (Some(Some(start)), Some(Some(end))) = (parsed.next(), parsed.next()) {
            if start >= end {
                result.error("schedule", "start time must be earlier than end time");
            }
        }
    }

    fn urls(config: &Config, result: &mut ValidationResult) {
        let urls = [
            ("jobcan.url", Some(config.jobcan.url.as_str())),
            ("slackwf.url", Some(config.slackwf.url.as_str())),
            ("slackwf.channel_url", config.slackwf.channel_url.as_deref()),
        ];
        for (path, url) in urls {
            let Some(url) = url else { continue };
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                result.error(path, format!("'{}' is not an http(s) URL", url));
            }
        }
    }

    fn credentials(config: &Config, result: &mut ValidationResult) {
        let required = [
            ("jobcan.email", &config.jobcan.email),
            ("jobcan.password", &config.jobcan.password),
            ("slackwf.workspace", &config.slackwf.workspace),
            ("slackwf.google_email", &config.slackwf.google_email),
            ("slackwf.google_password", &config.slackwf.google_password),
        ];
        for (path, value) in required {
            if is_blank(value) {
                result.warn(path, "not set; runs for this site fail unless the environment provides it");
            }
        }
    }

    fn browser(config: &Config, result: &mut ValidationResult) {
        let browser = &config.browser;
        if browser.slow_mo_ms > 2000 {
            result.warn("browser.slow_mo_ms", "over 2000ms per action, runs may hit the lifetime ceiling");
        }
        if let Some(path) = browser.chrome_path.as_ref().filter(|p| !p.exists()) {
            result.warn("browser.chrome_path", format!("{} does not exist", path.display()));
        }
    }

    fn runtime(config: &Config, result: &mut ValidationResult) {
        let runtime = &config.runtime;
        if runtime.max_lifetime_secs == 0 {
            result.error("runtime.max_lifetime_secs", "must be greater than 0");
        }
        match runtime.poll_interval_secs {
            0 => result.error("runtime.poll_interval_secs", "must be greater than 0"),
            secs if secs > runtime.max_lifetime_secs => result.warn(
                "runtime.poll_interval_secs",
                "longer than max_lifetime_secs, the liveness poll never fires",
            ),
            _ => {}
        }
        if runtime.pid_file.as_os_str().is_empty() {
            result.error("runtime.pid_file", "cannot be empty");
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
