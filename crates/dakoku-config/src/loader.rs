//! Reading `dakoku.toml` and layering the environment on top of it.

use std::fs;
use std::path::Path;

use regex::{Captures, Regex};

use crate::error::ConfigError;
use crate::schema::Config;

/// `${NAME}` inside a string value.
const VAR_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Loads [`Config`] from TOML, expanding `${VAR}` references in string values.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Read {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::load_str(&content)
    }

    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        Self::load_str_with(content, |name| std::env::var(name).ok())
    }

    /// Parse `content`, resolving `${NAME}` through `lookup`. Expansion runs
    /// on parsed string values, so substituted text is never read as TOML.
    pub fn load_str_with<F>(content: &str, lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut document = toml::Value::Table(content.parse::<toml::Table>()?);
        let pattern = Regex::new(VAR_PATTERN)?;
        Self::expand_env_vars(&mut document, &pattern, &lookup)?;
        Ok(document.try_into::<Config>()?)
    }

    /// Defaults when no path is given; a given path must exist. Process
    /// environment overrides apply either way.
    pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Config::default(),
        };
        Self::apply_env(&mut config);
        Ok(config)
    }

    /// Replace every `${NAME}` in the string values under `value`.
    fn expand_env_vars<F>(value: &mut toml::Value, pattern: &Regex, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match value {
            toml::Value::String(text) => {
                let mut missing = None;
                let expanded = pattern
                    .replace_all(text, |caps: &Captures| {
                        lookup(&caps[1]).unwrap_or_else(|| {
                            missing.get_or_insert_with(|| caps[1].to_string());
                            String::new()
                        })
                    })
                    .into_owned();
                if let Some(name) = missing {
                    return Err(ConfigError::UnsetVariable(name));
                }
                *text = expanded;
            }
            toml::Value::Array(items) => {
                for item in items {
                    Self::expand_env_vars(item, pattern, lookup)?;
                }
            }
            toml::Value::Table(table) => {
                for (_, item) in table.iter_mut() {
                    Self::expand_env_vars(item, pattern, lookup)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Expand shell-style paths (e.g., `~/.dakoku`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }

    /// Overlay credential and schedule variables from the process environment.
    pub fn apply_env(config: &mut Config) {
        Self::apply_env_from(config, |key| std::env::var(key).ok());
    }

    /// Overlay variables read through `lookup`. Empty values are ignored.
    pub fn apply_env_from<F>(config: &mut Config, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("JOBCAN_URL") {
            config.jobcan.url = v;
        }
        if let Some(v) = get("JOBCAN_EMAIL") {
            config.jobcan.email = Some(v);
        }
        if let Some(v) = get("JOBCAN_PASSWORD") {
            config.jobcan.password = Some(v);
        }

        if let Some(v) = get("SLACKWF_URL") {
            config.slackwf.url = v;
        }
        if let Some(v) = get("SLACKWF_WORKSPACE") {
            config.slackwf.workspace = Some(v);
        }
        if let Some(v) = get("SLACKWF_GOOGLE_EMAIL") {
            config.slackwf.google_email = Some(v);
        }
        if let Some(v) = get("SLACKWF_GOOGLE_PASSWORD") {
            config.slackwf.google_password = Some(v);
        }
        if let Some(v) = get("SLACKWF_CHANNEL_URL") {
            config.slackwf.channel_url = Some(v);
        }

        if let Some(v) = get("DAKOKU_START_TIME") {
            config.schedule.start = v;
        }
        if let Some(v) = get("DAKOKU_END_TIME") {
            config.schedule.end = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TransplantMode;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.schedule.start, "09:00");
        assert_eq!(config.browser.debug_port, 9222);
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
            [jobcan]
            email = "user@example.com"
            password = "hunter2"
            notice = "在宅"

            [slackwf]
            workspace = "acme"
            channel_url = "https://app.slack.com/client/T000/C000"
            transplant = "same_context_tab"

            [schedule]
            start = "10:00"
            end = "19:30"

            [runtime]
            pid_file = "/tmp/dakoku.pid"
            keep_open = false
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.jobcan.email.as_deref(), Some("user@example.com"));
        assert_eq!(config.jobcan.notice, "在宅");
        assert_eq!(config.slackwf.workspace.as_deref(), Some("acme"));
        assert_eq!(config.slackwf.transplant, TransplantMode::SameContextTab);
        assert_eq!(config.schedule.end, "19:30");
        assert_eq!(config.runtime.pid_file, PathBuf::from("/tmp/dakoku.pid"));
        assert!(!config.runtime.keep_open);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[browser]").unwrap();
        writeln!(file, "debug_port = 9333").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.browser.debug_port, 9333);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/dakoku.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = ConfigLoader::load_or_default(None).unwrap();
        assert_eq!(config.schedule.end.len(), 5);
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "[jobcan]\npassword = \"${DAKOKU_NONEXISTENT_TEST_VAR_12345}\"";
        let result = ConfigLoader::load_str_with(content, |_| None);
        assert!(matches!(
            result,
            Err(ConfigError::UnsetVariable(ref name)) if name == "DAKOKU_NONEXISTENT_TEST_VAR_12345"
        ));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let content = "# ${ONLY_IN_A_COMMENT}\n[jobcan]\nnotice = \"costs $5\"";
        let config = ConfigLoader::load_str_with(content, |_| None).unwrap();
        assert_eq!(config.jobcan.notice, "costs $5");
    }

    #[test]
    fn test_expanded_value_keeps_quotes_and_backslashes() {
        let content = r#"
            [jobcan]
            email = "${JOBCAN_USER}@example.com"
            password = "${JOBCAN_SECRET}"
        "#;
        let config = ConfigLoader::load_str_with(content, |name| match name {
            "JOBCAN_USER" => Some("taro".to_string()),
            "JOBCAN_SECRET" => Some(r#"p"a\ss\n"#.to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.jobcan.email.as_deref(), Some("taro@example.com"));
        assert_eq!(config.jobcan.password.as_deref(), Some(r#"p"a\ss\n"#));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = ConfigLoader::expand_path("~/test");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/test"));
    }

    #[test]
    fn test_apply_env_overrides_credentials() {
        let env: HashMap<&str, &str> = [
            ("JOBCAN_EMAIL", "env@example.com"),
            ("JOBCAN_PASSWORD", "from-env"),
            ("SLACKWF_GOOGLE_EMAIL", "g@example.com"),
            ("SLACKWF_CHANNEL_URL", "https://app.slack.com/client/T1/C1"),
            ("DAKOKU_START_TIME", "08:30"),
        ]
        .into_iter()
        .collect();

        let mut config = ConfigLoader::load_str(
            r#"
            [jobcan]
            email = "file@example.com"
        "#,
        )
        .unwrap();
        ConfigLoader::apply_env_from(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.jobcan.email.as_deref(), Some("env@example.com"));
        assert_eq!(config.jobcan.password.as_deref(), Some("from-env"));
        assert_eq!(config.slackwf.google_email.as_deref(), Some("g@example.com"));
        assert_eq!(
            config.slackwf.channel_url.as_deref(),
            Some("https://app.slack.com/client/T1/C1")
        );
        assert_eq!(config.schedule.start, "08:30");
        assert_eq!(config.schedule.end, "18:00");
    }

    #[test]
    fn test_apply_env_ignores_blank_values() {
        let mut config = ConfigLoader::load_str(
            r#"
            [slackwf]
            workspace = "acme"
        "#,
        )
        .unwrap();
        ConfigLoader::apply_env_from(&mut config, |k| {
            (k == "SLACKWF_WORKSPACE").then(|| "   ".to_string())
        });
        assert_eq!(config.slackwf.workspace.as_deref(), Some("acme"));
    }
}
