//! Errors raised while loading configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Bad variable pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// `${NAME}` in the file refers to an unset variable.
    #[error("Environment variable {0} is referenced but not set")]
    UnsetVariable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let missing = ConfigError::NotFound(PathBuf::from("dakoku.toml"));
        assert_eq!(missing.to_string(), "Config file not found: dakoku.toml");

        let unset = ConfigError::UnsetVariable("JOBCAN_PASSWORD".to_string());
        assert!(unset.to_string().contains("JOBCAN_PASSWORD"));
    }

    #[test]
    fn test_read_error_keeps_source() {
        use std::error::Error as _;

        let err = ConfigError::Read {
            path: PathBuf::from("/etc/dakoku.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/etc/dakoku.toml"));
        assert!(err.source().is_some());
    }
}
