//! Process supervision errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while managing the worker process.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Failed to create or write the lock file.
    #[error("Failed to write lock file at {path}: {reason}")]
    LockWrite { path: PathBuf, reason: String },

    /// Failed to read the lock file.
    #[error("Failed to read lock file at {path}: {reason}")]
    LockRead { path: PathBuf, reason: String },

    /// Failed to remove the lock file.
    #[error("Failed to remove lock file at {path}: {reason}")]
    LockRemoval { path: PathBuf, reason: String },

    /// Failed to signal another process.
    #[error("Failed to send {signal} to PID {pid}: {reason}")]
    SignalDelivery {
        pid: u32,
        signal: String,
        reason: String,
    },

    /// Failed to set up signal handlers.
    #[error("Failed to set up signal handlers: {0}")]
    SignalSetup(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_write_error() {
        let err = DaemonError::LockWrite {
            path: PathBuf::from("/tmp/dakoku.pid"),
            reason: "read-only file system".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/dakoku.pid"));
        assert!(msg.contains("read-only"));
    }

    #[test]
    fn test_signal_delivery_error() {
        let err = DaemonError::SignalDelivery {
            pid: 4242,
            signal: "SIGTERM".to_string(),
            reason: "EPERM".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("4242"));
        assert!(msg.contains("SIGTERM"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DaemonError = io.into();
        assert!(matches!(err, DaemonError::Io(_)));
    }
}
