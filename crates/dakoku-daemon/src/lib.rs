//! # dakoku-daemon
//!
//! Process supervision for automation workers.
//!
//! ## Features
//!
//! - PID lock file that keeps at most one automation run alive
//! - Stale-run recovery (terminate a leftover worker, then take over its lock)
//! - Signal handling (SIGTERM/SIGINT) broadcast to every watcher
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dakoku_daemon::{ProcessLock, SignalHandler};
//!
//! let mut lock = ProcessLock::new("temp/dakoku.pid");
//! lock.acquire().await?;
//!
//! let signals = SignalHandler::new();
//! signals.setup_os_signals().await?;
//! ```

pub mod error;
pub mod pid;
pub mod signal;

pub use error::DaemonError;
pub use pid::{LockAcquisition, ProcessLock};
pub use signal::{SignalHandler, StopSignal};
