//! PID lock file guarding against overlapping automation runs.
//!
//! This is a best-effort liveness check rather than an atomic cross-process
//! mutex: acquisition reads the recorded pid, terminates that process if it is
//! still alive, and overwrites the file with our own pid.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::DaemonError;
use crate::signal::{send_to_pid, StopSignal};

/// Default grace period between SIGTERM and SIGKILL for a leftover run.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// How the lock was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquisition {
    /// No previous lock file existed.
    Fresh,
    /// A lock file referenced a process that was no longer alive.
    RecoveredStale { pid: u32 },
    /// A previous run was still alive and had to be terminated.
    TerminatedPrevious { pid: u32 },
}

/// Lock file holding the pid of the active automation run.
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
    grace_period: Duration,
    owned: bool,
}

impl ProcessLock {
    /// Create a lock handle for the given path. Nothing is touched on disk yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            grace_period: DEFAULT_GRACE_PERIOD,
            owned: false,
        }
    }

    /// Override the SIGTERM → SIGKILL grace period.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Get the lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a lock file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Check if this handle currently owns the lock.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Read the pid recorded in the lock file.
    ///
    /// A file with unparseable contents is treated like a missing one, since it
    /// can only be the leftover of an interrupted write.
    pub fn read_pid(&self) -> Result<Option<u32>, DaemonError> {
        if !self.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| DaemonError::LockRead {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        match contents.trim().parse::<u32>() {
            Ok(pid) => Ok(Some(pid)),
            Err(e) => {
                warn!(
                    "Ignoring malformed lock file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Claim the lock for the current process.
    ///
    /// A live previous run is asked to terminate, given the grace period, and
    /// then killed. The lock is overwritten with our pid in every case.
    pub async fn acquire(&mut self) -> Result<LockAcquisition, DaemonError> {
        let own_pid = std::process::id();

        let acquisition = match self.read_pid()? {
            None => LockAcquisition::Fresh,
            Some(pid) if pid == own_pid => LockAcquisition::Fresh,
            Some(pid) if !is_process_running(pid) => {
                info!("Recovering stale lock (PID {} not running)", pid);
                LockAcquisition::RecoveredStale { pid }
            }
            Some(pid) => {
                info!("Previous run (PID {}) still alive, terminating it", pid);
                self.terminate(pid).await;
                LockAcquisition::TerminatedPrevious { pid }
            }
        };

        self.write_pid_value(own_pid)?;
        Ok(acquisition)
    }

    /// Terminate a previous run: SIGTERM, wait, then SIGKILL if needed.
    async fn terminate(&self, pid: u32) {
        if let Err(e) = send_to_pid(pid, StopSignal::Terminate) {
            warn!("{}", e);
        }

        let step = Duration::from_millis(100);
        let mut waited = Duration::ZERO;
        while waited < self.grace_period {
            if !is_process_running(pid) {
                debug!("PID {} exited after {:?}", pid, waited);
                return;
            }
            tokio::time::sleep(step).await;
            waited += step;
        }

        if is_process_running(pid) {
            warn!("PID {} ignored SIGTERM, sending SIGKILL", pid);
            if let Err(e) = send_to_pid(pid, StopSignal::Kill) {
                warn!("{}", e);
            }
        }
    }

    /// Write a specific pid value to the lock file and mark it owned.
    pub fn write_pid_value(&mut self, pid: u32) -> Result<(), DaemonError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| DaemonError::LockWrite {
                path: self.path.clone(),
                reason: format!("Failed to create parent directory: {}", e),
            })?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| DaemonError::LockWrite {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        write!(file, "{}", pid).map_err(|e| DaemonError::LockWrite {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        self.owned = true;
        info!("Lock file written: {} (PID: {})", self.path.display(), pid);
        Ok(())
    }

    /// Delete the lock file if we own it.
    ///
    /// A lock that has since been overwritten by another run is left alone.
    pub fn release(&mut self) -> Result<(), DaemonError> {
        if !self.owned {
            return Ok(());
        }
        self.owned = false;

        if !self.exists() {
            return Ok(());
        }

        if let Some(pid) = self.read_pid()? {
            if pid != std::process::id() {
                debug!(
                    "Lock file {} now belongs to PID {}, leaving it",
                    self.path.display(),
                    pid
                );
                return Ok(());
            }
        }

        fs::remove_file(&self.path).map_err(|e| DaemonError::LockRemoval {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        info!("Lock file removed: {}", self.path.display());
        Ok(())
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        if self.owned {
            if let Err(e) = self.release() {
                warn!("Failed to remove lock file on drop: {}", e);
            }
        }
    }
}

/// Check if a process with the given pid is alive.
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // Signal 0 only performs the existence/permission check.
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_process_running(_pid: u32) -> bool {
    // Without a liveness probe assume the old run is gone; the lock is best-effort.
    false
}

#[cfg(test)]
#[path = "pid_tests.rs"]
mod tests;
