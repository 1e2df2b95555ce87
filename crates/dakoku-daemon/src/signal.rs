//! Stop requests for the worker, from the OS or from inside the process.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::DaemonError;

/// A request to stop a worker process.
///
/// `Interrupt` and `Terminate` are what a worker receives. `Kill` is only ever
/// sent to another process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
    Kill,
}

impl StopSignal {
    fn code(self) -> u8 {
        match self {
            StopSignal::Interrupt => 1,
            StopSignal::Terminate => 2,
            StopSignal::Kill => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(StopSignal::Interrupt),
            2 => Some(StopSignal::Terminate),
            3 => Some(StopSignal::Kill),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StopSignal::Interrupt => "SIGINT",
            StopSignal::Terminate => "SIGTERM",
            StopSignal::Kill => "SIGKILL",
        }
    }
}

impl std::fmt::Display for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Broadcasts stop requests to every watcher of the current run.
///
/// Clones share the same channel and the same latch. The latch keeps the
/// first request so a run that subscribes late still sees it.
#[derive(Clone)]
pub struct SignalHandler {
    tx: broadcast::Sender<StopSignal>,
    requested: Arc<AtomicU8>,
}

impl SignalHandler {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(4);
        Self {
            tx,
            requested: Arc::new(AtomicU8::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StopSignal> {
        self.tx.subscribe()
    }

    /// Record a stop request and wake every subscriber.
    pub fn stop(&self, signal: StopSignal) {
        let first = self
            .requested
            .compare_exchange(0, signal.code(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        debug!(%signal, first, "Stop requested");
        // No subscriber yet is fine, the latch still records it
        let _ = self.tx.send(signal);
    }

    /// The first stop request received, if any.
    pub fn requested(&self) -> Option<StopSignal> {
        StopSignal::from_code(self.requested.load(Ordering::SeqCst))
    }

    pub fn is_stopping(&self) -> bool {
        self.requested().is_some()
    }

    /// Forward SIGINT and SIGTERM to [`SignalHandler::stop`] for the rest of
    /// the process lifetime.
    #[cfg(unix)]
    pub async fn setup_os_signals(&self) -> Result<(), DaemonError> {
        use tokio::signal::unix::{signal, SignalKind};

        let listen = |kind: SignalKind| {
            signal(kind).map_err(|e| DaemonError::SignalSetup(e.to_string()))
        };
        let mut interrupt = listen(SignalKind::interrupt())?;
        let mut terminate = listen(SignalKind::terminate())?;

        let handler = self.clone();
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    Some(()) = interrupt.recv() => StopSignal::Interrupt,
                    Some(()) = terminate.recv() => StopSignal::Terminate,
                    else => break,
                };
                info!("Received {}", received);
                handler.stop(received);
            }
        });

        debug!("Listening for SIGINT and SIGTERM");
        Ok(())
    }

    #[cfg(not(unix))]
    pub async fn setup_os_signals(&self) -> Result<(), DaemonError> {
        let handler = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C");
                handler.stop(StopSignal::Interrupt);
            }
        });

        debug!("Listening for Ctrl+C");
        Ok(())
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver `signal` to another process.
#[cfg(unix)]
pub fn send_to_pid(pid: u32, signal: StopSignal) -> Result<(), DaemonError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let delivery_error = |reason: String| DaemonError::SignalDelivery {
        pid,
        signal: signal.name().to_string(),
        reason,
    };

    let raw = i32::try_from(pid).map_err(|e| delivery_error(e.to_string()))?;
    let os_signal = match signal {
        StopSignal::Interrupt => Signal::SIGINT,
        StopSignal::Terminate => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    };
    kill(Pid::from_raw(raw), os_signal).map_err(|e| delivery_error(e.to_string()))?;

    info!("Sent {} to PID {}", signal, pid);
    Ok(())
}

#[cfg(not(unix))]
pub fn send_to_pid(pid: u32, signal: StopSignal) -> Result<(), DaemonError> {
    tracing::warn!("Cannot deliver {} to PID {} on this platform", signal, pid);
    Err(DaemonError::SignalDelivery {
        pid,
        signal: signal.name().to_string(),
        reason: "unsupported platform".to_string(),
    })
}
