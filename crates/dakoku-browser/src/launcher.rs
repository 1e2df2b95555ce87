//! Chrome discovery and launch.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cdp::CdpClient;
use crate::chrome::CdpBrowser;
use crate::error::BrowserError;
use crate::page::{Browser, Launcher};

const STARTUP_POLL: Duration = Duration::from_millis(200);

/// Browser launch configuration.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Chrome executable. Auto-detected when unset.
    pub chrome_path: Option<PathBuf>,
    /// Remote debugging port. 0 lets Chrome pick a free one.
    pub debug_port: u16,
    pub headless: bool,
    /// Delay before each input action.
    pub slow_mo: Duration,
    /// Profile directory. A temporary profile is used when unset.
    pub profile_dir: Option<PathBuf>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// How long to wait for the debugger endpoint to come up.
    pub startup_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            debug_port: 9222,
            headless: false,
            slow_mo: Duration::from_millis(100),
            profile_dir: None,
            viewport_width: 1280,
            viewport_height: 720,
            startup_timeout: Duration::from_secs(15),
        }
    }
}

/// Get the CDP endpoint URL for a port.
pub fn endpoint(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

/// Launches a fresh Chrome with remote debugging and connects to it.
pub struct ChromeLauncher {
    options: LaunchOptions,
}

impl ChromeLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Find Chrome executable path.
    pub fn find_chrome() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        let paths: &[&str] = &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];

        #[cfg(target_os = "linux")]
        let paths: &[&str] = &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];

        #[cfg(target_os = "windows")]
        let paths: &[&str] = &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        let paths: &[&str] = &[];

        paths.iter().map(PathBuf::from).find(|p| p.exists())
    }

    /// Command-line flags for a debugging-enabled Chrome.
    pub fn chrome_args(&self, port: u16, profile_dir: &Path) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", port),
            format!("--user-data-dir={}", profile_dir.display()),
            format!(
                "--window-size={},{}",
                self.options.viewport_width, self.options.viewport_height
            ),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-sync".to_string(),
            "--disable-translate".to_string(),
            "--metrics-recording-only".to_string(),
        ];

        if self.options.headless {
            args.push("--headless=new".to_string());
        }

        args.push("about:blank".to_string());
        args
    }

    fn spawn(&self, chrome_path: &Path, port: u16, profile_dir: &Path) -> Result<Child, BrowserError> {
        info!("Launching Chrome with profile at: {}", profile_dir.display());

        let child = Command::new(chrome_path)
            .args(self.chrome_args(port, profile_dir))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        info!("Chrome launched with PID: {:?}", child.id());
        Ok(child)
    }

    /// Check if something already serves `/json/version` on the port.
    async fn is_endpoint_alive(port: u16) -> bool {
        reqwest::get(format!("{}/json/version", endpoint(port)))
            .await
            .is_ok()
    }

    /// Wait for Chrome to write the port it picked into `DevToolsActivePort`.
    async fn read_active_port(profile_dir: &Path, deadline: Instant) -> Option<u16> {
        let file = profile_dir.join("DevToolsActivePort");
        loop {
            if let Ok(contents) = tokio::fs::read_to_string(&file).await {
                if let Some(port) = parse_active_port(&contents) {
                    return Some(port);
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(STARTUP_POLL).await;
        }
    }
}

/// First line of `DevToolsActivePort` is the port number.
pub fn parse_active_port(contents: &str) -> Option<u16> {
    contents.lines().next()?.trim().parse().ok().filter(|p| *p != 0)
}

#[async_trait]
impl Launcher for ChromeLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowserError> {
        let chrome_path = match &self.options.chrome_path {
            Some(path) if path.exists() => path.clone(),
            Some(path) => {
                warn!("Configured Chrome not found at {}, searching", path.display());
                Self::find_chrome().ok_or(BrowserError::ChromeNotFound)?
            }
            None => Self::find_chrome().ok_or(BrowserError::ChromeNotFound)?,
        };

        let (profile_dir, temp_profile) = match &self.options.profile_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| {
                    BrowserError::LaunchFailed(format!("profile dir {}: {}", dir.display(), e))
                })?;
                (dir.clone(), None)
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("dakoku-profile-")
                    .tempdir()
                    .map_err(|e| BrowserError::LaunchFailed(format!("temp profile: {}", e)))?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };

        let mut port = self.options.debug_port;
        if port != 0 && Self::is_endpoint_alive(port).await {
            warn!(
                "Port {} already has a debugger attached, letting Chrome pick a free port",
                port
            );
            port = 0;
        }
        if port == 0 {
            let _ = std::fs::remove_file(profile_dir.join("DevToolsActivePort"));
        }

        let child = self.spawn(&chrome_path, port, &profile_dir)?;
        let deadline = Instant::now() + self.options.startup_timeout;

        if port == 0 {
            port = Self::read_active_port(&profile_dir, deadline)
                .await
                .ok_or_else(|| {
                    BrowserError::LaunchFailed("Chrome did not report its debugging port".to_string())
                })?;
            debug!("Chrome picked debugging port {}", port);
        }

        while !Self::is_endpoint_alive(port).await {
            if Instant::now() >= deadline {
                return Err(BrowserError::LaunchFailed(
                    "Chrome failed to start within timeout".to_string(),
                ));
            }
            tokio::time::sleep(STARTUP_POLL).await;
        }

        let client = CdpClient::connect(&endpoint(port)).await?;
        client.discover_targets().await?;
        info!("Connected to Chrome at {}", endpoint(port));

        Ok(Arc::new(CdpBrowser::new(
            client,
            Some(child),
            temp_profile,
            self.options.slow_mo,
        )))
    }
}
