//! Chromium launcher.
//!
//! Spawns Chromium with `--remote-debugging-port`, reads its stderr until the
//! `DevTools listening on ws://...` line appears and exposes that URL to the
//! driver. That endpoint only speaks CDP, so a launcher always carries a
//! mapper and the driver talks BiDi through the [`ChromiumBridge`].
//!
//! # Example
//!
//! ```no_run
//! use webdriver_bidi::{BrowserLauncher, ChromeLauncher, ChromeOptions, Driver, MapperSource};
//!
//! # async fn example() -> webdriver_bidi::Result<()> {
//! let mut launcher = ChromeLauncher::builder()
//!     .binary("/usr/bin/chromium")
//!     .options(ChromeOptions::headless())
//!     .mapper(MapperSource::file("mapperTab.js"))
//!     .build()?;
//!
//! let driver = Driver::launch(&mut launcher, Driver::builder()).await?;
//! driver.browsing_context().create_tab().await?;
//!
//! driver.close().await;
//! launcher.stop().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, const_mutex};
use regex::Regex;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::transport::{ChromiumBridge, MapperSource, MessageCodec};

use super::BrowserLauncher;
use super::options::ChromeOptions;

// ============================================================================
// Constants
// ============================================================================

/// Default deadline for the browser to print its DevTools URL.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Line Chromium prints once remote debugging is listening.
const DEVTOOLS_PATTERN: &str = r"DevTools listening on (ws://\S+)";

/// Serializes "bind port 0, read, release" across launchers.
static PORT_LOCK: Mutex<()> = const_mutex(());

// ============================================================================
// Port Allocation
// ============================================================================

/// Picks a free local TCP port.
fn allocate_port() -> Result<u16> {
    let _guard = PORT_LOCK.lock();
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    let port = listener.local_addr()?.port();
    debug!(port, "Allocated debugging port");
    Ok(port)
}

// ============================================================================
// ProcessGuard
// ============================================================================

/// Guards a child process and kills it when dropped.
#[derive(Debug)]
struct ProcessGuard {
    child: Option<Child>,
    pid: u32,
}

impl ProcessGuard {
    fn new(child: Child) -> Self {
        let pid = child.id().unwrap_or(0);
        debug!(pid, "Process guard created");
        Self {
            child: Some(child),
            pid,
        }
    }

    /// Kills the process and waits for it to exit.
    async fn kill(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        debug!(pid = self.pid, "Killing browser process");
        if let Err(e) = child.kill().await {
            // Already exited on its own.
            if child.try_wait().ok().flatten().is_none() {
                return Err(Error::shutdown_failed(format!(
                    "Failed to kill process {}: {e}",
                    self.pid
                )));
            }
        }

        info!(pid = self.pid, "Process terminated");
        Ok(())
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take()
            && let Err(e) = child.start_kill()
        {
            debug!(pid = self.pid, error = %e, "Failed to send kill signal in Drop");
        }
    }
}

// ============================================================================
// RunningBrowser
// ============================================================================

/// A launched browser and what keeps it alive.
#[derive(Debug)]
struct RunningBrowser {
    process: ProcessGuard,
    websocket_url: String,
    /// Deleted after the process is gone.
    user_data: Option<TempDir>,
}

// ============================================================================
// ChromeLauncher
// ============================================================================

/// Launches Chromium and exposes its DevTools WebSocket URL.
pub struct ChromeLauncher {
    binary: PathBuf,
    options: ChromeOptions,
    mapper: MapperSource,
    startup_timeout: Duration,
    devtools_pattern: Regex,
    running: Option<RunningBrowser>,
}

impl fmt::Debug for ChromeLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromeLauncher")
            .field("binary", &self.binary)
            .field("options", &self.options)
            .field("mapper", &self.mapper)
            .field("startup_timeout", &self.startup_timeout)
            .field("websocket_url", &self.websocket_url())
            .finish()
    }
}

impl ChromeLauncher {
    /// Creates a launcher builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ChromeLauncherBuilder {
        ChromeLauncherBuilder::new()
    }

    /// Path of the browser executable.
    #[inline]
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Returns `true` while a launched browser is tracked.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Process id of the running browser.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.running.as_ref().map(|running| running.process.pid)
    }

    /// Extracts the DevTools URL from one stderr line.
    fn match_devtools_url(&self, line: &str) -> Option<String> {
        self.devtools_pattern
            .captures(line)
            .and_then(|captures| captures.get(1))
            .map(|url| url.as_str().to_string())
    }

    /// Reads stderr until the DevTools URL appears.
    async fn read_devtools_url(
        &self,
        lines: &mut Lines<BufReader<ChildStderr>>,
    ) -> Result<String> {
        while let Some(line) = lines.next_line().await? {
            trace!(%line, "Browser stderr");
            if let Some(url) = self.match_devtools_url(&line) {
                return Ok(url);
            }
        }

        Err(Error::browser_not_ready(
            "Browser exited before printing its DevTools URL",
        ))
    }

    /// Spawns the browser process.
    fn spawn_process(&self, user_data_dir: &Path, port: u16) -> Result<Child> {
        let mut cmd = Command::new(&self.binary);

        cmd.args(self.options.to_launch_args(user_data_dir, port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.spawn().map_err(Error::process_launch_failed)
    }
}

// ============================================================================
// BrowserLauncher Implementation
// ============================================================================

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn start(&mut self) -> Result<()> {
        if !self.binary.exists() {
            return Err(Error::executable_not_found(&self.binary));
        }
        Ok(())
    }

    async fn launch_browser(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(Error::invalid_argument("Browser is already running"));
        }

        if !self.binary.exists() {
            return Err(Error::executable_not_found(&self.binary));
        }

        let (user_data_dir, user_data) = match &self.options.user_data_dir {
            Some(path) => (path.clone(), None),
            None => {
                let temp = TempDir::with_prefix("webdriver-bidi-")?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };

        let port = match self.options.remote_debugging_port {
            Some(port) => port,
            None => allocate_port()?,
        };

        let mut child = self.spawn_process(&user_data_dir, port)?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::browser_not_ready("Browser stderr was not captured"))?;
        let mut process = ProcessGuard::new(child);

        let mut lines = BufReader::new(stderr).lines();
        let scraped = timeout(self.startup_timeout, self.read_devtools_url(&mut lines)).await;

        let websocket_url = match scraped {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                let _ = process.kill().await;
                return Err(e);
            }
            Err(_) => {
                let _ = process.kill().await;
                return Err(Error::browser_not_ready(format!(
                    "No DevTools URL within {}ms",
                    self.startup_timeout.as_millis()
                )));
            }
        };

        // Keep the pipe drained so the browser never blocks on stderr.
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                trace!(%line, "Browser stderr");
            }
        });

        info!(pid = process.pid, port, url = %websocket_url, "Browser launched");

        self.running = Some(RunningBrowser {
            process,
            websocket_url,
            user_data,
        });
        Ok(())
    }

    async fn quit_browser(&mut self) -> Result<()> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };

        running.process.kill().await?;

        if let Some(user_data) = running.user_data.take()
            && let Err(e) = user_data.close()
        {
            warn!(error = %e, "Failed to remove temporary user data directory");
        }

        Ok(())
    }

    fn websocket_url(&self) -> Option<String> {
        self.running
            .as_ref()
            .map(|running| running.websocket_url.clone())
    }

    fn create_codec(&self) -> Arc<dyn MessageCodec> {
        Arc::new(ChromiumBridge::new(self.mapper.clone()))
    }
}

// ============================================================================
// ChromeLauncherBuilder
// ============================================================================

/// Builder for [`ChromeLauncher`].
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncherBuilder {
    binary: Option<PathBuf>,
    options: ChromeOptions,
    mapper: Option<MapperSource>,
    startup_timeout: Option<Duration>,
}

impl ChromeLauncherBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the browser executable.
    #[inline]
    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Sets the command-line options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ChromeOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the mapper that bridges BiDi over CDP (required).
    #[inline]
    #[must_use]
    pub fn mapper(mut self, mapper: MapperSource) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// Sets the deadline for the DevTools URL to appear (30s if unset).
    #[inline]
    #[must_use]
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    /// Validates the configuration and builds the launcher.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the binary or mapper is unset, or an option is invalid
    /// - [`Error::ExecutableNotFound`] if the binary does not exist
    pub fn build(self) -> Result<ChromeLauncher> {
        let binary = self.binary.ok_or_else(|| {
            Error::config(
                "Browser binary path is required. Use .binary() to set it.\n\
                 Example: ChromeLauncher::builder().binary(\"/usr/bin/chromium\")",
            )
        })?;

        if !binary.exists() {
            return Err(Error::executable_not_found(&binary));
        }

        // The DevTools endpoint has no native BiDi.
        let mapper = self.mapper.ok_or_else(|| {
            Error::config(
                "A mapper is required to drive Chromium over CDP. Use .mapper() to set it.\n\
                 Example: ChromeLauncher::builder().mapper(MapperSource::file(\"mapperTab.js\"))",
            )
        })?;

        self.options.validate()?;

        let startup_timeout = self.startup_timeout.unwrap_or(DEFAULT_STARTUP_TIMEOUT);
        if startup_timeout.is_zero() {
            return Err(Error::config("Startup timeout must be greater than zero"));
        }

        let devtools_pattern = Regex::new(DEVTOOLS_PATTERN)
            .map_err(|e| Error::config(format!("Invalid DevTools pattern: {e}")))?;

        Ok(ChromeLauncher {
            binary,
            options: self.options,
            mapper,
            startup_timeout,
            devtools_pattern,
            running: None,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
