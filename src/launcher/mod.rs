//! Browser launchers.
//!
//! A launcher starts a browser and tells the driver where to connect and
//! which codec to speak.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`BrowserLauncher`] | Launch contract used by [`Driver::launch`](crate::Driver::launch) |
//! | [`ChromeLauncher`] | Spawns Chromium with remote debugging enabled |
//! | [`ChromeOptions`] | Chromium command-line options |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::transport::MessageCodec;

// ============================================================================
// Submodules
// ============================================================================

/// Chromium launcher.
pub mod chrome;

/// Chromium command-line options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use chrome::{ChromeLauncher, ChromeLauncherBuilder, DEFAULT_STARTUP_TIMEOUT};
pub use options::ChromeOptions;

// ============================================================================
// BrowserLauncher
// ============================================================================

/// Starts a browser that speaks BiDi, directly or through a bridge.
///
/// The lifecycle is `start` → `launch_browser` → (driver session) →
/// `quit_browser` → `stop`. `start` and `stop` manage anything that outlives
/// a single browser, such as a separate driver executable.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Prepares the launcher.
    async fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Releases launcher resources, quitting a running browser first.
    async fn stop(&mut self) -> Result<()> {
        self.quit_browser().await
    }

    /// Starts a browser; afterwards [`BrowserLauncher::websocket_url`] is set.
    async fn launch_browser(&mut self) -> Result<()>;

    /// Terminates the browser. Does nothing if none is running.
    async fn quit_browser(&mut self) -> Result<()>;

    /// WebSocket URL of the running browser.
    fn websocket_url(&self) -> Option<String>;

    /// Codec the driver must use to talk to this browser.
    fn create_codec(&self) -> Arc<dyn MessageCodec>;
}
