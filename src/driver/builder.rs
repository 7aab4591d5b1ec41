//! Builder pattern for driver configuration.
//!
//! Provides a fluent API for configuring and connecting [`Driver`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use webdriver_bidi::Driver;
//!
//! # async fn example() -> webdriver_bidi::Result<()> {
//! let driver = Driver::builder()
//!     .command_timeout(Duration::from_secs(10))
//!     .connect("ws://127.0.0.1:4444/session/abc")
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::launcher::BrowserLauncher;
use crate::transport::connection::DEFAULT_CONNECT_TIMEOUT;
use crate::transport::{BidiCodec, ChromiumBridge, Connection, MapperSource, MessageCodec};

use super::core::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_MAX_PENDING_COMMANDS, Driver};

// ============================================================================
// DriverConfig
// ============================================================================

/// Validated driver settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DriverConfig {
    /// Default deadline for commands.
    pub command_timeout: Duration,
    /// Deadline for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Outstanding command limit.
    pub max_pending: usize,
}

// ============================================================================
// DriverBuilder
// ============================================================================

/// Builder for configuring a [`Driver`] instance.
///
/// Use [`Driver::builder()`] to create a new builder.
#[derive(Clone, Default)]
pub struct DriverBuilder {
    /// Default command deadline.
    command_timeout: Option<Duration>,
    /// WebSocket handshake deadline.
    connect_timeout: Option<Duration>,
    /// Outstanding command limit.
    max_pending: Option<usize>,
    /// Explicit codec.
    codec: Option<Arc<dyn MessageCodec>>,
}

impl fmt::Debug for DriverBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverBuilder")
            .field("command_timeout", &self.command_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_pending", &self.max_pending)
            .field("codec", &self.codec.as_ref().map(|codec| codec.name()))
            .finish()
    }
}

// ============================================================================
// DriverBuilder Implementation
// ============================================================================

impl DriverBuilder {
    /// Creates a new driver builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default deadline for commands (30s if unset).
    #[inline]
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Sets the WebSocket handshake deadline (30s if unset).
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the outstanding command limit (1000 if unset).
    #[inline]
    #[must_use]
    pub fn max_pending_commands(mut self, max: usize) -> Self {
        self.max_pending = Some(max);
        self
    }

    /// Sets the wire codec directly.
    #[inline]
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn MessageCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Speaks BiDi through a CDP connection using the given mapper.
    #[inline]
    #[must_use]
    pub fn chromium_bridge(self, mapper: MapperSource) -> Self {
        self.codec(Arc::new(ChromiumBridge::new(mapper)))
    }

    /// Connects to a BiDi (or, with a bridge codec, CDP) WebSocket URL.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a setting is invalid
    /// - [`Error::Connection`] / [`Error::ConnectionTimeout`] if the socket cannot be opened
    /// - [`Error::BridgeBootstrap`] if the CDP bridge fails to bootstrap
    pub async fn connect(self, url: &str) -> Result<Driver> {
        let config = self.validate()?;
        let codec = self.codec.unwrap_or_else(|| Arc::new(BidiCodec));

        Driver::connect_with(url, codec, config).await
    }

    /// Connects to the browser a launcher has started.
    ///
    /// Uses the launcher's codec unless one was set on the builder.
    ///
    /// # Errors
    ///
    /// - [`Error::BrowserNotReady`] if the launcher has no WebSocket URL
    /// - everything [`DriverBuilder::connect`] returns
    pub async fn connect_launcher<L>(self, launcher: &L) -> Result<Driver>
    where
        L: BrowserLauncher + ?Sized,
    {
        let url = launcher
            .websocket_url()
            .ok_or_else(|| Error::browser_not_ready("launcher has not started a browser"))?;

        let builder = match self.codec {
            Some(_) => self,
            None => {
                let codec = launcher.create_codec();
                self.codec(codec)
            }
        };

        builder.connect(&url).await
    }

    /// Builds a driver over an already open connection.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a setting is invalid
    /// - [`Error::BridgeBootstrap`] if the CDP bridge fails to bootstrap
    pub async fn attach(self, connection: Connection) -> Result<Driver> {
        let config = self.validate()?;
        let codec = self.codec.unwrap_or_else(|| Arc::new(BidiCodec));

        Driver::from_connection(connection, codec, config).await
    }
}

// ============================================================================
// Validation
// ============================================================================

impl DriverBuilder {
    /// Validates settings and fills in defaults.
    fn validate(&self) -> Result<DriverConfig> {
        let command_timeout = self.command_timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT);
        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let max_pending = self.max_pending.unwrap_or(DEFAULT_MAX_PENDING_COMMANDS);

        if command_timeout.is_zero() {
            return Err(Error::config("Command timeout must be greater than zero"));
        }

        if connect_timeout.is_zero() {
            return Err(Error::config("Connect timeout must be greater than zero"));
        }

        if max_pending == 0 {
            return Err(Error::config(
                "Pending command limit must be at least 1",
            ));
        }

        Ok(DriverConfig {
            command_timeout,
            connect_timeout,
            max_pending,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
