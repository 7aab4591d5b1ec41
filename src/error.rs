//! Error types for the BiDi client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use webdriver_bidi::{Driver, Result};
//!
//! async fn example(driver: &Driver) -> Result<()> {
//!     let created = driver.browsing_context().create_tab().await?;
//!     driver.browsing_context().navigate(&created.context, "https://example.com", None).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`], [`Error::DuplicateRegistration`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Correlation | [`Error::CommandTimeout`] |
//! | Protocol | [`Error::Protocol`], [`Error::MalformedMessage`] |
//! | Bridge | [`Error::BridgeNotReady`], [`Error::BridgeBootstrap`] |
//! | Launcher | [`Error::ExecutableNotFound`], [`Error::ProcessLaunchFailed`], [`Error::BrowserNotReady`], [`Error::ShutdownFailed`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::CommandId;
use crate::transport::chromium::BridgeState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when driver or launcher configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to an API.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// An event method or module name was registered twice.
    #[error("Duplicate registration: {name}")]
    DuplicateRegistration {
        /// The method or module name registered twice.
        name: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the WebSocket connection cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed or lost.
    ///
    /// Returned to every outstanding command when the socket goes away,
    /// and to any send attempted after close.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Correlation Errors
    // ========================================================================
    /// No response arrived for a command within its deadline.
    #[error("Command {command_id} ({method}) timed out after {timeout_ms}ms")]
    CommandTimeout {
        /// The command that timed out.
        command_id: CommandId,
        /// Method name of the command.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The remote end answered with an error response.
    #[error("Protocol error ({code}): {message}")]
    Protocol {
        /// Protocol error code, e.g. `no such frame`.
        code: String,
        /// Human readable message from the remote end.
        message: String,
    },

    /// A frame could not be interpreted.
    #[error("Malformed message: {message}")]
    MalformedMessage {
        /// Description of what was wrong.
        message: String,
    },

    // ========================================================================
    // Bridge Errors
    // ========================================================================
    /// A command was sent through a CDP bridge that has not finished bootstrapping.
    #[error("CDP bridge not ready (state: {state})")]
    BridgeNotReady {
        /// The state the bridge was in.
        state: BridgeState,
    },

    /// A bootstrap step of the CDP bridge failed.
    #[error("CDP bridge bootstrap failed at {step}: {reason}")]
    BridgeBootstrap {
        /// The CDP method of the failing step.
        step: String,
        /// What went wrong.
        reason: String,
    },

    // ========================================================================
    // Launcher Errors
    // ========================================================================
    /// Browser executable not found at path.
    #[error("Browser executable not found at: {path}")]
    ExecutableNotFound {
        /// Path where the executable was expected.
        path: PathBuf,
    },

    /// Failed to spawn the browser process.
    #[error("Failed to launch browser: {message}")]
    ProcessLaunchFailed {
        /// Description of the launch failure.
        message: String,
    },

    /// The browser started but never reported a WebSocket URL.
    #[error("Browser did not report a WebSocket URL: {message}")]
    BrowserNotReady {
        /// Description of what was observed.
        message: String,
    },

    /// Stopping the browser process failed.
    #[error("Browser shutdown failed: {message}")]
    ShutdownFailed {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a duplicate registration error.
    #[inline]
    pub fn duplicate_registration(name: impl Into<String>) -> Self {
        Self::DuplicateRegistration { name: name.into() }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a command timeout error.
    #[inline]
    pub fn command_timeout(command_id: CommandId, method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::CommandTimeout {
            command_id,
            method: method.into(),
            timeout_ms,
        }
    }

    /// Creates a protocol error from an error response.
    #[inline]
    pub fn protocol(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates a bridge not ready error.
    #[inline]
    pub fn bridge_not_ready(state: BridgeState) -> Self {
        Self::BridgeNotReady { state }
    }

    /// Creates a bridge bootstrap error.
    #[inline]
    pub fn bridge_bootstrap(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BridgeBootstrap {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Creates an executable not found error.
    #[inline]
    pub fn executable_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ExecutableNotFound { path: path.into() }
    }

    /// Creates a process launch failed error.
    #[inline]
    pub fn process_launch_failed(err: IoError) -> Self {
        Self::ProcessLaunchFailed {
            message: err.to_string(),
        }
    }

    /// Creates a browser not ready error.
    #[inline]
    pub fn browser_not_ready(message: impl Into<String>) -> Self {
        Self::BrowserNotReady {
            message: message.into(),
        }
    }

    /// Creates a shutdown failed error.
    #[inline]
    pub fn shutdown_failed(message: impl Into<String>) -> Self {
        Self::ShutdownFailed {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::CommandTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the remote end rejected the command.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns `true` if this error came from the CDP bridge.
    #[inline]
    #[must_use]
    pub fn is_bridge_error(&self) -> bool {
        matches!(
            self,
            Self::BridgeNotReady { .. } | Self::BridgeBootstrap { .. }
        )
    }

    /// Returns `true` if this error came from launching or stopping a browser.
    #[inline]
    #[must_use]
    pub fn is_launcher_error(&self) -> bool {
        matches!(
            self,
            Self::ExecutableNotFound { .. }
                | Self::ProcessLaunchFailed { .. }
                | Self::BrowserNotReady { .. }
                | Self::ShutdownFailed { .. }
        )
    }

    /// Returns the protocol error code, if this is an error response.
    #[inline]
    #[must_use]
    pub fn protocol_code(&self) -> Option<&str> {
        match self {
            Self::Protocol { code, .. } => Some(code),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_protocol_error_display() {
        let err = Error::protocol("no such frame", "Context abc not found");
        assert_eq!(
            err.to_string(),
            "Protocol error (no such frame): Context abc not found"
        );
        assert_eq!(err.protocol_code(), Some("no such frame"));
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_command_timeout_display() {
        let err = Error::command_timeout(CommandId::new(7), "session.status", 1500);
        assert_eq!(
            err.to_string(),
            "Command 7 (session.status) timed out after 1500ms"
        );
        assert!(err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        let conn_err = Error::connection("test");
        let timeout_err = Error::ConnectionTimeout { timeout_ms: 1000 };
        let closed_err = Error::ConnectionClosed;
        let other_err = Error::config("test");

        assert!(conn_err.is_connection_error());
        assert!(timeout_err.is_connection_error());
        assert!(closed_err.is_connection_error());
        assert!(!other_err.is_connection_error());
    }

    #[test]
    fn test_bridge_errors() {
        let err = Error::bridge_not_ready(BridgeState::Idle);
        assert!(err.is_bridge_error());
        assert!(err.to_string().contains("Idle"));

        let err = Error::bridge_bootstrap("Runtime.enable", "timed out");
        assert!(err.is_bridge_error());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_launcher_errors() {
        assert!(Error::executable_not_found("/nope/chrome").is_launcher_error());
        assert!(Error::browser_not_ready("no url").is_launcher_error());
        assert!(Error::shutdown_failed("kill failed").is_launcher_error());
        assert!(!Error::ConnectionClosed.is_launcher_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
