//! WebDriver BiDi - asynchronous browser automation client.
//!
//! This library drives a browser over a persistent WebSocket using the
//! WebDriver BiDi protocol: typed commands resolve by id in any order while
//! unsolicited events fan out to observers.
//!
//! # Architecture
//!
//! - **Connection**: one WebSocket, one reader task
//! - **Transport**: assigns command ids, encodes and decodes through a [`MessageCodec`]
//! - **Driver**: pending command table, dispatch, module table
//! - **Modules**: per-domain commands and [`ObservableEvent`]s
//!
//! Chromium does not speak BiDi natively. The [`ChromiumBridge`] codec
//! bootstraps a mapper script in a hidden tab over CDP and then tunnels
//! every BiDi command through it, so the rest of the stack is unchanged.
//!
//! # Quick Start
//!
//! ```no_run
//! use webdriver_bidi::{Driver, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let driver = Driver::builder()
//!         .connect("ws://127.0.0.1:9222/session")
//!         .await?;
//!
//!     driver.session().subscribe(&["log.entryAdded"]).await?;
//!     driver.log().on_entry_added().add_observer(|entry| {
//!         println!("[{}] {:?}", entry.level, entry.text);
//!     });
//!
//!     let tab = driver.browsing_context().create_tab().await?;
//!     driver
//!         .browsing_context()
//!         .navigate(&tab.context, "https://example.com", None)
//!         .await?;
//!
//!     driver.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`driver`] | [`Driver`] and [`DriverBuilder`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`launcher`] | [`BrowserLauncher`] and [`ChromeLauncher`] |
//! | [`modules`] | Protocol modules and observable events |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | Connection, codecs, CDP bridge |

// ============================================================================
// Modules
// ============================================================================

/// Driver façade and configuration.
///
/// Use [`Driver::builder()`] to configure and connect a driver.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Browser launchers.
pub mod launcher;

/// Protocol modules: session, browsingContext, network, log, script.
pub mod modules;

/// Wire message types.
pub mod protocol;

/// WebSocket transport layer and codecs.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Driver types
pub use driver::{Driver, DriverBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{BrowsingContextId, CommandId, ObserverId};

// Launcher types
pub use launcher::{BrowserLauncher, ChromeLauncher, ChromeOptions};

// Module types
pub use modules::{Module, ObservableEvent, Observer};

// Transport types
pub use transport::{BidiCodec, BridgeState, ChromiumBridge, MapperSource, MessageCodec};
