//! BiDi driver module.
//!
//! This module provides the main entry point for browser automation.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Driver`] | Command correlation, event dispatch, module access |
//! | [`DriverBuilder`] | Fluent configuration builder |
//!
//! # Example
//!
//! ```no_run
//! use webdriver_bidi::Driver;
//!
//! # async fn example() -> webdriver_bidi::Result<()> {
//! let driver = Driver::builder()
//!     .connect("ws://127.0.0.1:4444/session/abc")
//!     .await?;
//!
//! driver.session().subscribe(&["browsingContext.contextCreated"]).await?;
//! driver.browsing_context().on_context_created().add_observer(|info| {
//!     println!("new context {}", info.context);
//! });
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for driver configuration.
pub mod builder;

/// Core driver implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_MAX_PENDING_COMMANDS, Driver};
pub(crate) use self::core::DriverInner;
pub use builder::DriverBuilder;
