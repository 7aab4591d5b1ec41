//! Protocol modules.
//!
//! Each module groups the commands and events of one protocol domain. A
//! module owns one [`ObservableEvent`] per event it understands and an
//! [`EventRegistry`] mapping wire method names to those events; the driver
//! routes events to a module by the method prefix before the first `.`.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`SessionModule`] | Status and event subscriptions |
//! | [`BrowsingContextModule`] | Tabs, navigation, context lifecycle events |
//! | [`NetworkModule`] | Request interception and network events |
//! | [`LogModule`] | Console and JavaScript log entries |
//! | [`ScriptModule`] | Script evaluation and realm events |
//!
//! # Custom modules
//!
//! ```
//! use std::sync::Arc;
//! use serde::Deserialize;
//! use webdriver_bidi::Result;
//! use webdriver_bidi::modules::{EventRegistry, Module, ObservableEvent};
//!
//! #[derive(Debug, Clone, Deserialize)]
//! struct Ping {
//!     count: u64,
//! }
//!
//! struct VendorModule {
//!     events: Arc<EventRegistry>,
//!     pinged: ObservableEvent<Ping>,
//! }
//!
//! impl VendorModule {
//!     fn new() -> Result<Self> {
//!         let pinged = ObservableEvent::new("vendor.pinged");
//!         let mut events = EventRegistry::new("vendor");
//!         events.register("vendor.pinged", &pinged)?;
//!         Ok(Self { events: Arc::new(events), pinged })
//!     }
//! }
//!
//! impl Module for VendorModule {
//!     fn name(&self) -> &'static str {
//!         "vendor"
//!     }
//!
//!     fn events(&self) -> Arc<EventRegistry> {
//!         Arc::clone(&self.events)
//!     }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ============================================================================
// Submodules
// ============================================================================

/// `browsingContext` module.
pub mod browsing_context;

/// `log` module.
pub mod log;

/// `network` module.
pub mod network;

/// Observable events and observer handles.
pub mod observable;

/// Event registration table.
pub mod registry;

/// `script` module.
pub mod script;

/// `session` module.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use browsing_context::BrowsingContextModule;
pub use log::LogModule;
pub use network::NetworkModule;
pub use observable::{ObservableEvent, Observer, ObserverFn};
pub use registry::{EventInvoker, EventRegistry};
pub use script::ScriptModule;
pub use session::SessionModule;

// ============================================================================
// Module
// ============================================================================

/// A protocol domain whose events the driver routes by method prefix.
pub trait Module: Send + Sync {
    /// Module name, the method prefix before the first `.`.
    fn name(&self) -> &'static str;

    /// The module's event table.
    fn events(&self) -> Arc<EventRegistry>;
}

// ============================================================================
// EmptyResult
// ============================================================================

/// Result of commands that return an empty object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResult {}
