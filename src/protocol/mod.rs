//! Protocol message types.
//!
//! This module defines the message format for communication between
//! local end (Rust) and remote end (browser or mapper).
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Command` | Local → Remote | Command with correlation id |
//! | `Response` | Remote → Local | Success or error result for one command |
//! | `Event` | Remote → Local | Browser notification |
//!
//! # Command Naming
//!
//! Commands and events follow `module.methodName` format:
//!
//! - `browsingContext.navigate`
//! - `session.subscribe`
//! - `network.beforeRequestSent`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `cdp` | CDP envelope used by the Chromium bridge |
//! | `event` | Event type and inbound classification |
//! | `request` | Command and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// CDP envelope types.
pub mod cdp;

/// Event message types.
pub mod event;

/// Command and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use cdp::{BindingCalled, CdpCommand, CdpError, CdpMessage};
pub use event::{Event, Message};
pub use request::{Command, Response, ResponseType};
