//! WebSocket transport layer.
//!
//! This module handles communication between the local end (Rust) and the
//! remote end (a BiDi endpoint, or a Chromium CDP endpoint bridged to BiDi).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Driver (Rust)  │                              │  Browser        │
//! │                 │         WebSocket            │                 │
//! │  Transport      │◄────────────────────────────►│  BiDi endpoint  │
//! │  → Codec        │                              │  or CDP +       │
//! │  → Connection   │                              │  mapper tab     │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::connect` - Open the WebSocket
//! 2. `Transport::on_message` - Wire decoded frames to the driver
//! 3. `Transport::initialize` - Run the codec handshake (CDP bridge bootstrap)
//! 4. `Transport::send` - Encode and send commands
//! 5. `Transport::close` - Close the socket
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `chromium` | BiDi-over-CDP bridge codec |
//! | `codec` | Codec trait and native BiDi codec |
//! | `connection` | WebSocket connection and event loop |
//! | `core` | Id assignment and codec plumbing |

// ============================================================================
// Submodules
// ============================================================================

/// BiDi-over-CDP bridge for Chromium.
pub mod chromium;

/// Wire codecs.
pub mod codec;

/// WebSocket connection and event loop.
pub mod connection;

/// Transport core.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use chromium::{BridgeState, ChromiumBridge, MapperSource};
pub use codec::{BidiCodec, MessageCodec};
pub use connection::{CloseHandler, Connection, DataHandler};
pub use self::core::{MessageHandler, RawChannel, Transport};
