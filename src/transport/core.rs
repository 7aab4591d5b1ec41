//! Transport: command identity and wire encoding on top of a [`Connection`].
//!
//! The transport assigns ids, pushes commands through the injected
//! [`MessageCodec`], and decodes inbound frames before handing them on.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::identifiers::{CommandId, IdGenerator};
use crate::protocol::Command;

use super::codec::MessageCodec;
use super::connection::{CloseHandler, Connection};

// ============================================================================
// Types
// ============================================================================

/// Logical-message callback, called with each decoded document.
pub type MessageHandler = Box<dyn Fn(Value) + Send + Sync>;

// ============================================================================
// RawChannel
// ============================================================================

/// Direct access to the connection for codecs that run their own handshake.
///
/// Ids come from the transport's counter, so raw frames never reuse an id
/// that a command could get.
#[derive(Clone, Copy)]
pub struct RawChannel<'a> {
    connection: &'a Connection,
    ids: &'a IdGenerator,
}

impl<'a> RawChannel<'a> {
    /// Allocates the next id.
    #[inline]
    pub fn next_id(&self) -> CommandId {
        self.ids.next_id()
    }

    /// Sends a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// if the connection is closed.
    #[inline]
    pub fn send_text(&self, text: String) -> Result<()> {
        self.connection.send(text)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Command transport over one connection.
pub struct Transport {
    /// Underlying WebSocket.
    connection: Connection,
    /// Wire encoding strategy.
    codec: Arc<dyn MessageCodec>,
    /// Id source for commands and raw frames.
    ids: IdGenerator,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("codec", &self.codec.name())
            .field("connected", &self.connection.is_connected())
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a transport over a connection with the given codec.
    #[must_use]
    pub fn new(connection: Connection, codec: Arc<dyn MessageCodec>) -> Self {
        Self {
            connection,
            codec,
            ids: IdGenerator::new(),
        }
    }

    /// Builds a command with the next id.
    #[must_use]
    pub fn next_command(&self, method: impl Into<String>, params: Value) -> Command {
        Command::new(self.ids.next_id(), method, params)
    }

    /// Encodes and sends a command.
    ///
    /// # Errors
    ///
    /// Returns the codec's error if the command cannot be encoded, or
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed).
    pub fn send(&self, command: &Command) -> Result<()> {
        let text = self.codec.serialize_command(command)?;
        trace!(command_id = %command.id, method = %command.method, "Command encoded");
        self.connection.send(text)
    }

    /// Routes decoded inbound documents to `handler`.
    ///
    /// Frames the codec swallows or cannot decode never reach the handler.
    pub fn on_message(&self, handler: MessageHandler) {
        let codec = Arc::clone(&self.codec);

        self.connection
            .set_data_handler(Box::new(move |data| match codec.deserialize_message(data) {
                Ok(Some(document)) => handler(document),
                Ok(None) => trace!(codec = codec.name(), "Frame carried no message"),
                Err(e) => warn!(error = %e, len = data.len(), "Dropping undecodable frame"),
            }));
    }

    /// Registers the connection-lost callback.
    pub fn on_closed(&self, handler: CloseHandler) {
        self.connection.set_close_handler(handler);
    }

    /// Runs the codec's one-time initialization.
    ///
    /// # Errors
    ///
    /// Returns the codec's initialization error.
    pub async fn initialize(&self) -> Result<()> {
        debug!(codec = self.codec.name(), "Initializing transport");
        self.codec
            .initialize(RawChannel {
                connection: &self.connection,
                ids: &self.ids,
            })
            .await
    }

    /// Returns `true` while the connection is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Closes the underlying connection.
    pub async fn close(&self) {
        self.connection.close().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
