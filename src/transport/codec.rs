//! Wire codecs.
//!
//! A [`MessageCodec`] decides how a [`Command`] becomes a frame and how a
//! frame becomes a logical BiDi document. [`BidiCodec`] is the direct JSON
//! mapping; the Chromium bridge supplies its own codec that tunnels BiDi
//! through CDP.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::Command;

use super::RawChannel;

// ============================================================================
// MessageCodec
// ============================================================================

/// Strategy for encoding commands and decoding inbound frames.
///
/// Injected into the [`Transport`](super::Transport) at construction.
#[async_trait]
pub trait MessageCodec: Send + Sync {
    /// Encodes a command into one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be encoded in the codec's
    /// current state.
    fn serialize_command(&self, command: &Command) -> Result<String>;

    /// Decodes one inbound frame.
    ///
    /// Returns `Ok(None)` for frames that carry no logical message.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not valid JSON.
    fn deserialize_message(&self, data: &str) -> Result<Option<Value>>;

    /// Runs once after the connection is wired, before any command is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec could not prepare the connection.
    async fn initialize(&self, _channel: RawChannel<'_>) -> Result<()> {
        Ok(())
    }

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

// ============================================================================
// BidiCodec
// ============================================================================

/// Native BiDi codec: commands and documents are plain JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct BidiCodec;

#[async_trait]
impl MessageCodec for BidiCodec {
    fn serialize_command(&self, command: &Command) -> Result<String> {
        Ok(serde_json::to_string(command)?)
    }

    fn deserialize_message(&self, data: &str) -> Result<Option<Value>> {
        Ok(Some(serde_json::from_str(data)?))
    }

    fn name(&self) -> &'static str {
        "bidi"
    }
}

// ============================================================================
// Tests
// ============================================================================
