//! Chrome DevTools Protocol message shapes used by the bridge.
//!
//! Only the envelope is modelled: commands with an optional flattened
//! session id, responses, and events.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::CommandId;

// ============================================================================
// CdpCommand
// ============================================================================

/// A CDP command.
///
/// # Format
///
/// ```json
/// {
///   "id": 1,
///   "method": "Domain.method",
///   "params": { ... },
///   "sessionId": "..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct CdpCommand {
    /// Command id, unique on the connection.
    pub id: CommandId,

    /// Method in `Domain.method` format.
    pub method: String,

    /// Command parameters.
    pub params: Value,

    /// Target session for flattened sessions.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl CdpCommand {
    /// Creates a new CDP command.
    #[inline]
    #[must_use]
    pub fn new(
        id: CommandId,
        method: impl Into<String>,
        params: Value,
        session_id: Option<String>,
    ) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            session_id,
        }
    }
}

// ============================================================================
// CdpMessage
// ============================================================================

/// Any inbound CDP document: a response (has `id`) or an event (has `method`).
#[derive(Debug, Clone, Deserialize)]
pub struct CdpMessage {
    /// Present on responses.
    #[serde(default)]
    pub id: Option<CommandId>,

    /// Present on events.
    #[serde(default)]
    pub method: Option<String>,

    /// Event parameters.
    #[serde(default)]
    pub params: Option<Value>,

    /// Response result.
    #[serde(default)]
    pub result: Option<Value>,

    /// Response error.
    #[serde(default)]
    pub error: Option<CdpError>,

    /// Session the message belongs to.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

/// Error object of a failed CDP command.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpError {
    /// CDP error code.
    #[serde(default)]
    pub code: i64,
    /// Error text.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// BindingCalled
// ============================================================================

/// Parameters of a `Runtime.bindingCalled` event.
#[derive(Debug, Clone, Deserialize)]
pub struct BindingCalled {
    /// Binding name.
    pub name: String,
    /// Payload string passed to the binding.
    pub payload: String,
    /// Execution context the call came from.
    #[serde(rename = "executionContextId", default)]
    pub execution_context_id: Option<i64>,
}

// ============================================================================
// Tests
// ============================================================================
