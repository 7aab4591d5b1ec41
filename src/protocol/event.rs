//! Event messages and inbound message classification.
//!
//! Events are notifications the remote end sends without a command id.
//! [`Message::from_value`] decides whether an inbound document is a
//! response, an event, or something to drop.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use super::Response;

// ============================================================================
// Event
// ============================================================================

/// An event notification from remote end to local end.
///
/// # Format
///
/// ```json
/// {
///   "type": "event",
///   "method": "module.eventName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    /// Event name in `module.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Returns the module name from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = Event { method: "browsingContext.load".into(), .. };
    /// assert_eq!(event.module(), "browsingContext");
    /// ```
    #[inline]
    #[must_use]
    pub fn module(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split_once('.').map(|(_, name)| name).unwrap_or_default()
    }
}

// ============================================================================
// Message
// ============================================================================

/// A classified inbound document.
#[derive(Debug, Clone)]
pub enum Message {
    /// Response to a command, correlated by id.
    Response(Response),
    /// Unsolicited event.
    Event(Event),
    /// Anything that is neither; dropped by the driver.
    Unknown(Value),
}

impl Message {
    /// Classifies a decoded document by its discriminator fields.
    ///
    /// - an integer `id` with a `success`/`error` type is a response
    /// - `type: "event"`, or `method` + `params` without `id`, is an event
    /// - everything else is unknown
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let has_id = value.get("id").is_some_and(Value::is_u64);

        if has_id {
            return match serde_json::from_value::<Response>(value.clone()) {
                Ok(response) => Self::Response(response),
                Err(_) => Self::Unknown(value),
            };
        }

        let is_event = value.get("type").and_then(Value::as_str) == Some("event")
            || (value.get("id").is_none()
                && value.get("method").is_some_and(Value::is_string)
                && value.get("params").is_some());

        if is_event && let Ok(event) = serde_json::from_value::<Event>(value.clone()) {
            return Self::Event(event);
        }

        Self::Unknown(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
