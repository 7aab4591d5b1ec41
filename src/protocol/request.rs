//! Command and Response message types.
//!
//! Defines the BiDi envelope for commands sent by the local end and the
//! responses the remote end answers them with.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::CommandId;

// ============================================================================
// Command
// ============================================================================

/// A command from local end to remote end.
///
/// # Format
///
/// ```json
/// {
///   "id": 1,
///   "method": "module.methodName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Unique identifier for command/response correlation.
    pub id: CommandId,

    /// Method in `module.methodName` format.
    pub method: String,

    /// Command parameters. Always an object on the wire.
    pub params: Value,
}

impl Command {
    /// Creates a command with a specific id.
    ///
    /// A `null` params value is sent as an empty object.
    #[inline]
    #[must_use]
    pub fn new(id: CommandId, method: impl Into<String>, params: Value) -> Self {
        let params = if params.is_null() {
            Value::Object(Default::default())
        } else {
            params
        };

        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Returns the module name from the method.
    #[inline]
    #[must_use]
    pub fn module(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from remote end to local end.
///
/// # Format
///
/// Success:
/// ```json
/// {
///   "id": 1,
///   "type": "success",
///   "result": { ... }
/// }
/// ```
///
/// Error:
/// ```json
/// {
///   "id": 1,
///   "type": "error",
///   "error": "error code",
///   "message": "error message"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the command `id`.
    pub id: CommandId,

    /// Response type.
    #[serde(rename = "type")]
    pub response_type: ResponseType,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error code (if error).
    #[serde(default)]
    pub error: Option<String>,

    /// Error message (if error).
    #[serde(default)]
    pub message: Option<String>,

    /// Remote stack trace (if error and provided).
    #[serde(default)]
    pub stacktrace: Option<String>,
}

impl Response {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response_type == ResponseType::Success
    }

    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.response_type == ResponseType::Error
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] carrying the error code and message if
    /// the response was an error.
    pub fn into_result(self) -> Result<Value> {
        match self.response_type {
            ResponseType::Success => Ok(self.result.unwrap_or(Value::Null)),
            ResponseType::Error => {
                let code = self.error.unwrap_or_else(|| "unknown error".to_string());
                let message = self.message.unwrap_or_else(|| code.clone());
                Err(Error::protocol(code, message))
            }
        }
    }
}

// ============================================================================
// ResponseType
// ============================================================================

/// Response type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Successful response.
    Success,
    /// Error response.
    Error,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_serialization() {
        let command = Command::new(
            CommandId::new(1),
            "browsingContext.create",
            json!({ "type": "tab" }),
        );
        let value = serde_json::to_value(&command).expect("serialize");

        assert_eq!(
            value,
            json!({ "id": 1, "method": "browsingContext.create", "params": { "type": "tab" } })
        );
        assert_eq!(command.module(), "browsingContext");
    }

    #[test]
    fn test_null_params_become_object() {
        let command = Command::new(CommandId::new(3), "session.status", Value::Null);
        let json = serde_json::to_string(&command).expect("serialize");
        assert!(json.contains(r#""params":{}"#));
    }

    #[test]
    fn test_success_response() {
        let json_str = r#"{
            "id": 1,
            "type": "success",
            "result": {"context": "abc"}
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert!(response.is_success());
        assert!(!response.is_error());

        let result = response.into_result().expect("should succeed");
        assert_eq!(result["context"], "abc");
    }

    #[test]
    fn test_error_response() {
        let json_str = r#"{
            "id": 4,
            "type": "error",
            "error": "no such frame",
            "message": "Context not found"
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert!(response.is_error());

        match response.into_result() {
            Err(Error::Protocol { code, message }) => {
                assert_eq!(code, "no such frame");
                assert_eq!(message, "Context not found");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_response_without_message() {
        let json_str = r#"{ "id": 4, "type": "error", "error": "unknown command" }"#;
        let response: Response = serde_json::from_str(json_str).expect("parse");

        let err = response.into_result().expect_err("should fail");
        assert_eq!(err.to_string(), "Protocol error (unknown command): unknown command");
    }

    #[test]
    fn test_success_without_result_is_null() {
        let json_str = r#"{ "id": 9, "type": "success" }"#;
        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert_eq!(response.into_result().expect("ok"), Value::Null);
    }
}
