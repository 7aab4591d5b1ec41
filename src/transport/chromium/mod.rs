//! BiDi-over-CDP bridge for Chromium.
//!
//! When a browser only exposes the Chrome DevTools Protocol, the bridge makes
//! the connection look like a native BiDi endpoint. It opens a hidden tab,
//! injects the mapper program into it, and from then on tunnels every BiDi
//! command in as a `Runtime.evaluate` call and every BiDi message out as a
//! `Runtime.bindingCalled` event.
//!
//! # Bootstrap
//!
//! | Step | CDP method | State after |
//! |------|------------|-------------|
//! | 1 | `Target.createTarget` | `TargetCreated` |
//! | 2 | `Target.attachToTarget` | `Attached` |
//! | 3 | `Runtime.evaluate` (`document.body.click()`) | `Attached` |
//! | 4 | `Runtime.enable` | `RuntimeEnabled` |
//! | 5 | `Target.exposeDevToolsProtocol` | `ProtocolExposed` |
//! | 6 | `Runtime.evaluate` (mapper source) | `MapperLoaded` |
//! | 7 | `Runtime.evaluate` (`runMapperInstance`) | `MapperRunning` |
//! | 8 | `Runtime.addBinding` | `BindingAdded` → `Ready` |
//!
//! Every step waits for the response with its own CDP id, so CDP events that
//! arrive meanwhile cannot be taken for a step's answer. A failed step leaves
//! the bridge `Failed` and every later send fails with
//! [`Error::BridgeNotReady`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::{BindingCalled, CdpCommand, CdpError, CdpMessage, Command};

use super::codec::MessageCodec;
use super::core::RawChannel;

// ============================================================================
// Submodules
// ============================================================================

/// Mapper program source.
pub mod mapper;

pub use mapper::MapperSource;

// ============================================================================
// Constants
// ============================================================================

/// Per-step bootstrap timeout.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(3);

/// Binding the mapper calls to hand BiDi messages back to us.
pub const RESPONSE_BINDING: &str = "sendBidiResponse";

/// Binding name under which the hidden tab gets raw CDP access.
pub const CDP_BINDING: &str = "cdp";

/// Function the mapper installs to receive BiDi commands.
pub const MESSAGE_ENTRY_POINT: &str = "window.onBidiMessage";

/// BiDi error code reported when a carrier fails on the CDP side.
pub const CARRIER_ERROR_CODE: &str = "unknown error";

// ============================================================================
// Types
// ============================================================================

/// Outcome of one CDP command during bootstrap.
type CdpReply = std::result::Result<Value, CdpError>;

/// Bootstrap commands waiting for their response.
type StepMap = FxHashMap<CommandId, oneshot::Sender<CdpReply>>;

// ============================================================================
// BridgeState
// ============================================================================

/// Bootstrap progress of a [`ChromiumBridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeState {
    /// Nothing sent yet.
    Idle,
    /// Hidden tab created.
    TargetCreated,
    /// Flattened session attached to the tab.
    Attached,
    /// Runtime domain enabled.
    RuntimeEnabled,
    /// CDP exposed to the tab as `window.cdp`.
    ProtocolExposed,
    /// Mapper source evaluated.
    MapperLoaded,
    /// Mapper entry point resolved.
    MapperRunning,
    /// Response binding installed.
    BindingAdded,
    /// Tunnelling commands.
    Ready,
    /// A bootstrap step failed; the bridge will not become ready.
    Failed,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// BridgeSession
// ============================================================================

/// Ids captured during bootstrap.
#[derive(Debug, Clone, Default)]
struct BridgeSession {
    /// Hidden tab running the mapper.
    target_id: Option<String>,
    /// Flattened CDP session attached to that tab.
    session_id: Option<String>,
}

// ============================================================================
// ChromiumBridge
// ============================================================================

/// Codec that runs BiDi through a mapper tab over CDP.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use webdriver_bidi::Driver;
/// use webdriver_bidi::transport::{ChromiumBridge, MapperSource};
///
/// # async fn example() -> webdriver_bidi::Result<()> {
/// let bridge = ChromiumBridge::new(MapperSource::file("./mapperTab.js"));
/// let driver = Driver::builder()
///     .codec(Arc::new(bridge))
///     .connect("ws://127.0.0.1:9222/devtools/browser/abc")
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ChromiumBridge {
    /// Mapper program.
    mapper: MapperSource,
    /// Timeout per bootstrap step.
    step_timeout: Duration,
    /// Current bootstrap state.
    state: Mutex<BridgeState>,
    /// Target and session ids.
    session: Mutex<BridgeSession>,
    /// Bootstrap steps awaiting their response.
    steps: Mutex<StepMap>,
}

impl fmt::Debug for ChromiumBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromiumBridge")
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .finish_non_exhaustive()
    }
}

impl ChromiumBridge {
    /// Creates an idle bridge with the default step timeout.
    #[must_use]
    pub fn new(mapper: MapperSource) -> Self {
        Self::with_step_timeout(mapper, DEFAULT_STEP_TIMEOUT)
    }

    /// Creates an idle bridge with a custom step timeout.
    #[must_use]
    pub fn with_step_timeout(mapper: MapperSource, step_timeout: Duration) -> Self {
        Self {
            mapper,
            step_timeout,
            state: Mutex::new(BridgeState::Idle),
            session: Mutex::new(BridgeSession::default()),
            steps: Mutex::new(StepMap::default()),
        }
    }

    /// Returns the current bootstrap state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> BridgeState {
        *self.state.lock()
    }

    /// Returns `true` once bootstrap has completed.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == BridgeState::Ready
    }

    /// Returns the CDP session id of the mapper tab.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session.lock().session_id.clone()
    }

    /// Returns the target id of the mapper tab.
    #[must_use]
    pub fn target_id(&self) -> Option<String> {
        self.session.lock().target_id.clone()
    }

    /// Wraps a BiDi command into the `Runtime.evaluate` carrier.
    ///
    /// The BiDi JSON is escaped as a JavaScript string literal and passed
    /// to `window.onBidiMessage` in the mapper tab.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the command cannot be encoded.
    pub fn wrap_command(command: &Command, session_id: &str) -> Result<CdpCommand> {
        let bidi = serde_json::to_string(command)?;
        let literal = serde_json::to_string(&bidi)?;

        Ok(CdpCommand::new(
            command.id,
            "Runtime.evaluate",
            json!({ "expression": format!("{MESSAGE_ENTRY_POINT}({literal})") }),
            Some(session_id.to_string()),
        ))
    }

    fn set_state(&self, state: BridgeState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        debug!(from = %previous, to = %state, "Bridge state changed");
    }

    /// Runs all bootstrap steps in order.
    async fn bootstrap(&self, channel: RawChannel<'_>) -> Result<()> {
        let mapper_script = self
            .mapper
            .load()
            .await
            .map_err(|e| Error::bridge_bootstrap("load mapper", e.to_string()))?;

        let created = self
            .call(
                channel,
                "Target.createTarget",
                json!({ "url": "about:blank", "background": true }),
            )
            .await?;
        let target_id = required_str(&created, "targetId", "Target.createTarget")?;
        self.session.lock().target_id = Some(target_id.clone());
        self.set_state(BridgeState::TargetCreated);

        let attached = self
            .call(
                channel,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = required_str(&attached, "sessionId", "Target.attachToTarget")?;
        self.session.lock().session_id = Some(session_id);
        self.set_state(BridgeState::Attached);

        // A user gesture keeps a beforeunload prompt from blocking later closes.
        self.call(
            channel,
            "Runtime.evaluate",
            json!({ "expression": "document.body.click()", "userGesture": true }),
        )
        .await?;

        self.call(channel, "Runtime.enable", json!({})).await?;
        self.set_state(BridgeState::RuntimeEnabled);

        self.call(
            channel,
            "Target.exposeDevToolsProtocol",
            json!({ "targetId": target_id, "bindingName": CDP_BINDING }),
        )
        .await?;
        self.set_state(BridgeState::ProtocolExposed);

        self.call(
            channel,
            "Runtime.evaluate",
            json!({ "expression": mapper_script }),
        )
        .await?;
        self.set_state(BridgeState::MapperLoaded);

        let target_literal = serde_json::to_string(&target_id)?;
        self.call(
            channel,
            "Runtime.evaluate",
            json!({
                "expression": format!("window.runMapperInstance({target_literal})"),
                "awaitPromise": true,
            }),
        )
        .await?;
        self.set_state(BridgeState::MapperRunning);

        self.call(
            channel,
            "Runtime.addBinding",
            json!({ "name": RESPONSE_BINDING }),
        )
        .await?;
        self.set_state(BridgeState::BindingAdded);

        Ok(())
    }

    /// Sends one bootstrap command and waits for its response.
    async fn call(&self, channel: RawChannel<'_>, method: &str, params: Value) -> Result<Value> {
        let id = channel.next_id();
        let (tx, rx) = oneshot::channel();
        self.steps.lock().insert(id, tx);

        let command = CdpCommand::new(id, method, params, self.session_id());
        let text = serde_json::to_string(&command)?;

        if let Err(e) = channel.send_text(text) {
            self.steps.lock().remove(&id);
            return Err(Error::bridge_bootstrap(method, e.to_string()));
        }

        trace!(cdp_id = %id, %method, "Bootstrap step sent");

        let reply = match timeout(self.step_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(Error::bridge_bootstrap(method, "step abandoned")),
            Err(_) => {
                self.steps.lock().remove(&id);
                return Err(Error::bridge_bootstrap(
                    method,
                    format!("no response within {}ms", self.step_timeout.as_millis()),
                ));
            }
        };

        let result = reply.map_err(|e| {
            Error::bridge_bootstrap(method, format!("CDP error {}: {}", e.code, e.message))
        })?;

        if let Some(details) = result.get("exceptionDetails") {
            return Err(Error::bridge_bootstrap(method, exception_text(details)));
        }

        Ok(result)
    }
}

/// Best description of a CDP `exceptionDetails` object.
fn exception_text(details: &Value) -> String {
    details
        .pointer("/exception/description")
        .or_else(|| details.get("text"))
        .and_then(Value::as_str)
        .unwrap_or("script threw")
        .to_string()
}

/// BiDi error response standing in for a carrier the mapper never received.
fn carrier_failure(id: CommandId, message: String) -> Value {
    json!({
        "id": id,
        "type": "error",
        "error": CARRIER_ERROR_CODE,
        "message": message,
    })
}

/// Reads a required string field from a CDP result.
fn required_str(result: &Value, field: &str, method: &str) -> Result<String> {
    result
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::bridge_bootstrap(method, format!("result has no '{field}'")))
}

// ============================================================================
// MessageCodec
// ============================================================================

#[async_trait]
impl MessageCodec for ChromiumBridge {
    fn serialize_command(&self, command: &Command) -> Result<String> {
        let state = self.state();
        if state != BridgeState::Ready {
            return Err(Error::bridge_not_ready(state));
        }

        let session_id = self
            .session_id()
            .ok_or(Error::bridge_not_ready(BridgeState::Ready))?;

        Ok(serde_json::to_string(&Self::wrap_command(
            command,
            &session_id,
        )?)?)
    }

    fn deserialize_message(&self, data: &str) -> Result<Option<Value>> {
        let message: CdpMessage = serde_json::from_str(data)?;

        // Responses: bootstrap steps, or acks for wrapped commands.
        if let Some(id) = message.id {
            if let Some(tx) = self.steps.lock().remove(&id) {
                let reply = match message.error {
                    Some(error) => Err(error),
                    None => Ok(message.result.unwrap_or(Value::Null)),
                };
                let _ = tx.send(reply);
                return Ok(None);
            }

            // A carrier shares its id with the BiDi command, so a failed
            // carrier answers that command directly.
            if let Some(error) = message.error {
                warn!(cdp_id = %id, code = error.code, error_message = %error.message, "CDP carrier failed");
                return Ok(Some(carrier_failure(
                    id,
                    format!("CDP error {}: {}", error.code, error.message),
                )));
            }

            if let Some(details) = message.result.as_ref().and_then(|r| r.get("exceptionDetails")) {
                let text = exception_text(details);
                warn!(cdp_id = %id, error_message = %text, "CDP carrier threw");
                return Ok(Some(carrier_failure(id, format!("Carrier threw: {text}"))));
            }

            return Ok(None);
        }

        if message.method.as_deref() != Some("Runtime.bindingCalled") {
            return Ok(None);
        }

        let Some(params) = message.params else {
            return Ok(None);
        };

        let binding: BindingCalled = match serde_json::from_value(params) {
            Ok(binding) => binding,
            Err(e) => {
                trace!(error = %e, "Ignoring unparsable bindingCalled");
                return Ok(None);
            }
        };

        if binding.name != RESPONSE_BINDING {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&binding.payload)?))
    }

    async fn initialize(&self, channel: RawChannel<'_>) -> Result<()> {
        let state = self.state();
        if state != BridgeState::Idle {
            return Err(Error::bridge_bootstrap(
                "initialize",
                format!("bridge already used (state: {state})"),
            ));
        }

        info!("Bootstrapping BiDi mapper over CDP");

        match self.bootstrap(channel).await {
            Ok(()) => {
                self.set_state(BridgeState::Ready);
                info!(session_id = ?self.session_id(), "CDP bridge ready");
                Ok(())
            }
            Err(e) => {
                self.steps.lock().clear();
                self.set_state(BridgeState::Failed);
                warn!(error = %e, "CDP bridge bootstrap failed");
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "chromium-bridge"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    impl ChromiumBridge {
        /// Puts the bridge straight into `Ready` with a fixed session.
        pub(crate) fn ready_for_test(session_id: &str) -> Self {
            let bridge = Self::new(MapperSource::inline("// mapper"));
            bridge.session.lock().session_id = Some(session_id.to_string());
            bridge.set_state(BridgeState::Ready);
            bridge
        }
    }

    /// Plays the mapper: unwraps an evaluate carrier and echoes its payload
    /// back as a `sendBidiResponse` binding call.
    fn echo_through_mapper(carrier: &str) -> String {
        let carrier: Value = serde_json::from_str(carrier).expect("carrier json");
        let expression = carrier["params"]["expression"].as_str().expect("expression");
        let literal = expression
            .strip_prefix("window.onBidiMessage(")
            .and_then(|rest| rest.strip_suffix(')'))
            .expect("carrier shape");
        let payload: String = serde_json::from_str(literal).expect("string literal");

        json!({
            "method": "Runtime.bindingCalled",
            "params": { "name": RESPONSE_BINDING, "payload": payload, "executionContextId": 1 },
            "sessionId": carrier["sessionId"],
        })
        .to_string()
    }

    #[test]
    fn test_state_display() {
        assert_eq!(BridgeState::MapperLoaded.to_string(), "MapperLoaded");
    }

    #[test]
    fn test_send_before_ready_fails_fast() {
        let bridge = ChromiumBridge::new(MapperSource::inline("x"));
        let command = Command::new(CommandId::new(1), "session.status", json!({}));

        match bridge.serialize_command(&command) {
            Err(Error::BridgeNotReady { state }) => assert_eq!(state, BridgeState::Idle),
            other => panic!("expected BridgeNotReady, got {other:?}"),
        }
    }

    #[test]
    fn test_carrier_shape() {
        let bridge = ChromiumBridge::ready_for_test("S1");
        let command = Command::new(
            CommandId::new(5),
            "browsingContext.create",
            json!({ "type": "tab" }),
        );

        let text = bridge.serialize_command(&command).expect("serialize");
        let carrier: Value = serde_json::from_str(&text).expect("json");

        assert_eq!(carrier["id"], 5);
        assert_eq!(carrier["method"], "Runtime.evaluate");
        assert_eq!(carrier["sessionId"], "S1");
        assert_eq!(
            carrier["params"]["expression"],
            r#"window.onBidiMessage("{\"id\":5,\"method\":\"browsingContext.create\",\"params\":{\"type\":\"tab\"}}")"#
        );
    }

    #[test]
    fn test_round_trip_through_binding() {
        let bridge = ChromiumBridge::ready_for_test("S1");
        let command = Command::new(
            CommandId::new(1),
            "script.evaluate",
            json!({ "expression": "'quote\" and \\ backslash'", "awaitPromise": false }),
        );

        let carrier = bridge.serialize_command(&command).expect("serialize");
        let decoded = bridge
            .deserialize_message(&echo_through_mapper(&carrier))
            .expect("decode")
            .expect("message");

        assert_eq!(decoded, serde_json::to_value(&command).expect("value"));
    }

    #[test]
    fn test_cdp_noise_is_discarded() {
        let bridge = ChromiumBridge::ready_for_test("S1");

        let noise = [
            r#"{"id":12,"result":{"result":{"type":"undefined"}},"sessionId":"S1"}"#,
            r#"{"method":"Target.targetCreated","params":{"targetInfo":{"targetId":"T2"}}}"#,
            r#"{"method":"Runtime.bindingCalled","params":{"name":"sendDebugMessage","payload":"{}","executionContextId":1}}"#,
            r#"{"method":"Runtime.consoleAPICalled","params":{"type":"log","args":[]}}"#,
            r#"{"method":"Runtime.bindingCalled"}"#,
        ];

        for frame in noise {
            assert_eq!(bridge.deserialize_message(frame).expect("decode"), None, "{frame}");
        }
    }

    #[test]
    fn test_carrier_error_becomes_bidi_error() {
        let bridge = ChromiumBridge::ready_for_test("S1");

        let frame = r#"{"id":5,"error":{"code":-32001,"message":"Session with given id not found."},"sessionId":"S1"}"#;
        let decoded = bridge
            .deserialize_message(frame)
            .expect("decode")
            .expect("synthetic response");

        assert_eq!(decoded["id"], 5);
        assert_eq!(decoded["type"], "error");
        assert_eq!(decoded["error"], CARRIER_ERROR_CODE);
        assert_eq!(
            decoded["message"],
            "CDP error -32001: Session with given id not found."
        );
    }

    #[test]
    fn test_carrier_exception_becomes_bidi_error() {
        let bridge = ChromiumBridge::ready_for_test("S1");

        let frame = json!({
            "id": 6,
            "result": {
                "result": { "type": "object" },
                "exceptionDetails": {
                    "text": "Uncaught",
                    "exception": { "description": "TypeError: window.onBidiMessage is not a function" }
                }
            },
            "sessionId": "S1"
        })
        .to_string();
        let decoded = bridge
            .deserialize_message(&frame)
            .expect("decode")
            .expect("synthetic response");

        assert_eq!(decoded["id"], 6);
        assert_eq!(decoded["type"], "error");
        assert!(
            decoded["message"]
                .as_str()
                .is_some_and(|m| m.contains("onBidiMessage is not a function"))
        );
    }

    #[test]
    fn test_bootstrap_response_completes_waiting_step() {
        let bridge = ChromiumBridge::new(MapperSource::inline("x"));
        let (tx, mut rx) = oneshot::channel();
        bridge.steps.lock().insert(CommandId::new(3), tx);

        // An unrelated event first: must not complete the step.
        let event = r#"{"method":"Target.attachedToTarget","params":{"sessionId":"S9"}}"#;
        assert_eq!(bridge.deserialize_message(event).expect("decode"), None);
        assert!(rx.try_recv().is_err());

        let response = r#"{"id":3,"result":{"targetId":"T1"}}"#;
        assert_eq!(bridge.deserialize_message(response).expect("decode"), None);
        let reply = rx.try_recv().expect("completed").expect("success");
        assert_eq!(reply["targetId"], "T1");
    }

    #[test]
    fn test_invalid_cdp_frame_is_error() {
        let bridge = ChromiumBridge::ready_for_test("S1");
        assert!(bridge.deserialize_message("not json").is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip_any_params(
            id in 1u64..u64::MAX / 2,
            key in "[a-zA-Z]{1,12}",
            text in any::<String>(),
            number in any::<i64>(),
        ) {
            let bridge = ChromiumBridge::ready_for_test("S1");
            let command = Command::new(
                CommandId::new(id),
                "script.callFunction",
                json!({ key: text, "n": number, "nested": { "list": [1, 2, 3] } }),
            );

            let carrier = bridge.serialize_command(&command).expect("serialize");
            let decoded = bridge
                .deserialize_message(&echo_through_mapper(&carrier))
                .expect("decode")
                .expect("message");

            prop_assert_eq!(decoded, serde_json::to_value(&command).expect("value"));
        }
    }
}
