//! `script` module: evaluation and realm lifecycle.
//!
//! Results come back as serialized remote values (`{"type":"number","value":3}`).
//! [`EvaluateResult::into_result`] turns an exception result into an
//! [`Error::Protocol`] with code `javascript error`.
//!
//! # Example
//!
//! ```no_run
//! use webdriver_bidi::Driver;
//! use webdriver_bidi::modules::script::Target;
//!
//! # async fn example(driver: Driver) -> webdriver_bidi::Result<()> {
//! let context = driver.browsing_context().create_tab().await?.context;
//! let value = driver
//!     .script()
//!     .evaluate("document.title", Target::context(context), true)
//!     .await?
//!     .into_result()?;
//! println!("{value}");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::driver::DriverInner;
use crate::error::{Error, Result};
use crate::identifiers::BrowsingContextId;

use super::{EventRegistry, Module, ObservableEvent};

/// Error code for evaluation exceptions.
const JAVASCRIPT_ERROR: &str = "javascript error";

// ============================================================================
// Command Types
// ============================================================================

/// Where a script runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Target {
    /// The default realm of a browsing context.
    Context { context: BrowsingContextId },
    /// A specific realm.
    Realm { realm: String },
}

impl Target {
    #[inline]
    #[must_use]
    pub fn context(context: BrowsingContextId) -> Self {
        Self::Context { context }
    }

    #[inline]
    #[must_use]
    pub fn realm(realm: impl Into<String>) -> Self {
        Self::Realm {
            realm: realm.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateParameters<'a> {
    expression: &'a str,
    target: &'a Target,
    await_promise: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CallFunctionParameters<'a> {
    function_declaration: &'a str,
    await_promise: bool,
    target: &'a Target,
    #[serde(skip_serializing_if = "<[Value]>::is_empty")]
    arguments: &'a [Value],
}

/// Details of an exception thrown during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExceptionDetails {
    pub text: String,
}

/// Result of `script.evaluate` and `script.callFunction`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EvaluateResult {
    /// Completed normally with a serialized remote value.
    Success { result: Value, realm: String },
    /// Threw.
    #[serde(rename_all = "camelCase")]
    Exception {
        exception_details: ExceptionDetails,
        realm: String,
    },
}

impl EvaluateResult {
    /// Returns the serialized value, or the exception as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] with code `javascript error` for an
    /// exception result.
    pub fn into_result(self) -> Result<Value> {
        match self {
            Self::Success { result, .. } => Ok(result),
            Self::Exception {
                exception_details, ..
            } => Err(Error::protocol(JAVASCRIPT_ERROR, exception_details.text)),
        }
    }

    /// Realm the script ran in.
    #[inline]
    #[must_use]
    pub fn realm(&self) -> &str {
        match self {
            Self::Success { realm, .. } | Self::Exception { realm, .. } => realm,
        }
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// Parameters of `script.realmCreated`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RealmInfo {
    pub realm: String,
    /// Owning context for window realms.
    #[serde(default)]
    pub context: Option<BrowsingContextId>,
}

/// Parameters of `script.realmDestroyed`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RealmDestroyed {
    pub realm: String,
}

// ============================================================================
// ScriptModule
// ============================================================================

/// The `script` protocol module.
#[derive(Clone)]
pub struct ScriptModule {
    driver: Arc<DriverInner>,
    events: Arc<EventRegistry>,
    realm_created: ObservableEvent<RealmInfo>,
    realm_destroyed: ObservableEvent<RealmDestroyed>,
}

impl ScriptModule {
    /// Module name on the wire.
    pub const NAME: &'static str = "script";

    pub(crate) fn new(driver: Arc<DriverInner>) -> Result<Self> {
        let realm_created = ObservableEvent::new("script.realmCreated");
        let realm_destroyed = ObservableEvent::new("script.realmDestroyed");

        let mut events = EventRegistry::new(Self::NAME);
        events.register(realm_created.name(), &realm_created)?;
        events.register(realm_destroyed.name(), &realm_destroyed)?;

        Ok(Self {
            driver,
            events: Arc::new(events),
            realm_created,
            realm_destroyed,
        })
    }

    /// Evaluates an expression.
    ///
    /// An exception thrown by the script is a successful command; inspect
    /// the result or call [`EvaluateResult::into_result`].
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn evaluate(
        &self,
        expression: &str,
        target: Target,
        await_promise: bool,
    ) -> Result<EvaluateResult> {
        let params = EvaluateParameters {
            expression,
            target: &target,
            await_promise,
        };
        self.driver.execute("script.evaluate", &params).await
    }

    /// Calls a function declaration such as `(a, b) => a + b` with
    /// serialized arguments (`{"type":"number","value":1}`).
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn call_function(
        &self,
        function_declaration: &str,
        target: Target,
        arguments: &[Value],
    ) -> Result<EvaluateResult> {
        let params = CallFunctionParameters {
            function_declaration,
            await_promise: true,
            target: &target,
            arguments,
        };
        self.driver.execute("script.callFunction", &params).await
    }

    /// `script.realmCreated`.
    #[inline]
    #[must_use]
    pub fn on_realm_created(&self) -> &ObservableEvent<RealmInfo> {
        &self.realm_created
    }

    /// `script.realmDestroyed`.
    #[inline]
    #[must_use]
    pub fn on_realm_destroyed(&self) -> &ObservableEvent<RealmDestroyed> {
        &self.realm_destroyed
    }
}

impl Module for ScriptModule {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn events(&self) -> Arc<EventRegistry> {
        Arc::clone(&self.events)
    }
}

// ============================================================================
// Tests
// ============================================================================
