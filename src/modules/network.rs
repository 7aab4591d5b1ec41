//! `network` module: request interception and network events.
//!
//! Interception is two-step: [`NetworkModule::add_intercept`] makes matching
//! requests pause in a phase, and each paused request is then resumed with
//! [`NetworkModule::continue_request`] or aborted with
//! [`NetworkModule::fail_request`]. Paused requests are reported through
//! [`NetworkModule::on_before_request_sent`] with `is_blocked` set.
//!
//! # Example
//!
//! ```no_run
//! use webdriver_bidi::Driver;
//! use webdriver_bidi::modules::network::InterceptPhase;
//!
//! # async fn example(driver: Driver) -> webdriver_bidi::Result<()> {
//! let network = driver.network().clone();
//! network.add_intercept(&[InterceptPhase::BeforeRequestSent]).await?;
//!
//! let handler = network.clone();
//! network.on_before_request_sent().add_async_observer(move |event| {
//!     let network = handler.clone();
//!     async move {
//!         if !event.is_blocked {
//!             return;
//!         }
//!         let request = event.request.request.clone();
//!         if event.request.url.contains("ads") {
//!             let _ = network.fail_request(&request).await;
//!         } else {
//!             let _ = network.continue_request(&request).await;
//!         }
//!     }
//! });
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::driver::DriverInner;
use crate::error::{Error, Result};
use crate::identifiers::BrowsingContextId;

use super::{EmptyResult, EventRegistry, Module, ObservableEvent};

// ============================================================================
// Event Types
// ============================================================================

/// Request half of a network event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestData {
    /// Request id, used to continue or fail an intercepted request.
    pub request: String,
    pub url: String,
    pub method: String,
}

/// Response half of a network event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseData {
    pub url: String,
    pub status: u16,
}

/// Parameters of `network.beforeRequestSent`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeforeRequestSent {
    #[serde(default)]
    pub context: Option<BrowsingContextId>,
    /// Whether the request is paused by an intercept.
    #[serde(default)]
    pub is_blocked: bool,
    pub request: RequestData,
}

/// Parameters of `network.responseStarted` and `network.responseCompleted`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseEvent {
    #[serde(default)]
    pub context: Option<BrowsingContextId>,
    pub request: RequestData,
    pub response: ResponseData,
}

/// Parameters of `network.fetchError`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchError {
    #[serde(default)]
    pub context: Option<BrowsingContextId>,
    pub request: RequestData,
    pub error_text: String,
}

// ============================================================================
// Command Types
// ============================================================================

/// Phase in which an intercept pauses requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterceptPhase {
    BeforeRequestSent,
    ResponseStarted,
    AuthRequired,
}

#[derive(Serialize)]
struct AddInterceptParameters<'a> {
    phases: &'a [InterceptPhase],
}

#[derive(Deserialize)]
struct AddInterceptResult {
    intercept: String,
}

#[derive(Serialize)]
struct InterceptParameter<'a> {
    intercept: &'a str,
}

#[derive(Serialize)]
struct RequestParameter<'a> {
    request: &'a str,
}

// ============================================================================
// NetworkModule
// ============================================================================

/// The `network` protocol module.
#[derive(Clone)]
pub struct NetworkModule {
    driver: Arc<DriverInner>,
    events: Arc<EventRegistry>,
    before_request_sent: ObservableEvent<BeforeRequestSent>,
    response_started: ObservableEvent<ResponseEvent>,
    response_completed: ObservableEvent<ResponseEvent>,
    fetch_error: ObservableEvent<FetchError>,
}

impl NetworkModule {
    /// Module name on the wire.
    pub const NAME: &'static str = "network";

    pub(crate) fn new(driver: Arc<DriverInner>) -> Result<Self> {
        let before_request_sent = ObservableEvent::new("network.beforeRequestSent");
        let response_started = ObservableEvent::new("network.responseStarted");
        let response_completed = ObservableEvent::new("network.responseCompleted");
        let fetch_error = ObservableEvent::new("network.fetchError");

        let mut events = EventRegistry::new(Self::NAME);
        events.register(before_request_sent.name(), &before_request_sent)?;
        events.register(response_started.name(), &response_started)?;
        events.register(response_completed.name(), &response_completed)?;
        events.register(fetch_error.name(), &fetch_error)?;

        Ok(Self {
            driver,
            events: Arc::new(events),
            before_request_sent,
            response_started,
            response_completed,
            fetch_error,
        })
    }

    /// Pauses every request in the given phases and returns the intercept id.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if no phase is given
    /// - any command error
    pub async fn add_intercept(&self, phases: &[InterceptPhase]) -> Result<String> {
        if phases.is_empty() {
            return Err(Error::invalid_argument(
                "An intercept needs at least one phase",
            ));
        }

        let result: AddInterceptResult = self
            .driver
            .execute("network.addIntercept", &AddInterceptParameters { phases })
            .await?;
        Ok(result.intercept)
    }

    /// Removes an intercept.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn remove_intercept(&self, intercept: &str) -> Result<()> {
        let _: EmptyResult = self
            .driver
            .execute("network.removeIntercept", &InterceptParameter { intercept })
            .await?;
        Ok(())
    }

    /// Resumes a paused request unchanged.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn continue_request(&self, request: &str) -> Result<()> {
        let _: EmptyResult = self
            .driver
            .execute("network.continueRequest", &RequestParameter { request })
            .await?;
        Ok(())
    }

    /// Aborts a paused request with a network error.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn fail_request(&self, request: &str) -> Result<()> {
        let _: EmptyResult = self
            .driver
            .execute("network.failRequest", &RequestParameter { request })
            .await?;
        Ok(())
    }

    /// `network.beforeRequestSent`.
    #[inline]
    #[must_use]
    pub fn on_before_request_sent(&self) -> &ObservableEvent<BeforeRequestSent> {
        &self.before_request_sent
    }

    /// `network.responseStarted`.
    #[inline]
    #[must_use]
    pub fn on_response_started(&self) -> &ObservableEvent<ResponseEvent> {
        &self.response_started
    }

    /// `network.responseCompleted`.
    #[inline]
    #[must_use]
    pub fn on_response_completed(&self) -> &ObservableEvent<ResponseEvent> {
        &self.response_completed
    }

    /// `network.fetchError`.
    #[inline]
    #[must_use]
    pub fn on_fetch_error(&self) -> &ObservableEvent<FetchError> {
        &self.fetch_error
    }
}

impl Module for NetworkModule {
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
