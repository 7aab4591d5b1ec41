//! `session` module: status and event subscriptions.
//!
//! The remote end only emits events the session subscribed to, so
//! observers on other modules stay silent until [`SessionModule::subscribe`]
//! names their events.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::driver::DriverInner;
use crate::error::Result;
use crate::identifiers::BrowsingContextId;

use super::{EmptyResult, EventRegistry, Module};

// ============================================================================
// Types
// ============================================================================

/// Result of `session.status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusResult {
    /// Whether the remote end can create a new session.
    pub ready: bool,
    /// Implementation-defined status text.
    pub message: String,
}

/// Parameters of `session.subscribe` / `session.unsubscribe`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionRequest {
    /// Event or module names, e.g. `log.entryAdded` or `network`.
    pub events: Vec<String>,
    /// Restrict the subscription to these top-level contexts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<BrowsingContextId>>,
}

/// Result of `session.subscribe`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubscribeResult {
    /// Subscription id, when the remote end assigns one.
    #[serde(default)]
    pub subscription: Option<String>,
}

// ============================================================================
// SessionModule
// ============================================================================

/// The `session` protocol module.
#[derive(Clone)]
pub struct SessionModule {
    driver: Arc<DriverInner>,
    events: Arc<EventRegistry>,
}

impl SessionModule {
    /// Module name on the wire.
    pub const NAME: &'static str = "session";

    pub(crate) fn new(driver: Arc<DriverInner>) -> Result<Self> {
        Ok(Self {
            driver,
            events: Arc::new(EventRegistry::new(Self::NAME)),
        })
    }

    /// Queries whether the remote end is ready.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn status(&self) -> Result<StatusResult> {
        self.driver
            .execute("session.status", &serde_json::json!({}))
            .await
    }

    /// Subscribes to events or whole modules.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn subscribe(&self, events: &[&str]) -> Result<SubscribeResult> {
        self.subscribe_with(&SubscriptionRequest {
            events: events.iter().map(|event| (*event).to_string()).collect(),
            contexts: None,
        })
        .await
    }

    /// Subscribes with full parameters.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn subscribe_with(&self, request: &SubscriptionRequest) -> Result<SubscribeResult> {
        self.driver.execute("session.subscribe", request).await
    }

    /// Removes subscriptions for events or whole modules.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn unsubscribe(&self, events: &[&str]) -> Result<()> {
        let request = SubscriptionRequest {
            events: events.iter().map(|event| (*event).to_string()).collect(),
            contexts: None,
        };
        let _: EmptyResult = self.driver.execute("session.unsubscribe", &request).await?;
        Ok(())
    }

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn end(&self) -> Result<()> {
        let _: EmptyResult = self
            .driver
            .execute("session.end", &serde_json::json!({}))
            .await?;
        Ok(())
    }
}

impl Module for SessionModule {
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
