//! `browsingContext` module: tabs, navigation and context lifecycle.
//!
//! # Example
//!
//! ```no_run
//! use webdriver_bidi::Driver;
//! use webdriver_bidi::modules::browsing_context::ReadinessState;
//!
//! # async fn example(driver: Driver) -> webdriver_bidi::Result<()> {
//! let created = driver.browsing_context().create_tab().await?;
//! driver
//!     .browsing_context()
//!     .navigate(&created.context, "https://example.com", Some(ReadinessState::Complete))
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::driver::DriverInner;
use crate::error::Result;
use crate::identifiers::BrowsingContextId;

use super::{EmptyResult, EventRegistry, Module, ObservableEvent};

// ============================================================================
// Command Types
// ============================================================================

/// Kind of context `browsingContext.create` opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateType {
    Tab,
    Window,
}

/// Page load state a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessState {
    /// Return as soon as navigation starts.
    None,
    /// Wait for `DOMContentLoaded`.
    Interactive,
    /// Wait for `load`.
    Complete,
}

#[derive(Serialize)]
struct CreateParameters {
    #[serde(rename = "type")]
    create_type: CreateType,
}

/// Result of `browsingContext.create`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateResult {
    /// Id of the new context.
    pub context: BrowsingContextId,
}

#[derive(Serialize)]
struct NavigateParameters<'a> {
    context: &'a BrowsingContextId,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait: Option<ReadinessState>,
}

/// Result of `browsingContext.navigate` and `browsingContext.reload`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NavigateResult {
    /// Navigation id, absent when the navigation finished synchronously.
    #[serde(default)]
    pub navigation: Option<String>,
    pub url: String,
}

/// Result of `browsingContext.getTree`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GetTreeResult {
    /// Top-level contexts with their children.
    pub contexts: Vec<BrowsingContextInfo>,
}

#[derive(Serialize)]
struct ContextParameter<'a> {
    context: &'a BrowsingContextId,
}

#[derive(Serialize)]
struct ReloadParameters<'a> {
    context: &'a BrowsingContextId,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait: Option<ReadinessState>,
}

// ============================================================================
// Event Types
// ============================================================================

/// A browsing context, as reported by `contextCreated`, `contextDestroyed`
/// and `getTree`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrowsingContextInfo {
    pub context: BrowsingContextId,
    pub url: String,
    /// Child contexts; `None` when beyond the requested depth.
    #[serde(default)]
    pub children: Option<Vec<BrowsingContextInfo>>,
    /// Parent context, for frames.
    #[serde(default)]
    pub parent: Option<BrowsingContextId>,
}

/// Parameters of the navigation lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NavigationInfo {
    pub context: BrowsingContextId,
    #[serde(default)]
    pub navigation: Option<String>,
    pub url: String,
}

/// Parameters of `browsingContext.userPromptOpened`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserPromptOpened {
    pub context: BrowsingContextId,
    /// `alert`, `beforeunload`, `confirm` or `prompt`.
    #[serde(rename = "type")]
    pub prompt_type: String,
    pub message: String,
}

// ============================================================================
// BrowsingContextModule
// ============================================================================

/// The `browsingContext` protocol module.
#[derive(Clone)]
pub struct BrowsingContextModule {
    driver: Arc<DriverInner>,
    events: Arc<EventRegistry>,
    context_created: ObservableEvent<BrowsingContextInfo>,
    context_destroyed: ObservableEvent<BrowsingContextInfo>,
    navigation_started: ObservableEvent<NavigationInfo>,
    dom_content_loaded: ObservableEvent<NavigationInfo>,
    load: ObservableEvent<NavigationInfo>,
    user_prompt_opened: ObservableEvent<UserPromptOpened>,
}

impl BrowsingContextModule {
    /// Module name on the wire.
    pub const NAME: &'static str = "browsingContext";

    pub(crate) fn new(driver: Arc<DriverInner>) -> Result<Self> {
        let context_created = ObservableEvent::new("browsingContext.contextCreated");
        let context_destroyed = ObservableEvent::new("browsingContext.contextDestroyed");
        let navigation_started = ObservableEvent::new("browsingContext.navigationStarted");
        let dom_content_loaded = ObservableEvent::new("browsingContext.domContentLoaded");
        let load = ObservableEvent::new("browsingContext.load");
        let user_prompt_opened = ObservableEvent::new("browsingContext.userPromptOpened");

        let mut events = EventRegistry::new(Self::NAME);
        events.register(context_created.name(), &context_created)?;
        events.register(context_destroyed.name(), &context_destroyed)?;
        events.register(navigation_started.name(), &navigation_started)?;
        events.register(dom_content_loaded.name(), &dom_content_loaded)?;
        events.register(load.name(), &load)?;
        events.register(user_prompt_opened.name(), &user_prompt_opened)?;

        Ok(Self {
            driver,
            events: Arc::new(events),
            context_created,
            context_destroyed,
            navigation_started,
            dom_content_loaded,
            load,
            user_prompt_opened,
        })
    }
}

// ============================================================================
// BrowsingContextModule - Commands
// ============================================================================

impl BrowsingContextModule {
    /// Opens a new tab or window.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn create(&self, create_type: CreateType) -> Result<CreateResult> {
        self.driver
            .execute("browsingContext.create", &CreateParameters { create_type })
            .await
    }

    /// Opens a new foreground tab.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn create_tab(&self) -> Result<CreateResult> {
        self.create(CreateType::Tab).await
    }

    /// Navigates a context to `url`.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn navigate(
        &self,
        context: &BrowsingContextId,
        url: &str,
        wait: Option<ReadinessState>,
    ) -> Result<NavigateResult> {
        let params = NavigateParameters { context, url, wait };
        self.driver.execute("browsingContext.navigate", &params).await
    }

    /// Closes a top-level context.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn close(&self, context: &BrowsingContextId) -> Result<()> {
        let _: EmptyResult = self
            .driver
            .execute("browsingContext.close", &ContextParameter { context })
            .await?;
        Ok(())
    }

    /// Returns the full context tree.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn get_tree(&self) -> Result<GetTreeResult> {
        self.driver
            .execute("browsingContext.getTree", &serde_json::json!({}))
            .await
    }

    /// Brings a context to the foreground.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn activate(&self, context: &BrowsingContextId) -> Result<()> {
        let _: EmptyResult = self
            .driver
            .execute("browsingContext.activate", &ContextParameter { context })
            .await?;
        Ok(())
    }

    /// Reloads a context.
    ///
    /// # Errors
    ///
    /// Returns any command error.
    pub async fn reload(
        &self,
        context: &BrowsingContextId,
        wait: Option<ReadinessState>,
    ) -> Result<NavigateResult> {
        let params = ReloadParameters { context, wait };
        self.driver.execute("browsingContext.reload", &params).await
    }
}

// ============================================================================
// BrowsingContextModule - Events
// ============================================================================

impl BrowsingContextModule {
    /// `browsingContext.contextCreated`.
    #[inline]
    #[must_use]
    pub fn on_context_created(&self) -> &ObservableEvent<BrowsingContextInfo> {
        &self.context_created
    }

    /// `browsingContext.contextDestroyed`.
    #[inline]
    #[must_use]
    pub fn on_context_destroyed(&self) -> &ObservableEvent<BrowsingContextInfo> {
        &self.context_destroyed
    }

    /// `browsingContext.navigationStarted`.
    #[inline]
    #[must_use]
    pub fn on_navigation_started(&self) -> &ObservableEvent<NavigationInfo> {
        &self.navigation_started
    }

    /// `browsingContext.domContentLoaded`.
    #[inline]
    #[must_use]
    pub fn on_dom_content_loaded(&self) -> &ObservableEvent<NavigationInfo> {
        &self.dom_content_loaded
    }

    /// `browsingContext.load`.
    #[inline]
    #[must_use]
    pub fn on_load(&self) -> &ObservableEvent<NavigationInfo> {
        &self.load
    }

    /// `browsingContext.userPromptOpened`.
    #[inline]
    #[must_use]
    pub fn on_user_prompt_opened(&self) -> &ObservableEvent<UserPromptOpened> {
        &self.user_prompt_opened
    }
}

impl Module for BrowsingContextModule {
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
