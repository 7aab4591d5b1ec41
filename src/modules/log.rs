//! `log` module: console and JavaScript error entries.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::BrowsingContextId;

use super::{EventRegistry, Module, ObservableEvent};

// ============================================================================
// Types
// ============================================================================

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// `console.debug` and friends.
    Debug,
    /// `console.log`, `console.info`.
    Info,
    /// `console.warn`.
    Warn,
    /// `console.error` and uncaught exceptions.
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Realm and context an entry originated in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Source {
    /// Script realm id.
    pub realm: String,
    /// Browsing context, when the realm belongs to one.
    #[serde(default)]
    pub context: Option<BrowsingContextId>,
}

/// Parameters of `log.entryAdded`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// `console`, `javascript` or an implementation-defined kind.
    #[serde(rename = "type")]
    pub entry_type: String,
    /// Severity.
    pub level: Level,
    /// Origin.
    pub source: Source,
    /// Formatted message text.
    #[serde(default)]
    pub text: Option<String>,
    /// Milliseconds since the epoch.
    pub timestamp: u64,
    /// Console method (`log`, `warn`, ...) for console entries.
    #[serde(default)]
    pub method: Option<String>,
    /// Serialized console arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Stack trace, if captured.
    #[serde(default)]
    pub stack_trace: Option<Value>,
}

impl LogEntry {
    /// Returns `true` for uncaught JavaScript errors.
    #[inline]
    #[must_use]
    pub fn is_javascript_error(&self) -> bool {
        self.entry_type == "javascript"
    }
}

// ============================================================================
// LogModule
// ============================================================================

/// The `log` protocol module. Events only.
#[derive(Clone)]
pub struct LogModule {
    events: Arc<EventRegistry>,
    entry_added: ObservableEvent<LogEntry>,
}

impl LogModule {
    /// Module name on the wire.
    pub const NAME: &'static str = "log";

    pub(crate) fn new() -> Result<Self> {
        let entry_added = ObservableEvent::new("log.entryAdded");

        let mut events = EventRegistry::new(Self::NAME);
        events.register(entry_added.name(), &entry_added)?;

        Ok(Self {
            events: Arc::new(events),
            entry_added,
        })
    }

    /// `log.entryAdded`.
    #[inline]
    #[must_use]
    pub fn on_entry_added(&self) -> &ObservableEvent<LogEntry> {
        &self.entry_added
    }
}

impl Module for LogModule {
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
