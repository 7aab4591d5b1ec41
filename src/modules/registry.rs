//! Per-module event registration table.
//!
//! Maps wire method names to a decode step plus the [`ObservableEvent`]
//! that receives the decoded value. Built once when a module is
//! constructed; only read afterwards.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

use super::observable::ObservableEvent;

// ============================================================================
// Types
// ============================================================================

/// Decodes event params and notifies observers.
///
/// Resolves to the number of observers notified.
pub type EventInvoker = Box<dyn Fn(Value) -> BoxFuture<'static, Result<usize>> + Send + Sync>;

// ============================================================================
// EventRegistry
// ============================================================================

/// Event method table of one module.
pub struct EventRegistry {
    /// Module name, the method prefix before the first `.`.
    module: &'static str,
    /// Invokers by full method name.
    invokers: FxHashMap<String, EventInvoker>,
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.methods().collect();
        methods.sort_unstable();

        f.debug_struct("EventRegistry")
            .field("module", &self.module)
            .field("methods", &methods)
            .finish()
    }
}

impl EventRegistry {
    /// Creates an empty table for `module`.
    #[must_use]
    pub fn new(module: &'static str) -> Self {
        Self {
            module,
            invokers: FxHashMap::default(),
        }
    }

    /// Returns the module name.
    #[inline]
    #[must_use]
    pub fn module(&self) -> &'static str {
        self.module
    }

    /// Registers `event` as the target for `method`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `method` is not `<module>.<name>`
    /// - [`Error::DuplicateRegistration`] if `method` is already registered
    pub fn register<T>(&mut self, method: &str, event: &ObservableEvent<T>) -> Result<()>
    where
        T: DeserializeOwned + Clone + Send + 'static,
    {
        let belongs = method
            .split_once('.')
            .is_some_and(|(module, name)| module == self.module && !name.is_empty());

        if !belongs {
            return Err(Error::invalid_argument(format!(
                "Event method '{method}' does not belong to module '{}'",
                self.module
            )));
        }

        if self.invokers.contains_key(method) {
            return Err(Error::duplicate_registration(method));
        }

        let event = event.clone();
        let invoker: EventInvoker = Box::new(move |params| {
            let event = event.clone();
            async move {
                let args: T = serde_json::from_value(params)?;
                Ok(event.notify_observers(args).await)
            }
            .boxed()
        });

        self.invokers.insert(method.to_string(), invoker);
        Ok(())
    }

    /// Returns `true` if `method` is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.invokers.contains_key(method)
    }

    /// Returns the registered method names.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.invokers.keys().map(String::as_str)
    }

    /// Decodes `params` and notifies the observers of `method`.
    ///
    /// Returns `Ok(None)` if `method` is not registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `params` does not decode.
    pub async fn invoke(&self, method: &str, params: Value) -> Result<Option<usize>> {
        match self.invokers.get(method) {
            Some(invoker) => invoker(params).await.map(Some),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct Entry {
        text: String,
    }

    #[test]
    fn test_duplicate_registration() {
        let event: ObservableEvent<Entry> = ObservableEvent::new("log.entryAdded");
        let mut registry = EventRegistry::new("log");

        registry.register("log.entryAdded", &event).expect("first");
        let err = registry
            .register("log.entryAdded", &event)
            .expect_err("second must fail");
        assert!(matches!(err, Error::DuplicateRegistration { .. }));
    }

    #[test]
    fn test_foreign_method_rejected() {
        let event: ObservableEvent<Entry> = ObservableEvent::new("network.x");
        let mut registry = EventRegistry::new("log");

        assert!(matches!(
            registry.register("network.beforeRequestSent", &event),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            registry.register("log.", &event),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_invoke_decodes_and_notifies() {
        let event: ObservableEvent<Entry> = ObservableEvent::new("log.entryAdded");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        event.add_observer(move |entry| sink.lock().push(entry));

        let mut registry = EventRegistry::new("log");
        registry.register("log.entryAdded", &event).expect("register");

        let notified = registry
            .invoke("log.entryAdded", json!({ "text": "hi" }))
            .await
            .expect("invoke");
        assert_eq!(notified, Some(1));
        assert_eq!(*seen.lock(), vec![Entry { text: "hi".into() }]);

        assert_eq!(
            registry.invoke("log.other", json!({})).await.expect("invoke"),
            None
        );
    }

    #[tokio::test]
    async fn test_invoke_decode_failure() {
        let event: ObservableEvent<Entry> = ObservableEvent::new("log.entryAdded");
        let mut registry = EventRegistry::new("log");
        registry.register("log.entryAdded", &event).expect("register");

        let err = registry
            .invoke("log.entryAdded", json!({ "text": 5 }))
            .await
            .expect_err("bad params");
        assert!(matches!(err, Error::Json(_)));
    }
}
