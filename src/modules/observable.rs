//! Typed multi-subscriber notification points.
//!
//! An [`ObservableEvent<T>`] keeps an ordered list of observers. Each
//! observer gets a clone of the event arguments, in subscription order.
//!
//! # Example
//!
//! ```
//! use webdriver_bidi::modules::ObservableEvent;
//!
//! # async fn example() {
//! let event: ObservableEvent<String> = ObservableEvent::new("log.entryAdded");
//!
//! let observer = event.add_observer(|text| println!("got {text}"));
//! event.notify_observers("hello".to_string()).await;
//!
//! observer.unobserve();
//! assert_eq!(event.observer_count(), 0);
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::identifiers::ObserverId;

// ============================================================================
// Types
// ============================================================================

/// Boxed observer callback.
pub type ObserverFn<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

/// Shared observer list.
struct ObserverList<T> {
    /// Event name, for logs.
    name: String,
    /// Observers in subscription order.
    entries: RwLock<Vec<(ObserverId, ObserverFn<T>)>>,
    /// Next observer id.
    next_id: AtomicU64,
}

impl<T> ObserverList<T> {
    fn contains(&self, id: ObserverId) -> bool {
        self.entries.read().iter().any(|(entry, _)| *entry == id)
    }

    fn remove(&self, id: ObserverId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }
}

// ============================================================================
// ObservableEvent
// ============================================================================

/// A typed event that any number of observers can subscribe to.
///
/// Cloning yields another handle to the same observer list.
pub struct ObservableEvent<T> {
    observers: Arc<ObserverList<T>>,
}

impl<T> Clone for ObservableEvent<T> {
    fn clone(&self) -> Self {
        Self {
            observers: Arc::clone(&self.observers),
        }
    }
}

impl<T> fmt::Debug for ObservableEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableEvent")
            .field("name", &self.observers.name)
            .field("observers", &self.observers.entries.read().len())
            .finish()
    }
}

impl<T> ObservableEvent<T>
where
    T: Clone + Send + 'static,
{
    /// Creates an event with no observers.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            observers: Arc::new(ObserverList {
                name: name.into(),
                entries: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the event name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.observers.name
    }

    /// Returns the number of current observers.
    #[inline]
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.entries.read().len()
    }

    /// Subscribes a synchronous callback.
    pub fn add_observer<F>(&self, callback: F) -> Observer<T>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.add_async_observer(move |args| {
            callback(args);
            future::ready(())
        })
    }

    /// Subscribes an asynchronous callback.
    ///
    /// Notification awaits the returned future before moving on to the
    /// next observer.
    pub fn add_async_observer<F, Fut>(&self, callback: F) -> Observer<T>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: ObserverFn<T> = Arc::new(move |args| callback(args).boxed());
        let id = ObserverId::new(self.observers.next_id.fetch_add(1, Ordering::Relaxed));

        self.observers.entries.write().push((id, handler));
        trace!(event = %self.observers.name, observer = %id, "Observer added");

        Observer {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    /// Notifies every current observer with a clone of `args`.
    ///
    /// Iterates over a snapshot, so observers may unsubscribe themselves or
    /// each other while the pass runs. An observer removed mid-pass is not
    /// called afterwards. A panicking observer is logged and skipped.
    ///
    /// Returns the number of observers that completed normally.
    pub async fn notify_observers(&self, args: T) -> usize {
        let snapshot: Vec<(ObserverId, ObserverFn<T>)> = self.observers.entries.read().clone();
        let mut delivered = 0;

        for (id, handler) in snapshot {
            if !self.observers.contains(id) {
                continue;
            }

            let args = args.clone();
            let outcome = AssertUnwindSafe(async move { handler(args).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(()) => delivered += 1,
                Err(_) => warn!(event = %self.observers.name, observer = %id, "Observer panicked"),
            }
        }

        delivered
    }
}

// ============================================================================
// Observer
// ============================================================================

/// Handle to one subscription.
///
/// Dropping the handle keeps the subscription; call [`Observer::unobserve`]
/// to remove it.
pub struct Observer<T> {
    id: ObserverId,
    observers: Weak<ObserverList<T>>,
}

impl<T> Observer<T> {
    /// Returns the observer id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Removes this observer.
    ///
    /// Returns `false` if it was already removed or the event is gone.
    pub fn unobserve(&self) -> bool {
        match self.observers.upgrade() {
            Some(list) => {
                let removed = list.remove(self.id);
                if removed {
                    trace!(event = %list.name, observer = %self.id, "Observer removed");
                }
                removed
            }
            None => false,
        }
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").field("id", &self.id).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
