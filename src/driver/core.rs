//! BiDi driver: command correlation and event dispatch.
//!
//! The [`Driver`] is the façade callers and modules use. It sends commands
//! through the [`Transport`], keeps one pending entry per outstanding
//! command id, and classifies every inbound document as either the response
//! to a pending command or an event for a module.
//!
//! # Example
//!
//! ```no_run
//! use webdriver_bidi::Driver;
//!
//! # async fn example() -> webdriver_bidi::Result<()> {
//! let driver = Driver::builder()
//!     .connect("ws://127.0.0.1:9222/session")
//!     .await?;
//!
//! let status = driver.session().status().await?;
//! println!("ready: {}", status.ready);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::launcher::BrowserLauncher;
use crate::modules::{
    BrowsingContextModule, EventRegistry, LogModule, Module, NetworkModule, ScriptModule,
    SessionModule,
};
use crate::protocol::{Event, Message};
use crate::transport::{Connection, MessageCodec, Transport};

use super::builder::{DriverBuilder, DriverConfig};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for command execution.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum number of outstanding commands.
pub const DEFAULT_MAX_PENDING_COMMANDS: usize = 1000;

// ============================================================================
// Types
// ============================================================================

/// A command waiting for its response.
struct PendingCommand {
    /// Method name, for logs.
    method: String,
    /// Completion signal.
    completion: oneshot::Sender<Result<Value>>,
}

/// Outstanding commands by id.
type PendingMap = FxHashMap<CommandId, PendingCommand>;

/// Module event tables by module name.
type ModuleMap = FxHashMap<String, Arc<EventRegistry>>;

// ============================================================================
// DriverInner
// ============================================================================

/// Shared state behind [`Driver`] and the built-in modules.
pub(crate) struct DriverInner {
    /// Command transport.
    transport: Transport,
    /// Outstanding commands.
    pending: Mutex<PendingMap>,
    /// Event tables of registered modules.
    modules: Arc<RwLock<ModuleMap>>,
    /// Queue feeding the event worker.
    events_tx: mpsc::UnboundedSender<Event>,
    /// Default command deadline.
    command_timeout: Duration,
    /// Outstanding command limit.
    max_pending: usize,
}

impl DriverInner {
    /// Sends a command and waits for its typed result.
    pub(crate) async fn execute<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.execute_with_timeout(method, params, self.command_timeout)
            .await
    }

    /// Sends a command with an explicit deadline and waits for its typed result.
    pub(crate) async fn execute_with_timeout<P, R>(
        &self,
        method: &str,
        params: &P,
        deadline: Duration,
    ) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let result = self.execute_value(method, params, deadline).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Sends a command and waits for its raw result.
    async fn execute_value(&self, method: &str, params: Value, deadline: Duration) -> Result<Value> {
        let command = self.transport.next_command(method, params);
        let command_id = command.id;
        let (completion, response_rx) = oneshot::channel();

        // Register before sending so a fast response cannot be missed.
        {
            let mut pending = self.pending.lock();
            if pending.len() >= self.max_pending {
                warn!(
                    pending = pending.len(),
                    max = self.max_pending,
                    "Too many pending commands"
                );
                return Err(Error::invalid_argument(format!(
                    "Too many pending commands: {}/{}",
                    pending.len(),
                    self.max_pending
                )));
            }
            pending.insert(
                command_id,
                PendingCommand {
                    method: command.method.clone(),
                    completion,
                },
            );
        }

        if let Err(e) = self.transport.send(&command) {
            self.pending.lock().remove(&command_id);
            return Err(e);
        }

        debug!(%command_id, %method, "Command sent");

        match timeout(deadline, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                // Free the slot; a late response is then discarded by dispatch.
                self.pending.lock().remove(&command_id);
                warn!(%command_id, %method, timeout_ms = deadline.as_millis() as u64, "Command timed out");
                Err(Error::command_timeout(
                    command_id,
                    method,
                    deadline.as_millis() as u64,
                ))
            }
        }
    }

    /// Classifies one inbound document.
    ///
    /// Runs on the connection's reader task; never awaits.
    fn dispatch(&self, document: Value) {
        match Message::from_value(document) {
            Message::Response(response) => {
                let command_id = response.id;
                let pending = self.pending.lock().remove(&command_id);

                match pending {
                    Some(pending) => {
                        trace!(%command_id, method = %pending.method, success = response.is_success(), "Response received");
                        let _ = pending.completion.send(response.into_result());
                    }
                    None => {
                        debug!(%command_id, "Response for unknown or timed-out command");
                    }
                }
            }

            Message::Event(event) => {
                trace!(method = %event.method, "Event received");
                if self.events_tx.send(event).is_err() {
                    debug!("Event worker stopped, dropping event");
                }
            }

            Message::Unknown(document) => {
                debug!(%document, "Dropping unrecognized message");
            }
        }
    }

    /// Fails every outstanding command with [`Error::ConnectionClosed`].
    fn fail_pending_commands(&self) {
        let pending: Vec<_> = self.pending.lock().drain().collect();
        let count = pending.len();

        for (_, command) in pending {
            let _ = command.completion.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending commands on connection loss");
        }
    }

    /// Adds a module's event table.
    fn register_module(&self, module: &dyn Module) -> Result<()> {
        let name = module.name();
        let mut modules = self.modules.write();

        if modules.contains_key(name) {
            return Err(Error::duplicate_registration(name));
        }

        modules.insert(name.to_string(), module.events());
        debug!(module = name, "Module registered");
        Ok(())
    }
}

// ============================================================================
// Event Worker
// ============================================================================

/// Delivers queued events to module observers in arrival order.
async fn run_event_worker(
    mut events_rx: mpsc::UnboundedReceiver<Event>,
    modules: Arc<RwLock<ModuleMap>>,
) {
    while let Some(event) = events_rx.recv().await {
        let registry = modules.read().get(event.module()).cloned();

        let Some(registry) = registry else {
            trace!(method = %event.method, "No module for event");
            continue;
        };

        match registry.invoke(&event.method, event.params).await {
            Ok(Some(notified)) => trace!(method = %event.method, notified, "Event delivered"),
            Ok(None) => trace!(method = %event.method, "Event not registered by module"),
            Err(e) => warn!(method = %event.method, error = %e, "Failed to decode event"),
        }
    }

    debug!("Event worker terminated");
}

// ============================================================================
// Modules
// ============================================================================

/// Built-in protocol modules.
struct Modules {
    session: SessionModule,
    browsing_context: BrowsingContextModule,
    network: NetworkModule,
    log: LogModule,
    script: ScriptModule,
}

// ============================================================================
// Driver
// ============================================================================

/// WebDriver BiDi client.
///
/// Cheap to clone; all clones share one connection.
///
/// # Thread Safety
///
/// Commands may be issued concurrently from any number of tasks. Responses
/// are matched by id, so they resolve correctly in any arrival order.
#[derive(Clone)]
pub struct Driver {
    /// Shared inner state.
    inner: Arc<DriverInner>,
    /// Built-in modules.
    modules: Arc<Modules>,
}

// ============================================================================
// Driver - Display
// ============================================================================

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("transport", &self.inner.transport)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Driver - Public API
// ============================================================================

impl Driver {
    /// Creates a configuration builder for the driver.
    #[inline]
    #[must_use]
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    /// Starts a browser through `launcher` and connects to it.
    ///
    /// Uses the launcher's codec unless `builder` sets one. If connecting
    /// fails the browser is quit again.
    ///
    /// # Errors
    ///
    /// - launcher errors from `start` and `launch_browser`
    /// - everything [`DriverBuilder::connect`] returns
    pub async fn launch<L>(launcher: &mut L, builder: DriverBuilder) -> Result<Self>
    where
        L: BrowserLauncher + ?Sized,
    {
        launcher.start().await?;
        launcher.launch_browser().await?;

        match builder.connect_launcher(&*launcher).await {
            Ok(driver) => Ok(driver),
            Err(e) => {
                if let Err(quit) = launcher.quit_browser().await {
                    warn!(error = %quit, "Failed to quit browser after connect failure");
                }
                Err(e)
            }
        }
    }

    /// Sends a command and waits for its typed result.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the remote end answers with an error
    /// - [`Error::CommandTimeout`] if no response arrives in time
    /// - [`Error::ConnectionClosed`] if the connection is lost
    /// - [`Error::BridgeNotReady`] if the CDP bridge cannot carry commands
    /// - [`Error::Json`] if params or result do not (de)serialize
    pub async fn execute_command<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.inner.execute(method, params).await
    }

    /// Sends a command with a per-call deadline.
    ///
    /// # Errors
    ///
    /// Same as [`Driver::execute_command`].
    pub async fn execute_command_with_timeout<P, R>(
        &self,
        method: &str,
        params: &P,
        deadline: Duration,
    ) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.inner
            .execute_with_timeout(method, params, deadline)
            .await
    }

    /// Registers an additional module's events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateRegistration`] if a module with the same
    /// name is already registered.
    pub fn register_module(&self, module: &dyn Module) -> Result<()> {
        self.inner.register_module(module)
    }

    /// The `session` module.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &SessionModule {
        &self.modules.session
    }

    /// The `browsingContext` module.
    #[inline]
    #[must_use]
    pub fn browsing_context(&self) -> &BrowsingContextModule {
        &self.modules.browsing_context
    }

    /// The `network` module.
    #[inline]
    #[must_use]
    pub fn network(&self) -> &NetworkModule {
        &self.modules.network
    }

    /// The `log` module.
    #[inline]
    #[must_use]
    pub fn log(&self) -> &LogModule {
        &self.modules.log
    }

    /// The `script` module.
    #[inline]
    #[must_use]
    pub fn script(&self) -> &ScriptModule {
        &self.modules.script
    }

    /// Returns the number of outstanding commands.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Returns `true` while the connection is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected()
    }

    /// Closes the connection.
    ///
    /// Outstanding commands fail with [`Error::ConnectionClosed`].
    pub async fn close(&self) {
        info!("Closing driver");
        self.inner.transport.close().await;
        self.inner.fail_pending_commands();
    }
}

// ============================================================================
// Driver - Internal API
// ============================================================================

impl Driver {
    /// Connects to `url` and wires the driver.
    pub(crate) async fn connect_with(
        url: &str,
        codec: Arc<dyn MessageCodec>,
        config: DriverConfig,
    ) -> Result<Self> {
        let connection = Connection::connect(url, config.connect_timeout).await?;
        info!(%url, codec = codec.name(), "Driver connected");
        Self::from_connection(connection, codec, config).await
    }

    /// Builds a driver over an established connection.
    ///
    /// Runs the codec initialization; on failure the connection is closed.
    pub(crate) async fn from_connection(
        connection: Connection,
        codec: Arc<dyn MessageCodec>,
        config: DriverConfig,
    ) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let modules = Arc::new(RwLock::new(ModuleMap::default()));

        let inner = Arc::new(DriverInner {
            transport: Transport::new(connection, codec),
            pending: Mutex::new(PendingMap::default()),
            modules: Arc::clone(&modules),
            events_tx,
            command_timeout: config.command_timeout,
            max_pending: config.max_pending,
        });

        tokio::spawn(run_event_worker(events_rx, modules));

        // Handlers hold weak references; the connection lives inside `inner`.
        let weak: Weak<DriverInner> = Arc::downgrade(&inner);
        inner.transport.on_message(Box::new(move |document| {
            if let Some(inner) = weak.upgrade() {
                inner.dispatch(document);
            }
        }));

        let weak: Weak<DriverInner> = Arc::downgrade(&inner);
        inner.transport.on_closed(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                info!("Connection lost");
                inner.fail_pending_commands();
            }
        }));

        let modules = Modules {
            session: SessionModule::new(Arc::clone(&inner))?,
            browsing_context: BrowsingContextModule::new(Arc::clone(&inner))?,
            network: NetworkModule::new(Arc::clone(&inner))?,
            log: LogModule::new()?,
            script: ScriptModule::new(Arc::clone(&inner))?,
        };

        inner.register_module(&modules.session)?;
        inner.register_module(&modules.browsing_context)?;
        inner.register_module(&modules.network)?;
        inner.register_module(&modules.log)?;
        inner.register_module(&modules.script)?;

        if let Err(e) = inner.transport.initialize().await {
            inner.transport.close().await;
            return Err(e);
        }

        Ok(Self {
            inner,
            modules: Arc::new(modules),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
