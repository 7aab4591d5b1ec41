//! WebSocket connection and event loop.
//!
//! This module owns the WebSocket to the remote end. It has no protocol
//! knowledge: it writes whole text frames and hands every inbound frame to a
//! single data handler.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming frames from the remote end (one handler call per frame)
//! - Outgoing frames from any number of senders, written one at a time
//! - Shutdown and the closed notification

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for establishing the WebSocket.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `close` waits for the event loop to wind down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// Data-received callback.
///
/// Called once per inbound frame, sequentially, on the connection's reader task.
pub type DataHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Closed callback, fired once when the event loop terminates.
pub type CloseHandler = Box<dyn FnOnce() + Send>;

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write one text frame.
    Send(String),
    /// Close the socket and stop the loop.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to the remote end.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone. Frames sent from
/// different tasks are queued and written whole, never interleaved.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Whether the socket is still usable.
    connected: Arc<AtomicBool>,
    /// Data handler (shared with event loop).
    data_handler: Arc<Mutex<Option<DataHandler>>>,
    /// Close handler (shared with event loop).
    close_handler: Arc<Mutex<Option<CloseHandler>>>,
    /// Event loop task, awaited on close.
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Connection {
    /// Connects to a `ws://` or `wss://` URL.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the URL is not a WebSocket URL
    /// - [`Error::ConnectionTimeout`] if the handshake does not finish in time
    /// - [`Error::Connection`] if the remote is unreachable or refuses
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::invalid_argument(format!("Invalid WebSocket URL '{url}': {e}")))?;

        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::invalid_argument(format!(
                "WebSocket URL must use ws:// or wss://, got '{url}'"
            )));
        }

        let (ws_stream, _) = timeout(connect_timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))?
            .map_err(|e| Error::connection(format!("{url}: {e}")))?;

        debug!(%url, "WebSocket connection established");

        Ok(Self::from_stream(ws_stream))
    }

    /// Wraps an established WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let data_handler: Arc<Mutex<Option<DataHandler>>> = Arc::new(Mutex::new(None));
        let close_handler: Arc<Mutex<Option<CloseHandler>>> = Arc::new(Mutex::new(None));

        let task = tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&connected),
            Arc::clone(&data_handler),
            Arc::clone(&close_handler),
        ));

        Self {
            command_tx,
            connected,
            data_handler,
            close_handler,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Sets the data-received handler, replacing any previous one.
    pub fn set_data_handler(&self, handler: DataHandler) {
        *self.data_handler.lock() = Some(handler);
    }

    /// Sets the closed handler.
    ///
    /// If the connection is already closed the handler runs immediately.
    pub fn set_close_handler(&self, handler: CloseHandler) {
        if !self.is_connected() {
            handler();
            return;
        }

        *self.close_handler.lock() = Some(handler);

        // The loop may have finished between the check and the store.
        if !self.is_connected()
            && let Some(handler) = self.close_handler.lock().take()
        {
            handler();
        }
    }

    /// Queues one text frame for sending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection is closed.
    pub fn send(&self, text: String) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::ConnectionClosed);
        }

        self.command_tx
            .send(ConnectionCommand::Send(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Returns `true` while the socket is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Closes the connection and waits for the event loop to finish.
    ///
    /// Idempotent: later calls return immediately.
    pub async fn close(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);

        let task = self.task.lock().take();
        if let Some(task) = task
            && timeout(CLOSE_TIMEOUT, task).await.is_err()
        {
            warn!("Event loop did not stop within close timeout");
        }
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        connected: Arc<AtomicBool>,
        data_handler: Arc<Mutex<Option<DataHandler>>>,
        close_handler: Arc<Mutex<Option<CloseHandler>>>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the remote end
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::deliver(text.as_str(), &data_handler);
                        }

                        Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                            Ok(text) => Self::deliver(text, &data_handler),
                            Err(_) => warn!(len = data.len(), "Dropping non-UTF-8 binary frame"),
                        },

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Ping, Pong, raw frames
                        _ => {}
                    }
                }

                // Frames queued by senders
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(text)) => {
                            trace!(len = text.len(), "Sending frame");
                            if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                error!(error = %e, "Failed to write frame");
                                break;
                            }
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        connected.store(false, Ordering::Release);

        let handler = close_handler.lock().take();
        if let Some(handler) = handler {
            handler();
        }

        debug!("Event loop terminated");
    }

    /// Hands one inbound frame to the data handler.
    fn deliver(text: &str, data_handler: &Arc<Mutex<Option<DataHandler>>>) {
        let handler = data_handler.lock();
        match *handler {
            Some(ref handler) => handler(text),
            None => trace!(len = text.len(), "Frame received with no data handler"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    /// Binds a local server and returns (client connection, server socket).
    async fn connected_pair() -> (Connection, WebSocketStream<tokio::net::TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("ws://{}", listener.local_addr().expect("addr"));

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            tokio_tungstenite::accept_async(stream).await.expect("upgrade")
        });

        let connection = Connection::connect(&url, DEFAULT_CONNECT_TIMEOUT)
            .await
            .expect("connect");
        (connection, server.await.expect("server"))
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_CONNECT_TIMEOUT.as_secs(), 30);
    }

    #[tokio::test]
    async fn test_rejects_non_websocket_url() {
        let err = Connection::connect("http://127.0.0.1:1", DEFAULT_CONNECT_TIMEOUT)
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };

        let err = Connection::connect(&format!("ws://127.0.0.1:{port}"), DEFAULT_CONNECT_TIMEOUT)
            .await
            .err()
            .expect("should fail");
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_send_and_receive_frames() {
        let (connection, mut server) = connected_pair().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        connection.set_data_handler(Box::new(move |text| {
            let _ = tx.send(text.to_string());
        }));

        connection.send("hello".to_string()).expect("send");
        let received = server.next().await.expect("frame").expect("ok");
        assert_eq!(received.into_text().expect("text").as_str(), "hello");

        server
            .send(Message::Text("world".into()))
            .await
            .expect("server send");
        assert_eq!(rx.recv().await.as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_fires_handler() {
        let (connection, _server) = connected_pair().await;

        let (tx, rx) = tokio::sync::oneshot::channel();
        connection.set_close_handler(Box::new(move || {
            let _ = tx.send(());
        }));

        connection.close().await;
        connection.close().await;

        rx.await.expect("close handler fired");
        assert!(!connection.is_connected());
        assert!(matches!(
            connection.send("late".to_string()),
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_remote_close_fires_handler() {
        let (connection, mut server) = connected_pair().await;

        let (tx, rx) = tokio::sync::oneshot::channel();
        connection.set_close_handler(Box::new(move || {
            let _ = tx.send(());
        }));

        server.close(None).await.expect("server close");
        rx.await.expect("close handler fired");
        assert!(!connection.is_connected());
    }
}
