//! Driver tests against an in-process WebSocket server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, bail};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use webdriver_bidi::modules::{EventRegistry, Module, ObservableEvent};
use webdriver_bidi::{BrowsingContextId, Driver, DriverBuilder, Error};

// ============================================================================
// Helpers
// ============================================================================

type ServerSocket = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connects a driver to a fresh local server.
async fn connect(builder: DriverBuilder) -> anyhow::Result<(Driver, ServerSocket)> {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("ws://{}", listener.local_addr()?);

    let accept = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        anyhow::Ok(tokio_tungstenite::accept_async(stream).await?)
    });

    let driver = builder.connect(&url).await?;
    let server = accept.await??;
    Ok((driver, server))
}

/// Reads the next text frame as JSON.
async fn recv_json(server: &mut ServerSocket) -> anyhow::Result<Value> {
    loop {
        let frame = timeout(WAIT, server.next())
            .await
            .context("timed out waiting for a frame")?
            .context("socket closed")??;

        if let Message::Text(text) = frame {
            return Ok(serde_json::from_str(text.as_str())?);
        }
    }
}

async fn send_json(server: &mut ServerSocket, value: Value) -> anyhow::Result<()> {
    server.send(Message::Text(value.to_string().into())).await?;
    Ok(())
}

fn command_id(command: &Value) -> anyhow::Result<u64> {
    command["id"].as_u64().context("command has no integer id")
}

async fn reply(server: &mut ServerSocket, id: u64, result: Value) -> anyhow::Result<()> {
    send_json(server, json!({ "id": id, "type": "success", "result": result })).await
}

async fn next_from<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> anyhow::Result<T> {
    timeout(WAIT, rx.recv())
        .await
        .context("timed out waiting for observer")?
        .context("observer channel closed")
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn create_tab_resolves_with_context() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let client = driver.clone();
    let call = tokio::spawn(async move { client.browsing_context().create_tab().await });

    let command = recv_json(&mut server).await?;
    assert_eq!(command["method"], "browsingContext.create");
    assert_eq!(command["params"], json!({ "type": "tab" }));

    reply(&mut server, command_id(&command)?, json!({ "context": "abc" })).await?;

    let created = call.await??;
    assert_eq!(created.context, "abc");
    assert_eq!(driver.pending_count(), 0);

    driver.close().await;
    Ok(())
}

#[tokio::test]
async fn out_of_order_responses_resolve_their_own_callers() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let mut calls = Vec::new();
    for n in 0..5u64 {
        let client = driver.clone();
        calls.push(tokio::spawn(async move {
            let result: Value = client
                .execute_command("test.echo", &json!({ "n": n }))
                .await?;
            anyhow::Ok((n, result))
        }));
    }

    let mut received = Vec::new();
    for _ in 0..5 {
        let command = recv_json(&mut server).await?;
        received.push((command_id(&command)?, command["params"]["n"].clone()));
    }

    let mut ids: Vec<u64> = received.iter().map(|(id, _)| *id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5, "ids must be unique");
    assert!(ids.iter().all(|id| *id >= 1));

    for (id, n) in received.into_iter().rev() {
        reply(&mut server, id, json!({ "echo": n })).await?;
    }

    for call in calls {
        let (n, result) = call.await??;
        assert_eq!(result, json!({ "echo": n }));
    }

    driver.close().await;
    Ok(())
}

#[tokio::test]
async fn ids_increase_across_sequential_commands() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let mut last = 0;
    for _ in 0..3 {
        let client = driver.clone();
        let call = tokio::spawn(async move { client.session().status().await });

        let command = recv_json(&mut server).await?;
        let id = command_id(&command)?;
        assert!(id > last);
        last = id;

        reply(&mut server, id, json!({ "ready": true, "message": "" })).await?;
        assert!(call.await??.ready);
    }

    driver.close().await;
    Ok(())
}

#[tokio::test]
async fn error_response_surfaces_as_protocol_error() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let client = driver.clone();
    let call = tokio::spawn(async move {
        client
            .browsing_context()
            .activate(&BrowsingContextId::new("missing"))
            .await
    });

    let command = recv_json(&mut server).await?;
    send_json(
        &mut server,
        json!({
            "id": command_id(&command)?,
            "type": "error",
            "error": "no such frame",
            "message": "context missing not found"
        }),
    )
    .await?;

    let err = call.await?.expect_err("error response");
    assert!(err.is_protocol_error());
    assert_eq!(err.protocol_code(), Some("no such frame"));

    driver.close().await;
    Ok(())
}

#[tokio::test]
async fn timeout_is_isolated_and_late_response_discarded() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let client = driver.clone();
    let slow = tokio::spawn(async move {
        client
            .execute_command_with_timeout::<_, Value>(
                "test.slow",
                &json!({}),
                Duration::from_millis(100),
            )
            .await
    });
    let slow_command = recv_json(&mut server).await?;

    let client = driver.clone();
    let fast = tokio::spawn(async move {
        client
            .execute_command::<_, Value>("test.fast", &json!({}))
            .await
    });
    let fast_command = recv_json(&mut server).await?;

    let err = slow.await?.expect_err("should time out");
    assert!(err.is_timeout());
    match err {
        Error::CommandTimeout { method, .. } => assert_eq!(method, "test.slow"),
        other => bail!("unexpected error {other}"),
    }

    // Late response for the timed-out command is dropped.
    reply(&mut server, command_id(&slow_command)?, json!({ "late": true })).await?;
    reply(&mut server, command_id(&fast_command)?, json!({ "ok": true })).await?;

    assert_eq!(fast.await??, json!({ "ok": true }));
    assert_eq!(driver.pending_count(), 0);
    assert!(driver.is_connected());

    driver.close().await;
    Ok(())
}

#[tokio::test]
async fn pending_limit_rejects_excess_commands() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder().max_pending_commands(1)).await?;

    let client = driver.clone();
    let first = tokio::spawn(async move {
        client
            .execute_command::<_, Value>("test.first", &json!({}))
            .await
    });
    let command = recv_json(&mut server).await?;

    let err = driver
        .execute_command::<_, Value>("test.second", &json!({}))
        .await
        .expect_err("over limit");
    assert!(matches!(err, Error::InvalidArgument { .. }));

    reply(&mut server, command_id(&command)?, json!({})).await?;
    first.await??;

    driver.close().await;
    Ok(())
}

#[tokio::test]
async fn connection_loss_fails_pending_commands() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let client = driver.clone();
    let call = tokio::spawn(async move { client.session().status().await });
    recv_json(&mut server).await?;

    drop(server);

    let err = timeout(WAIT, call).await??.expect_err("connection lost");
    assert!(matches!(err, Error::ConnectionClosed));
    assert_eq!(driver.pending_count(), 0);

    let err = driver.session().status().await.expect_err("closed");
    assert!(err.is_connection_error());
    Ok(())
}

#[tokio::test]
async fn close_fails_outstanding_commands() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let client = driver.clone();
    let call = tokio::spawn(async move { client.session().end().await });
    recv_json(&mut server).await?;

    driver.close().await;

    let err = timeout(WAIT, call).await??.expect_err("closed");
    assert!(matches!(err, Error::ConnectionClosed));
    assert!(!driver.is_connected());
    Ok(())
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn context_created_reaches_observer() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    driver
        .browsing_context()
        .on_context_created()
        .add_observer(move |info| {
            let _ = tx.send(info);
        });

    send_json(
        &mut server,
        json!({
            "type": "event",
            "method": "browsingContext.contextCreated",
            "params": {
                "context": "abc",
                "url": "about:blank",
                "children": null,
                "userContext": "default",
                "originalOpener": null
            }
        }),
    )
    .await?;

    let info = next_from(&mut rx).await?;
    assert_eq!(info.context, "abc");
    assert_eq!(info.url, "about:blank");

    driver.close().await;
    Ok(())
}

#[tokio::test]
async fn event_fans_out_in_subscription_order() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handles = Vec::new();
    for index in 0..4usize {
        let tx = tx.clone();
        handles.push(driver.log().on_entry_added().add_observer(move |_entry| {
            let _ = tx.send(index);
        }));
    }
    assert_eq!(driver.log().on_entry_added().observer_count(), 4);

    let entry = json!({
        "type": "event",
        "method": "log.entryAdded",
        "params": {
            "type": "console",
            "method": "log",
            "level": "info",
            "source": { "realm": "r1" },
            "text": "hi",
            "timestamp": 1,
            "args": []
        }
    });

    send_json(&mut server, entry.clone()).await?;
    let mut order = Vec::new();
    for _ in 0..4 {
        order.push(next_from(&mut rx).await?);
    }
    assert_eq!(order, vec![0, 1, 2, 3]);

    assert!(handles[1].unobserve());
    send_json(&mut server, entry).await?;
    let mut order = Vec::new();
    for _ in 0..3 {
        order.push(next_from(&mut rx).await?);
    }
    assert_eq!(order, vec![0, 2, 3]);

    driver.close().await;
    Ok(())
}

#[tokio::test]
async fn events_are_delivered_in_frame_order() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let created = tx.clone();
    driver
        .script()
        .on_realm_created()
        .add_async_observer(move |realm| {
            let tx = created.clone();
            async move {
                // Yield so a racing worker would reorder.
                tokio::time::sleep(Duration::from_millis(20)).await;
                let _ = tx.send(format!("created {}", realm.realm));
            }
        });
    driver.script().on_realm_destroyed().add_observer(move |gone| {
        let _ = tx.send(format!("destroyed {}", gone.realm));
    });

    send_json(
        &mut server,
        json!({
            "type": "event",
            "method": "script.realmCreated",
            "params": { "realm": "r1", "origin": "null", "type": "window", "context": "abc" }
        }),
    )
    .await?;
    send_json(
        &mut server,
        json!({ "type": "event", "method": "script.realmDestroyed", "params": { "realm": "r1" } }),
    )
    .await?;

    assert_eq!(next_from(&mut rx).await?, "created r1");
    assert_eq!(next_from(&mut rx).await?, "destroyed r1");

    driver.close().await;
    Ok(())
}

#[tokio::test]
async fn bad_and_unknown_events_do_not_stop_delivery() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    driver
        .browsing_context()
        .on_context_destroyed()
        .add_observer(move |info| {
            let _ = tx.send(info.context);
        });

    // Unknown module, unknown event, undecodable params, non-protocol noise.
    send_json(&mut server, json!({ "type": "event", "method": "vendor.thing", "params": {} })).await?;
    send_json(
        &mut server,
        json!({ "type": "event", "method": "browsingContext.historyUpdated", "params": {} }),
    )
    .await?;
    send_json(
        &mut server,
        json!({ "type": "event", "method": "browsingContext.contextDestroyed", "params": { "context": 7 } }),
    )
    .await?;
    send_json(&mut server, json!({ "hello": "world" })).await?;
    server.send(Message::Text("not json".into())).await?;

    send_json(
        &mut server,
        json!({
            "type": "event",
            "method": "browsingContext.contextDestroyed",
            "params": { "context": "gone", "url": "about:blank" }
        }),
    )
    .await?;

    assert_eq!(next_from(&mut rx).await?, "gone");
    assert!(driver.is_connected());

    driver.close().await;
    Ok(())
}

#[tokio::test]
async fn panicking_observer_does_not_block_others() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();

    driver.network().on_fetch_error().add_observer(|_| panic!("observer failure"));
    let counter = Arc::clone(&calls);
    driver.network().on_fetch_error().add_observer(move |error| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(error.error_text);
    });

    send_json(
        &mut server,
        json!({
            "type": "event",
            "method": "network.fetchError",
            "params": {
                "context": "abc",
                "request": { "request": "1", "url": "https://example.com/", "method": "GET" },
                "errorText": "net::ERR_NAME_NOT_RESOLVED",
                "timestamp": 5
            }
        }),
    )
    .await?;

    assert_eq!(next_from(&mut rx).await?, "net::ERR_NAME_NOT_RESOLVED");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    driver.close().await;
    Ok(())
}

// ============================================================================
// Custom Modules
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct Ping {
    count: u64,
}

struct VendorModule {
    events: Arc<EventRegistry>,
    pinged: ObservableEvent<Ping>,
}

impl VendorModule {
    fn new(name: &'static str) -> webdriver_bidi::Result<Self> {
        let pinged = ObservableEvent::new(format!("{name}.pinged"));
        let mut events = EventRegistry::new(name);
        events.register(&format!("{name}.pinged"), &pinged)?;
        Ok(Self {
            events: Arc::new(events),
            pinged,
        })
    }
}

impl Module for VendorModule {
    fn name(&self) -> &'static str {
        self.events.module()
    }

    fn events(&self) -> Arc<EventRegistry> {
        Arc::clone(&self.events)
    }
}

#[tokio::test]
async fn custom_module_receives_its_events() -> anyhow::Result<()> {
    let (driver, mut server) = connect(Driver::builder()).await?;

    let vendor = VendorModule::new("vendor")?;
    driver.register_module(&vendor)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    vendor.pinged.add_observer(move |ping| {
        let _ = tx.send(ping.count);
    });

    send_json(
        &mut server,
        json!({ "type": "event", "method": "vendor.pinged", "params": { "count": 3 } }),
    )
    .await?;
    assert_eq!(next_from(&mut rx).await?, 3);

    driver.close().await;
    Ok(())
}

#[tokio::test]
async fn duplicate_module_name_is_rejected() -> anyhow::Result<()> {
    let (driver, _server) = connect(Driver::builder()).await?;

    let err = driver
        .register_module(&VendorModule::new("log")?)
        .expect_err("duplicate");
    assert!(matches!(err, Error::DuplicateRegistration { .. }));

    driver.close().await;
    Ok(())
}
