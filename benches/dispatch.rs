//! Dispatch path benchmark suite.
//!
//! Benchmarks the per-frame work on the reader task and the event worker:
//! - Inbound message classification
//! - CDP bridge carrier encoding and decoding
//! - Observer fan-out at different observer counts
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use tokio::runtime::Runtime;

use webdriver_bidi::identifiers::CommandId;
use webdriver_bidi::modules::ObservableEvent;
use webdriver_bidi::protocol::{Command, Message};
use webdriver_bidi::{ChromiumBridge, MapperSource, MessageCodec};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const OBSERVER_COUNTS: &[usize] = &[1, 10, 100];

fn response_document() -> Value {
    json!({
        "id": 42,
        "type": "success",
        "result": { "context": "abc", "url": "https://example.com/" }
    })
}

fn event_document() -> Value {
    json!({
        "type": "event",
        "method": "browsingContext.contextCreated",
        "params": { "context": "abc", "url": "about:blank", "children": null }
    })
}

// ============================================================================
// Benchmark: Classification
// ============================================================================

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    let response = response_document();
    group.bench_function("response", |b| {
        b.iter(|| Message::from_value(black_box(response.clone())))
    });

    let event = event_document();
    group.bench_function("event", |b| {
        b.iter(|| Message::from_value(black_box(event.clone())))
    });

    group.finish();
}

// ============================================================================
// Benchmark: Bridge Carrier
// ============================================================================

fn bench_bridge(c: &mut Criterion) {
    let mut group = c.benchmark_group("bridge");

    let command = Command::new(
        CommandId::new(7),
        "browsingContext.navigate",
        json!({ "context": "abc", "url": "https://example.com/?q=\"quoted\"", "wait": "complete" }),
    );
    group.bench_function("wrap_command", |b| {
        b.iter(|| ChromiumBridge::wrap_command(black_box(&command), "S1"))
    });

    let bridge = ChromiumBridge::new(MapperSource::inline("/* mapper */"));
    let carrier = json!({
        "method": "Runtime.bindingCalled",
        "sessionId": "S1",
        "params": {
            "name": "sendBidiResponse",
            "payload": response_document().to_string(),
            "executionContextId": 1
        }
    })
    .to_string();
    group.bench_function("unwrap_binding", |b| {
        b.iter(|| bridge.deserialize_message(black_box(&carrier)))
    });

    group.finish();
}

// ============================================================================
// Benchmark: Observer Fan-out
// ============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let Ok(rt) = Runtime::new() else {
        return;
    };

    let mut group = c.benchmark_group("fan_out");

    for &count in OBSERVER_COUNTS {
        let event: ObservableEvent<Value> = ObservableEvent::new("bench.event");
        let hits = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..count)
            .map(|_| {
                let hits = Arc::clone(&hits);
                event.add_observer(move |_| {
                    hits.fetch_add(1, Ordering::Relaxed);
                })
            })
            .collect();

        let payload = event_document();
        group.bench_with_input(BenchmarkId::new("observers", count), &count, |b, _| {
            b.to_async(&rt)
                .iter(|| event.notify_observers(black_box(payload.clone())));
        });

        drop(handles);
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_bridge, bench_fan_out);
criterion_main!(benches);
