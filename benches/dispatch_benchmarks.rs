//! Webhook Dispatch Benchmarks
//!
//! Measures the per-delivery work done before a request hits the network.
//!
//! Run benchmarks:
//!   cargo bench --bench dispatch_benchmarks

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use depot::depot_webhooks::{PayloadRenderer, headers};
use depot::prelude::*;
use std::hint::black_box;
use std::sync::Arc;

fn sample_event() -> Event {
    Event::added("maven-releases", "com/acme/widgets/2.4.1/widgets-2.4.1.jar")
        .with_group("com.acme")
        .with_name("widgets")
        .with_version("2.4.1")
}

fn sample_subscription() -> Subscription {
    Subscription::builder("maven-releases", "https://ci.example.com/hooks/depot")
        .events(&["add", "change"])
        .secret("bench-secret")
        .bearer_token("bench-token")
        .headers(&[("X-Team", "platform"), ("X-Env", "prod")])
        .build()
}

// ============================================================================
// Rendering
// ============================================================================

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let renderer = PayloadRenderer::new();
    let event = sample_event();
    let template = r#"{"text":"{{upper kind}} {{group}}:{{name}}:{{version}} in {{repository}}","path":{{json path}}}"#;

    group.bench_function("canonical_json", |b| {
        b.iter(|| renderer.render(black_box(&event), None))
    });

    group.bench_function("template", |b| {
        b.iter(|| renderer.render(black_box(&event), Some(black_box(template))))
    });

    group.bench_function("broken_template_fallback", |b| {
        b.iter(|| renderer.render(black_box(&event), Some(black_box("{{#if kind}}"))))
    });

    group.finish();
}

// ============================================================================
// Signing and Headers
// ============================================================================

fn bench_signing(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature");
    let signer = WebhookSignature::new("bench-secret");

    for size in [256usize, 4096, 65536] {
        let payload = vec![b'x'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("sign_{}", size), |b| {
            b.iter(|| signer.sign(black_box(&payload)))
        });
    }

    let payload = sample_event().to_canonical_json().unwrap_or_default();
    let signature = signer.sign(payload.as_bytes());
    group.bench_function("verify", |b| {
        b.iter(|| signer.verify(black_box(payload.as_bytes()), black_box(&signature)))
    });

    group.finish();
}

fn bench_headers(c: &mut Criterion) {
    let subscription = sample_subscription();
    let event = sample_event();
    let payload = event.to_canonical_json().unwrap_or_default();

    c.bench_function("headers/assemble", |b| {
        b.iter(|| {
            headers::assemble(
                black_box(&subscription),
                black_box(&event),
                black_box(payload.as_bytes()),
                "delivery-id",
            )
        })
    });

    c.bench_function("filter/parse_and_match", |b| {
        b.iter(|| {
            black_box(&subscription)
                .parsed_filter()
                .matches(black_box(EventKind::Change))
        })
    });
}

// ============================================================================
// Enqueue
// ============================================================================

fn bench_enqueue(c: &mut Criterion) {
    let config = DispatcherConfig::builder().queue_capacity(1).build();
    let dispatcher = match Dispatcher::new(config, Arc::new(MemoryStore::new())) {
        Ok(dispatcher) => dispatcher,
        Err(e) => panic!("failed to build dispatcher: {}", e),
    };
    dispatcher.enqueue(sample_event());

    c.bench_function("enqueue/full_queue_drop", |b| {
        b.iter(|| dispatcher.enqueue(black_box(sample_event())))
    });
}

criterion_group!(
    benches,
    bench_render,
    bench_signing,
    bench_headers,
    bench_enqueue
);
criterion_main!(benches);
