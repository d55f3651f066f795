//! Routing benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mediator_core::{InboundMessage, MAX_MESSAGE_LEN};
use mediator_router::Router;
use mediator_test_utils::RecordingHandle;
use std::time::Instant;

const OFFER: &str = r#"{"type":"offer","offer":{"type":"offer","sdp":"v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n"},"name":"Alice","peer":"Bob","session":"a1b2c3"}"#;

fn decode_benchmark(c: &mut Criterion) {
    c.bench_function("decode_offer", |b| {
        b.iter(|| black_box(InboundMessage::decode(black_box(OFFER), MAX_MESSAGE_LEN).unwrap()))
    });
}

fn route_benchmark(c: &mut Criterion) {
    let router = Router::default();
    let alice = RecordingHandle::new();
    let bob = RecordingHandle::new();
    router.handle(
        &alice.peer(),
        r#"{"type":"login","name":"Alice","session":"a1b2c3"}"#,
    );
    router.handle(
        &bob.peer(),
        r#"{"type":"login","name":"Bob","session":"a1b2c3"}"#,
    );
    let peer = alice.peer();

    c.bench_function("route_offer", |b| {
        b.iter(|| {
            router.handle(&peer, black_box(OFFER));
            bob.take();
        })
    });
}

fn connect_benchmark(c: &mut Criterion) {
    let router = Router::default();
    let handle = RecordingHandle::new();
    let peer = handle.peer();

    c.bench_function("connect", |b| {
        b.iter(|| {
            router.open_at(&peer, Instant::now());
            handle.take();
        })
    });
}

criterion_group!(benches, decode_benchmark, route_benchmark, connect_benchmark);
criterion_main!(benches);
