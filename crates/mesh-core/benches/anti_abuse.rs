//! Throughput of the anti-abuse gate under a steady stream of clean
//! messages from many distinct senders, and under a single sender hammering
//! the rate limiter.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mesh_core::abuse::AntiAbuseGate;
use mesh_core::config::AbuseConfig;

fn bench_many_senders(c: &mut Criterion) {
    c.bench_function("abuse_evaluate_many_senders", |b| {
        let gate = AntiAbuseGate::new(AbuseConfig::default());
        let mut counter = 0u8;
        b.iter(|| {
            counter = counter.wrapping_add(1);
            let sender = [counter; 32];
            black_box(gate.evaluate(sender, "hello from the mesh"));
        });
    });
}

fn bench_single_sender_rate_limited(c: &mut Criterion) {
    c.bench_function("abuse_evaluate_single_sender", |b| {
        let gate = AntiAbuseGate::new(AbuseConfig::default());
        let sender = [7u8; 32];
        b.iter(|| {
            black_box(gate.evaluate(sender, "hello again"));
        });
    });
}

criterion_group!(benches, bench_many_senders, bench_single_sender_rate_limited);
criterion_main!(benches);
