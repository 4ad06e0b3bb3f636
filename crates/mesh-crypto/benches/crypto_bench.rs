//! Performance benchmarks for mesh-crypto.
//!
//! Run with: `cargo bench -p mesh-crypto`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_crypto::aead::AeadSession;
use mesh_crypto::constant_time::{ct_eq, ct_select};
use mesh_crypto::hash::{Kdf, hash, hkdf_expand, hkdf_extract};
use mesh_crypto::noise::{NoiseHandshake, NoiseKeypair};
use mesh_crypto::x25519::PrivateKey;
use mesh_crypto::SessionKeys;
use rand_core::OsRng;

fn sample_session() -> AeadSession {
    let keys = SessionKeys { send_key: [0x42u8; 32], recv_key: [0x24u8; 32], chain_key: [0u8; 32] };
    AeadSession::new(&keys).unwrap()
}

fn bench_aead_seal(c: &mut Criterion) {
    let mut group = c.benchmark_group("aead_seal");
    let sizes = [64, 256, 1024, 4096, 16384, 65536];

    for size in sizes {
        let mut session = sample_session();
        let aad = b"frame-header";
        let plaintext = vec![0xAA; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| session.seal(black_box(&plaintext), black_box(aad)))
        });
    }

    group.finish();
}

fn bench_aead_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("aead_roundtrip");
    let sizes = [1200, 1400, 4096];

    for size in sizes {
        let send_keys = SessionKeys { send_key: [1u8; 32], recv_key: [2u8; 32], chain_key: [0u8; 32] };
        let recv_keys = SessionKeys { send_key: [2u8; 32], recv_key: [1u8; 32], chain_key: [0u8; 32] };
        let aad = b"mesh-frame-aad";
        let plaintext = vec![0xBB; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter_batched(
                || (AeadSession::new(&send_keys).unwrap(), AeadSession::new(&recv_keys).unwrap()),
                |(mut sender, mut receiver)| {
                    let ct = sender.seal(black_box(&plaintext), black_box(aad)).unwrap();
                    receiver.open(black_box(&ct), black_box(aad))
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_x25519_keygen(c: &mut Criterion) {
    c.bench_function("x25519_keygen", |b| {
        b.iter(|| PrivateKey::generate(&mut OsRng))
    });
}

fn bench_x25519_exchange(c: &mut Criterion) {
    let alice_private = PrivateKey::generate(&mut OsRng);
    let bob_private = PrivateKey::generate(&mut OsRng);
    let bob_public = bob_private.public_key();

    c.bench_function("x25519_exchange", |b| {
        b.iter(|| alice_private.exchange(black_box(&bob_public)))
    });
}

fn bench_blake3_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("blake3_hash");
    let sizes = [32, 256, 1024, 4096, 65536];

    for size in sizes {
        let data = vec![0xCC; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| hash(black_box(&data)))
        });
    }

    group.finish();
}

fn bench_hkdf(c: &mut Criterion) {
    let ikm = [0x42u8; 32];
    let salt = [0xABu8; 32];
    let info = b"mesh-key-derivation";

    c.bench_function("hkdf_extract", |b| {
        b.iter(|| hkdf_extract(black_box(&salt), black_box(&ikm)))
    });

    let prk = hkdf_extract(&salt, &ikm);
    let mut output = [0u8; 32];
    c.bench_function("hkdf_expand", |b| {
        b.iter(|| hkdf_expand(black_box(&prk), black_box(info), &mut output))
    });
}

fn bench_kdf(c: &mut Criterion) {
    let ikm = [0x42u8; 32];
    let kdf = Kdf::new("mesh-benchmark-context");

    c.bench_function("kdf_derive_key", |b| {
        b.iter(|| kdf.derive_key(black_box(&ikm)))
    });
}

fn bench_noise_keypair_generation(c: &mut Criterion) {
    c.bench_function("noise_keypair_generate", |b| {
        b.iter(|| NoiseKeypair::generate())
    });
}

fn bench_noise_full_handshake(c: &mut Criterion) {
    c.bench_function("noise_xx_handshake", |b| {
        b.iter(|| {
            let alice_static = NoiseKeypair::generate().unwrap();
            let bob_static = NoiseKeypair::generate().unwrap();

            let mut alice = NoiseHandshake::new_initiator(&alice_static).unwrap();
            let mut bob = NoiseHandshake::new_responder(&bob_static).unwrap();

            let msg1 = alice.write_message(&[]).unwrap();
            bob.read_message(&msg1).unwrap();

            let msg2 = bob.write_message(&[]).unwrap();
            alice.read_message(&msg2).unwrap();

            let msg3 = alice.write_message(&[]).unwrap();
            bob.read_message(&msg3).unwrap();

            black_box(alice.into_session_keys().unwrap());
            black_box(bob.into_session_keys().unwrap());
        })
    });
}

fn bench_constant_time_ops(c: &mut Criterion) {
    let a = [0x42u8; 32];
    let b = [0x42u8; 32];
    let c_arr = [0xABu8; 32];

    c.bench_function("ct_eq_32_bytes_equal", |b_iter| {
        b_iter.iter(|| ct_eq(black_box(&a), black_box(&b)))
    });

    c.bench_function("ct_eq_32_bytes_unequal", |b_iter| {
        b_iter.iter(|| ct_eq(black_box(&a), black_box(&c_arr)))
    });

    let x = [0x11u8; 8];
    let y = [0x22u8; 8];

    c.bench_function("ct_select_8_bytes", |b_iter| {
        b_iter.iter(|| {
            let mut result = [0u8; 8];
            ct_select(black_box(true), black_box(&x), black_box(&y), &mut result);
            result
        })
    });
}

criterion_group!(aead_benches, bench_aead_seal, bench_aead_roundtrip);
criterion_group!(x25519_benches, bench_x25519_keygen, bench_x25519_exchange);
criterion_group!(blake3_benches, bench_blake3_hash, bench_hkdf, bench_kdf);
criterion_group!(
    noise_benches,
    bench_noise_keypair_generation,
    bench_noise_full_handshake,
);
criterion_group!(constant_time_benches, bench_constant_time_ops);

criterion_main!(
    aead_benches,
    x25519_benches,
    blake3_benches,
    noise_benches,
    constant_time_benches,
);
