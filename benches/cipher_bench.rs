// benches/cipher_bench.rs
//! Cipher throughput on typical frame sizes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serverless_engine::security::{CipherRole, Rc5, TqCipher};

const SIZES: [usize; 4] = [24, 61, 512, 4096];

fn bench_tq_cipher(c: &mut Criterion) {
    let mut group = c.benchmark_group("tq_cipher");

    for size in SIZES {
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encrypt", size), &size, |b, &size| {
            let mut cipher = TqCipher::new();
            let mut buf = vec![0x5Au8; size];
            b.iter(|| cipher.encrypt(black_box(&mut buf)));
        });

        group.bench_with_input(BenchmarkId::new("decrypt_alternate", size), &size, |b, &size| {
            let mut cipher = TqCipher::with_role(CipherRole::Server);
            cipher.derive_alternate(987_654_321, 123_456_789);
            let mut buf = vec![0x5Au8; size];
            b.iter(|| cipher.decrypt(black_box(&mut buf)));
        });
    }

    group.finish();
}

fn bench_rc5(c: &mut Criterion) {
    let rc5 = Rc5::password();
    let mut group = c.benchmark_group("rc5");
    group.throughput(Throughput::Bytes(16));

    group.bench_function("encrypt_password", |b| {
        let mut field = *b"secret\0\0\0\0\0\0\0\0\0\0";
        b.iter(|| rc5.encrypt(black_box(&mut field)));
    });

    group.bench_function("key_schedule", |b| {
        b.iter(|| Rc5::new(black_box(&[0x3Cu8; 16])));
    });

    group.finish();
}

criterion_group!(benches, bench_tq_cipher, bench_rc5);
criterion_main!(benches);
