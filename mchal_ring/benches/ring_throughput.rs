use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mchal_ring::Ring;

fn write_read_roundtrip(c: &mut Criterion) {
    c.bench_function("ring_write_read_4k", |b| {
        let (mut tx, mut rx) = Ring::new(4096).unwrap();
        let chunk = [0xABu8; 256];
        let mut sink = [0u8; 256];
        b.iter(|| {
            tx.try_write_from(black_box(&chunk));
            rx.try_read_into(black_box(&mut sink));
        });
    });
}

criterion_group!(benches, write_read_roundtrip);
criterion_main!(benches);
