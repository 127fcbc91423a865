use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use dddk_runtime::{DeviceManager, DeviceRegistry};
use debug_console::{ConsoleFifo, RingBuffer, FIFO_SIZE};

fn ring_push_pop(c: &mut Criterion) {
    c.bench_function("ring_push_pop_255", |b| {
        let mut ring = RingBuffer::<FIFO_SIZE>::new();
        b.iter(|| {
            for byte in 0..255u8 {
                ring.push(black_box(byte));
            }
            while let Some(byte) = ring.try_pop() {
                black_box(byte);
            }
        });
    });
}

fn fifo_enqueue_drain(c: &mut Criterion) {
    let registry = DeviceRegistry::new();
    let device = registry.create("console").expect("create");
    let fifo = ConsoleFifo::<FIFO_SIZE>::new();
    let mut out = [0u8; 64];

    c.bench_function("fifo_enqueue_drain_64", |b| {
        b.iter(|| {
            for byte in 0..64u8 {
                fifo.enqueue(black_box(byte), &device);
            }
            black_box(fifo.drain_into(&mut out, &device));
        });
    });
}

criterion_group!(benches, ring_push_pop, fifo_enqueue_drain);
criterion_main!(benches);
