//! Criterion benchmarks for tonegen-core primitives
//!
//! Run with: cargo bench -p tonegen-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tonegen_core::{RingBuffer, ToneSynthesizer, format};

const BLOCK_FRAMES: &[usize] = &[128, 256, 800, 2048];

fn bench_synth(c: &mut Criterion) {
    let mut group = c.benchmark_group("ToneSynthesizer");

    for &frames in BLOCK_FRAMES {
        group.bench_with_input(BenchmarkId::new("fill_block", frames), &frames, |b, &n| {
            let mut synth = ToneSynthesizer::new(format::SAMPLE_RATE);
            synth.set_parameters(1000.0, 0.5);
            let mut block = vec![0u8; format::block_bytes(n)];
            b.iter(|| {
                synth.fill_block(black_box(&mut block));
            });
        });
    }

    group.finish();
}

fn bench_ring_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("RingBuffer");

    for &frames in BLOCK_FRAMES {
        let block_bytes = format::block_bytes(frames);
        group.bench_with_input(
            BenchmarkId::new("write_read_block", frames),
            &block_bytes,
            |b, &len| {
                let ring = RingBuffer::for_block(len);
                let block = vec![0x11u8; len];
                let mut out = vec![0u8; len];
                b.iter(|| {
                    ring.write(black_box(&block));
                    black_box(ring.read(&mut out));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_synth, bench_ring_buffer);
criterion_main!(benches);
