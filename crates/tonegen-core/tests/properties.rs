//! Property-based tests for tonegen-core primitives.
//!
//! Covers ring buffer FIFO byte-exactness under arbitrary interleavings of
//! writes and reads, and the periodicity / channel symmetry of the sine
//! synthesizer.

use proptest::prelude::*;
use tonegen_core::{RingBuffer, ToneParameters, ToneSynthesizer, format};

/// One step of a writer/reader schedule.
#[derive(Debug, Clone)]
enum Op {
    Write(Vec<u8>),
    Read(usize),
}

fn op_strategy(max_len: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..=max_len).prop_map(Op::Write),
        (0..=max_len * 2).prop_map(Op::Read),
    ]
}

fn decode(block: &[u8]) -> Vec<(i16, i16)> {
    block
        .chunks_exact(format::FRAME_BYTES)
        .map(|f| {
            (
                i16::from_le_bytes([f[0], f[1]]),
                i16::from_le_bytes([f[2], f[3]]),
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Writes that respect the free-space check, interleaved with reads of
    /// any size, deliver every byte exactly once and in order.
    #[test]
    fn ring_buffer_is_fifo_exact(
        capacity in 1usize..64,
        ops in prop::collection::vec(op_strategy(48), 1..200),
    ) {
        let ring = RingBuffer::new(capacity);
        let mut written = Vec::new();
        let mut read = Vec::new();

        for op in ops {
            match op {
                Op::Write(bytes) => {
                    // Poll-before-write, as the generator does.
                    if ring.free() >= bytes.len() {
                        ring.write(&bytes);
                        written.extend_from_slice(&bytes);
                    }
                }
                Op::Read(n) => {
                    let mut out = vec![0u8; n];
                    let before = ring.occupied();
                    let got = ring.read(&mut out);
                    prop_assert_eq!(got, n.min(before));
                    read.extend_from_slice(&out[..got]);
                }
            }
            prop_assert!(ring.occupied() <= ring.capacity());
        }

        let mut out = vec![0u8; capacity];
        let got = ring.read(&mut out);
        read.extend_from_slice(&out[..got]);
        prop_assert_eq!(read, written);
    }

    /// A write of N bytes followed by read(N) returns exactly those bytes.
    #[test]
    fn write_then_read_is_identity(
        prefix in 0usize..32,
        bytes in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let ring = RingBuffer::new(96);
        // Offset the cursors so the copy may wrap.
        ring.write_silence(prefix);
        let mut sink = vec![0u8; prefix];
        ring.read(&mut sink);

        ring.write(&bytes);
        let mut out = vec![0u8; bytes.len()];
        prop_assert_eq!(ring.read(&mut out), bytes.len());
        prop_assert_eq!(out, bytes);
    }

    /// Both channels of every frame carry the same sample and the output
    /// never exceeds the requested amplitude.
    #[test]
    fn synth_channels_equal_and_bounded(
        frequency in 1.0f64..23_000.0,
        volume in 0.0f64..=1.0,
        frames in 1usize..2048,
    ) {
        let mut synth = ToneSynthesizer::new(format::SAMPLE_RATE);
        synth.set_parameters(frequency, volume);
        let mut block = vec![0u8; format::block_bytes(frames)];
        synth.fill_block(&mut block);

        let limit = (f64::from(i16::MAX) * volume).round() as i32;
        for (l, r) in decode(&block) {
            prop_assert_eq!(l, r);
            prop_assert!(i32::from(l).abs() <= limit);
        }
    }

    /// Parameter setters always leave values inside their documented ranges.
    #[test]
    fn parameters_stay_in_range(frequency in any::<f64>(), volume in any::<f64>()) {
        let params = ToneParameters::default();
        params.set_frequency(frequency);
        params.set_volume(volume);
        prop_assert!((0.0..=format::MAX_FREQUENCY_HZ).contains(&params.frequency()));
        prop_assert!((0.0..=1.0).contains(&params.volume()));
    }
}

#[test]
fn thousand_hz_has_period_of_48_samples() {
    let mut synth = ToneSynthesizer::new(48_000);
    synth.set_parameters(1000.0, 1.0);
    let mut block = vec![0u8; format::block_bytes(48 * 20)];
    synth.fill_block(&mut block);
    let samples = decode(&block);

    for i in 0..samples.len() - 48 {
        let a = i32::from(samples[i].0);
        let b = i32::from(samples[i + 48].0);
        assert!((a - b).abs() <= 1, "sample {i}: {a} vs {b}");
    }
}

#[test]
fn muted_style_silence_block_is_all_zero() {
    let ring = RingBuffer::for_block(format::block_bytes(format::DEFAULT_BLOCK_FRAMES));
    let block_bytes = format::block_bytes(format::DEFAULT_BLOCK_FRAMES);
    ring.write(&vec![0x5A; block_bytes]);
    let mut drain = vec![0u8; block_bytes];
    ring.read(&mut drain);

    ring.write_silence(block_bytes);
    let mut out = vec![0xFFu8; block_bytes];
    assert_eq!(ring.read(&mut out), block_bytes);
    assert!(out.iter().all(|&b| b == 0));
}
