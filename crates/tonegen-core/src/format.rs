//! Fixed PCM stream layout.
//!
//! Every block that crosses the ring buffer and every byte pushed to a device
//! uses the same format: 48 kHz, signed 16-bit little-endian, two interleaved
//! channels. Only the block length (in frames) is configurable.

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48_000;

/// Interleaved channel count.
pub const CHANNELS: u16 = 2;

/// Bytes per sample (`i16`).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Bytes per interleaved frame.
pub const FRAME_BYTES: usize = CHANNELS as usize * BYTES_PER_SAMPLE;

/// Default block length: 1/60 s at 48 kHz.
pub const DEFAULT_BLOCK_FRAMES: usize = 800;

/// Highest representable tone frequency (Nyquist).
pub const MAX_FREQUENCY_HZ: f64 = SAMPLE_RATE as f64 / 2.0;

/// Byte length of a block holding `frames` interleaved frames.
#[inline]
pub const fn block_bytes(frames: usize) -> usize {
    frames * FRAME_BYTES
}

/// Ring and device buffers hold exactly two blocks.
#[inline]
pub const fn double_buffered(block_bytes: usize) -> usize {
    block_bytes * 2
}

/// Duration of `bytes` of PCM in milliseconds.
pub fn bytes_to_millis(bytes: usize) -> f64 {
    (bytes / FRAME_BYTES) as f64 * 1000.0 / f64::from(SAMPLE_RATE)
}
