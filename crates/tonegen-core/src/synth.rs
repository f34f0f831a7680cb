//! Phase-accumulator sine synthesis into interleaved stereo `i16` blocks.

use crate::format::{CHANNELS, FRAME_BYTES};
use std::f64::consts::TAU;

/// Sine generator writing identical samples to both channels.
///
/// For each frame the output is `round(sin(t) * amp)` with
/// `amp = 32767 * volume`, after which `t += 2π * frequency / sample_rate`.
/// Increment and amplitude are recomputed only when the parameters passed to
/// [`set_parameters`](Self::set_parameters) differ from the previous call, so
/// a parameter change takes effect at the next block boundary.
///
/// # Example
///
/// ```rust
/// use tonegen_core::ToneSynthesizer;
///
/// let mut synth = ToneSynthesizer::new(48_000);
/// synth.set_parameters(1000.0, 1.0);
///
/// let mut block = [0u8; 48 * 4];
/// synth.fill_block(&mut block);
/// let left = i16::from_le_bytes([block[4], block[5]]);
/// let right = i16::from_le_bytes([block[6], block[7]]);
/// assert_eq!(left, right);
/// ```
#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    sample_rate: f64,
    /// Running phase in radians, kept in `[0, 2π)`.
    phase: f64,
    phase_inc: f64,
    amplitude: f64,
    frequency: f64,
    volume: f64,
}

impl ToneSynthesizer {
    /// Create a silent synthesizer at `sample_rate` Hz.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: f64::from(sample_rate),
            phase: 0.0,
            phase_inc: 0.0,
            amplitude: 0.0,
            frequency: 0.0,
            volume: 0.0,
        }
    }

    /// Update frequency and volume; recomputes only what changed.
    pub fn set_parameters(&mut self, frequency_hz: f64, volume: f64) {
        if frequency_hz != self.frequency {
            self.frequency = frequency_hz;
            self.phase_inc = TAU * frequency_hz / self.sample_rate;
        }
        if volume != self.volume {
            self.volume = volume;
            self.amplitude = f64::from(i16::MAX) * volume;
        }
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Current volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Current phase in radians.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Reset phase to zero.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Fill `block` with whole frames; a trailing partial frame is zeroed.
    pub fn fill_block(&mut self, block: &mut [u8]) {
        let mut frames = block.chunks_exact_mut(FRAME_BYTES);
        for frame in &mut frames {
            let value = (self.phase.sin() * self.amplitude).round() as i16;
            let bytes = value.to_le_bytes();
            for channel in frame.chunks_exact_mut(FRAME_BYTES / CHANNELS as usize) {
                channel.copy_from_slice(&bytes);
            }

            self.phase += self.phase_inc;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }
        frames.into_remainder().fill(0);
    }
}
