//! Tonegen Core - device-independent building blocks for the tone streamer.
//!
//! This crate holds everything that does not touch an audio device:
//!
//! - [`format`] - the fixed PCM layout (48 kHz, 16-bit, stereo) and block sizing
//! - [`RingBuffer`] - bounded, lock-protected byte queue between the generator
//!   and the render thread
//! - [`ToneParameters`] - frequency/volume/mute/device selector shared across
//!   threads with relaxed consistency
//! - [`ToneSynthesizer`] - phase-accumulator sine generator producing
//!   interleaved stereo `i16` blocks
//!
//! # Example
//!
//! ```rust
//! use tonegen_core::{RingBuffer, ToneParameters, ToneSynthesizer, format};
//!
//! let block_bytes = format::block_bytes(format::DEFAULT_BLOCK_FRAMES);
//! let ring = RingBuffer::for_block(block_bytes);
//! let params = ToneParameters::default();
//! params.set_frequency(440.0);
//!
//! let mut synth = ToneSynthesizer::new(format::SAMPLE_RATE);
//! let mut block = vec![0u8; block_bytes];
//! synth.set_parameters(params.frequency(), params.volume());
//! synth.fill_block(&mut block);
//!
//! if ring.free() >= block.len() {
//!     ring.write(&block);
//! }
//! assert_eq!(ring.occupied(), block_bytes);
//! ```

pub mod format;
mod params;
mod ring_buffer;
mod synth;

pub use params::{AtomicF64, DEFAULT_SELECTOR, ToneParameters, ToneSnapshot};
pub use ring_buffer::RingBuffer;
pub use synth::ToneSynthesizer;
