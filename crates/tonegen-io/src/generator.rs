//! Producer loop: synthesizes blocks into the ring buffer.
//!
//! The loop busy-polls the ring for room instead of blocking on a wait
//! primitive, so a block is written within microseconds of the render
//! thread draining one. This keeps one core busy for the life of the
//! engine; that CPU usage is expected.

use crate::signal::ShutdownSignal;
use std::sync::Arc;
use tonegen_core::{RingBuffer, ToneParameters, ToneSynthesizer, format};

/// Counters reported when the generator exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    /// Blocks written to the ring (tone and silence).
    pub blocks_written: u64,
    /// Blocks written as silence because mute was on.
    pub silent_blocks: u64,
}

/// Drives a [`ToneSynthesizer`] into a [`RingBuffer`] until shutdown.
pub struct GeneratorLoop {
    ring: Arc<RingBuffer>,
    params: Arc<ToneParameters>,
    shutdown: ShutdownSignal,
    synth: ToneSynthesizer,
    scratch: Vec<u8>,
    stats: GeneratorStats,
}

impl GeneratorLoop {
    /// Create a generator writing blocks of `block_frames` frames.
    pub fn new(
        ring: Arc<RingBuffer>,
        params: Arc<ToneParameters>,
        shutdown: ShutdownSignal,
        block_frames: usize,
    ) -> Self {
        Self {
            ring,
            params,
            shutdown,
            synth: ToneSynthesizer::new(format::SAMPLE_RATE),
            scratch: vec![0u8; format::block_bytes(block_frames.max(1))],
            stats: GeneratorStats::default(),
        }
    }

    /// Bytes per block.
    pub fn block_bytes(&self) -> usize {
        self.scratch.len()
    }

    /// Counters so far.
    pub fn stats(&self) -> GeneratorStats {
        self.stats
    }

    /// One poll: write a block if the ring has room for a whole one.
    ///
    /// Returns `true` when a block was written. Parameters are sampled once
    /// per block, so changes land on the next block boundary.
    pub fn step(&mut self) -> bool {
        let block_bytes = self.scratch.len();
        if self.ring.free() < block_bytes {
            return false;
        }

        if self.params.is_muted() {
            self.ring.write_silence(block_bytes);
            self.stats.silent_blocks += 1;
        } else {
            self.synth
                .set_parameters(self.params.frequency(), self.params.volume());
            self.synth.fill_block(&mut self.scratch);
            self.ring.write(&self.scratch);
        }
        self.stats.blocks_written += 1;
        true
    }

    /// Run until shutdown is requested, then return the counters.
    pub fn run(mut self) -> GeneratorStats {
        tracing::debug!(block_bytes = self.scratch.len(), "generator started");
        while !self.shutdown.is_requested() {
            if !self.step() {
                std::hint::spin_loop();
            }
        }
        tracing::debug!(
            blocks = self.stats.blocks_written,
            silent = self.stats.silent_blocks,
            "generator stopped"
        );
        self.stats
    }
}
