//! One live connection between the ring buffer and a playback device.

use crate::backend::{Endpoint, OutputBackend, OutputSink, SinkConfig};
use crate::signal::{ResetFlag, ShutdownSignal};
use crate::{Error, Result};
use std::time::Duration;
use tonegen_core::{RingBuffer, ToneParameters};

/// Why a session has to be torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    /// The system default output endpoint changed.
    DefaultChanged,
    /// Shutdown was requested.
    Shutdown,
    /// The device selector no longer matches this session.
    SelectorChanged,
    /// The device failed or disappeared.
    DeviceLost,
}

/// Result of one [`DeviceSession::pump`] tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// Keep pumping.
    Continue,
    /// Close this session and resolve again.
    NeedsRebuild(RebuildReason),
}

/// Shared state a session reads on every tick.
pub struct PumpContext<'a> {
    /// Source of PCM blocks.
    pub ring: &'a RingBuffer,
    /// Selector generation is compared against the session's.
    pub params: &'a ToneParameters,
    /// Set by the default-changed notification.
    pub reset: &'a ResetFlag,
    /// Cooperative stop.
    pub shutdown: &'a ShutdownSignal,
    /// Bounded wait used when there is nothing to feed.
    pub pump_wait: Duration,
}

/// An open output endpoint fed from the ring buffer.
///
/// The sink starts playing silence as soon as the session is opened. Each
/// [`pump`](Self::pump) either feeds one block (when the device has at most
/// one block buffered) or, if there is nothing to do, checks whether the
/// session must be rebuilt. Device-level errors never escape a session:
/// during pumping they become [`RebuildReason::DeviceLost`], during
/// [`close`](Self::close) they are logged and dropped.
pub struct DeviceSession {
    sink: Option<Box<dyn OutputSink>>,
    endpoint: Endpoint,
    selector_generation: u64,
    selector: String,
    block: Vec<u8>,
    bytes_fed: u64,
}

impl DeviceSession {
    /// Open `endpoint` with a device buffer of two blocks.
    ///
    /// `selector` is the selector string the endpoint was resolved from and
    /// `selector_generation` the [`ToneParameters::selector_generation`] at
    /// that moment. Open failures are reported as
    /// [`Error::DeviceUnavailable`].
    pub fn open(
        backend: &dyn OutputBackend,
        endpoint: Endpoint,
        selector: impl Into<String>,
        selector_generation: u64,
        block_bytes: usize,
    ) -> Result<Self> {
        let config = SinkConfig::for_block(block_bytes);
        let sink = backend.open_output(&endpoint, &config).map_err(|e| match e {
            Error::DeviceUnavailable(_) => e,
            other => Error::DeviceUnavailable(format!("{}: {other}", endpoint.name)),
        })?;

        tracing::info!(
            endpoint = %endpoint.name,
            id = %endpoint.id,
            buffer_bytes = config.buffer_bytes,
            "device session opened"
        );

        Ok(Self {
            sink: Some(sink),
            endpoint,
            selector_generation,
            selector: selector.into(),
            block: vec![0u8; block_bytes],
            bytes_fed: 0,
        })
    }

    /// Endpoint this session streams to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// PCM bytes handed to the device so far.
    pub fn bytes_fed(&self) -> u64 {
        self.bytes_fed
    }

    /// Feed one block or check the rebuild triggers.
    pub fn pump(&mut self, ctx: &PumpContext<'_>) -> PumpStatus {
        let Some(sink) = self.sink.as_mut() else {
            return PumpStatus::NeedsRebuild(RebuildReason::DeviceLost);
        };

        let block_bytes = self.block.len();
        if !ctx.ring.is_empty() && sink.buffered_bytes() <= block_bytes {
            let n = ctx.ring.read(&mut self.block);
            return match sink.push(&self.block[..n]) {
                Ok(()) => {
                    self.bytes_fed += n as u64;
                    PumpStatus::Continue
                }
                Err(e) => {
                    tracing::warn!(endpoint = %self.endpoint.name, error = %e, "device push failed");
                    PumpStatus::NeedsRebuild(RebuildReason::DeviceLost)
                }
            };
        }

        if ctx.reset.take() {
            return PumpStatus::NeedsRebuild(RebuildReason::DefaultChanged);
        }
        if ctx.shutdown.wait_timeout(ctx.pump_wait) {
            return PumpStatus::NeedsRebuild(RebuildReason::Shutdown);
        }
        if selector_changed(&mut self.selector_generation, &self.selector, ctx.params) {
            return PumpStatus::NeedsRebuild(RebuildReason::SelectorChanged);
        }
        if let Err(e) = sink.health() {
            tracing::warn!(endpoint = %self.endpoint.name, error = %e, "device lost");
            return PumpStatus::NeedsRebuild(RebuildReason::DeviceLost);
        }
        PumpStatus::Continue
    }

    /// Stop playback and release the device. Errors are logged, not returned.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            match sink.close() {
                Ok(()) => tracing::debug!(endpoint = %self.endpoint.name, "device session closed"),
                Err(e) => tracing::debug!(
                    endpoint = %self.endpoint.name,
                    error = %e,
                    "error during device teardown ignored"
                ),
            }
        }
    }
}

/// Compare the live selector with the one a session was resolved from.
fn selector_changed(seen_generation: &mut u64, selector: &str, params: &ToneParameters) -> bool {
    let generation = params.selector_generation();
    if generation == *seen_generation {
        return false;
    }
    if params.device_selector() == selector {
        // Changed and changed back: keep streaming.
        *seen_generation = generation;
        false
    } else {
        true
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("endpoint", &self.endpoint)
            .field("open", &self.sink.is_some())
            .field("bytes_fed", &self.bytes_fed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    const BLOCK: usize = 64;

    struct Fixture {
        backend: MockBackend,
        ring: RingBuffer,
        params: ToneParameters,
        reset: ResetFlag,
        shutdown: ShutdownSignal,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                backend: MockBackend::with_endpoints(&["Speakers", "Headphones"]),
                ring: RingBuffer::for_block(BLOCK),
                params: ToneParameters::default(),
                reset: ResetFlag::new(),
                shutdown: ShutdownSignal::new(),
            }
        }

        fn ctx(&self) -> PumpContext<'_> {
            PumpContext {
                ring: &self.ring,
                params: &self.params,
                reset: &self.reset,
                shutdown: &self.shutdown,
                pump_wait: Duration::from_millis(1),
            }
        }

        fn open(&self, name: &str) -> DeviceSession {
            let endpoint = self
                .backend
                .output_endpoints()
                .unwrap()
                .into_iter()
                .find(|e| e.name == name)
                .unwrap();
            DeviceSession::open(
                &self.backend,
                endpoint,
                self.params.device_selector(),
                self.params.selector_generation(),
                BLOCK,
            )
            .unwrap()
        }
    }

    #[test]
    fn feeds_ring_data_to_device() {
        let fx = Fixture::new();
        let mut session = fx.open("Speakers");
        fx.ring.write(&[7u8; BLOCK]);

        assert_eq!(session.pump(&fx.ctx()), PumpStatus::Continue);
        assert_eq!(session.bytes_fed(), BLOCK as u64);
        assert_eq!(fx.backend.captured(), vec![7u8; BLOCK]);
        assert!(fx.ring.is_empty());
    }

    #[test]
    fn short_read_feeds_what_is_available() {
        let fx = Fixture::new();
        let mut session = fx.open("Speakers");
        fx.ring.write(&[3u8; 10]);
        assert_eq!(session.pump(&fx.ctx()), PumpStatus::Continue);
        assert_eq!(session.bytes_fed(), 10);
    }

    #[test]
    fn idle_tick_without_triggers_continues() {
        let fx = Fixture::new();
        let mut session = fx.open("Speakers");
        assert_eq!(session.pump(&fx.ctx()), PumpStatus::Continue);
        assert_eq!(session.bytes_fed(), 0);
    }

    #[test]
    fn default_change_triggers_rebuild() {
        let fx = Fixture::new();
        let mut session = fx.open("Speakers");
        fx.reset.set();
        assert_eq!(
            session.pump(&fx.ctx()),
            PumpStatus::NeedsRebuild(RebuildReason::DefaultChanged)
        );
        assert!(!fx.reset.is_set());
    }

    #[test]
    fn shutdown_triggers_rebuild() {
        let fx = Fixture::new();
        let mut session = fx.open("Speakers");
        fx.shutdown.request();
        assert_eq!(
            session.pump(&fx.ctx()),
            PumpStatus::NeedsRebuild(RebuildReason::Shutdown)
        );
    }

    #[test]
    fn selector_change_triggers_rebuild() {
        let fx = Fixture::new();
        let mut session = fx.open("Speakers");
        fx.params.set_device_selector("Headphones");
        assert_eq!(
            session.pump(&fx.ctx()),
            PumpStatus::NeedsRebuild(RebuildReason::SelectorChanged)
        );
    }

    #[test]
    fn selector_changed_back_keeps_streaming() {
        let fx = Fixture::new();
        let mut session = fx.open("Speakers");
        fx.params.set_device_selector("Headphones");
        fx.params.set_device_selector("default");
        assert_eq!(session.pump(&fx.ctx()), PumpStatus::Continue);
    }

    #[test]
    fn removed_device_is_detected_within_one_pump() {
        let fx = Fixture::new();
        let mut session = fx.open("Headphones");
        fx.backend.remove_endpoint("Headphones");
        assert_eq!(
            session.pump(&fx.ctx()),
            PumpStatus::NeedsRebuild(RebuildReason::DeviceLost)
        );

        // Same when there is data to push.
        let mut session = fx.open("Speakers");
        fx.ring.write(&[1u8; BLOCK]);
        fx.backend.remove_endpoint("Speakers");
        assert_eq!(
            session.pump(&fx.ctx()),
            PumpStatus::NeedsRebuild(RebuildReason::DeviceLost)
        );
    }

    #[test]
    fn full_device_is_not_fed() {
        let fx = Fixture::new();
        fx.backend.set_paused(true);
        let mut session = fx.open("Speakers");
        fx.ring.write(&[1u8; BLOCK]);
        fx.ring.write(&[2u8; BLOCK]);

        session.pump(&fx.ctx());
        session.pump(&fx.ctx());
        assert_eq!(session.bytes_fed(), 2 * BLOCK as u64);

        // Device holds two blocks (> one block buffered): nothing more is fed.
        fx.ring.write(&[3u8; BLOCK]);
        assert_eq!(session.pump(&fx.ctx()), PumpStatus::Continue);
        assert_eq!(session.bytes_fed(), 2 * BLOCK as u64);
        assert_eq!(fx.ring.occupied(), BLOCK);
    }

    #[test]
    fn close_swallows_teardown_errors() {
        let fx = Fixture::new();
        let session = fx.open("Speakers");
        fx.backend.remove_endpoint("Speakers");
        session.close();
        assert_eq!(fx.backend.close_count(), 1);
        assert_eq!(fx.backend.live_sinks(), 0);
    }

    #[test]
    fn drop_closes_session() {
        let fx = Fixture::new();
        {
            let _session = fx.open("Speakers");
            assert_eq!(fx.backend.live_sinks(), 1);
        }
        assert_eq!(fx.backend.live_sinks(), 0);
    }

    #[test]
    fn open_failure_is_device_unavailable() {
        let fx = Fixture::new();
        fx.backend.fail_next_opens(1);
        let endpoint = fx.backend.default_output_endpoint().unwrap().unwrap();
        let err = DeviceSession::open(&fx.backend, endpoint, "default", 0, BLOCK).unwrap_err();
        assert!(matches!(err, Error::DeviceUnavailable(_)));
    }
}
