//! Consumer loop: resolves the device selector and streams the ring buffer.
//!
//! ```text
//!            ┌────────────── rebuild_wait ──────────────┐
//!            ▼                                          │
//!   Idle ─▶ Resolving ──open ok──▶ Streaming ──NeedsRebuild
//!    ▲          │
//!    └─ backoff ┘ (no match / open failed)
//! ```
//!
//! Every wait goes through [`ShutdownSignal::wait_timeout`], so the loop
//! leaves within one wait interval of a shutdown request from any state.

use crate::backend::{NotificationHandle, OutputBackend};
use crate::config::EngineConfig;
use crate::selector::{DeviceSelector, resolve_endpoint};
use crate::session::{DeviceSession, PumpContext, PumpStatus, RebuildReason};
use crate::signal::{ResetFlag, ShutdownSignal};
use crate::Error;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use tonegen_core::{RingBuffer, ToneParameters};

/// Where the render loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RenderState {
    /// No device: blank selector or nothing matched.
    Idle = 0,
    /// Looking up and opening an endpoint.
    Resolving = 1,
    /// A device session is being pumped.
    Streaming = 2,
    /// The loop has exited.
    Terminated = 3,
}

impl RenderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RenderState::Resolving,
            2 => RenderState::Streaming,
            3 => RenderState::Terminated,
            _ => RenderState::Idle,
        }
    }

    /// Lowercase label for display.
    pub fn label(self) -> &'static str {
        match self {
            RenderState::Idle => "idle",
            RenderState::Resolving => "resolving",
            RenderState::Streaming => "streaming",
            RenderState::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for RenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time copy of [`RenderStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSnapshot {
    /// Current state.
    pub state: RenderState,
    /// Name of the endpoint being streamed to, if any.
    pub endpoint: Option<String>,
    /// Device sessions opened so far.
    pub sessions_opened: u64,
    /// Sessions torn down for a rebuild (any reason other than shutdown).
    pub rebuilds: u64,
    /// Resolutions that matched nothing.
    pub resolve_failures: u64,
    /// Resolved endpoints that failed to open.
    pub open_failures: u64,
}

/// Render loop progress, readable from any thread.
#[derive(Debug)]
pub struct RenderStatus {
    state: AtomicU8,
    endpoint: Mutex<Option<String>>,
    sessions_opened: AtomicU64,
    rebuilds: AtomicU64,
    resolve_failures: AtomicU64,
    open_failures: AtomicU64,
}

impl Default for RenderStatus {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(RenderState::Idle as u8),
            endpoint: Mutex::new(None),
            sessions_opened: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
            resolve_failures: AtomicU64::new(0),
            open_failures: AtomicU64::new(0),
        }
    }
}

impl RenderStatus {
    /// Fresh status in [`RenderState::Idle`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> RenderState {
        RenderState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Copy every field.
    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot {
            state: self.state(),
            endpoint: self.endpoint.lock().clone(),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            resolve_failures: self.resolve_failures.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
        }
    }

    fn set_state(&self, state: RenderState) {
        let previous = self.state.swap(state as u8, Ordering::AcqRel);
        if previous != state as u8 {
            tracing::debug!(from = %RenderState::from_u8(previous), to = %state, "render state");
        }
    }

    fn set_endpoint(&self, name: Option<String>) {
        *self.endpoint.lock() = name;
    }
}

/// Drives device sessions from the ring buffer until shutdown.
pub struct RenderLoop {
    backend: Box<dyn OutputBackend>,
    ring: Arc<RingBuffer>,
    params: Arc<ToneParameters>,
    shutdown: ShutdownSignal,
    config: EngineConfig,
    status: Arc<RenderStatus>,
    reset: ResetFlag,
    last_unmatched: Option<String>,
}

impl RenderLoop {
    /// Create a render loop. Nothing touches the backend until [`run`](Self::run).
    pub fn new(
        backend: Box<dyn OutputBackend>,
        ring: Arc<RingBuffer>,
        params: Arc<ToneParameters>,
        shutdown: ShutdownSignal,
        config: EngineConfig,
        status: Arc<RenderStatus>,
    ) -> Self {
        Self {
            backend,
            ring,
            params,
            shutdown,
            config,
            status,
            reset: ResetFlag::new(),
            last_unmatched: None,
        }
    }

    /// Run until shutdown is requested.
    ///
    /// Device errors never end the loop; they lead back to resolution after
    /// a backoff. The default-changed subscription lives exactly as long as
    /// this call.
    pub fn run(mut self) {
        tracing::debug!(backend = self.backend.name(), "render loop started");
        let subscription = self.subscribe();

        while !self.shutdown.is_requested() {
            let selector = self.params.device_selector();
            if DeviceSelector::parse(&selector).is_blank() {
                self.status.set_state(RenderState::Idle);
                self.shutdown.wait_timeout(self.config.idle_wait);
                continue;
            }

            // Sessions opened from here on already reflect the latest default.
            self.reset.take();
            self.status.set_state(RenderState::Resolving);
            let generation = self.params.selector_generation();

            let Some(session) = self.open_session(&selector, generation) else {
                continue;
            };
            self.stream(session);

            if self.shutdown.wait_timeout(self.config.rebuild_wait) {
                break;
            }
        }

        if let Some(subscription) = subscription {
            drop(subscription);
            tracing::debug!("unsubscribed from default device changes");
        }
        self.status.set_endpoint(None);
        self.status.set_state(RenderState::Terminated);
        tracing::debug!("render loop stopped");
    }

    fn subscribe(&self) -> Option<NotificationHandle> {
        let reset = self.reset.clone();
        match self
            .backend
            .subscribe_default_changed(Box::new(move || reset.set()))
        {
            Ok(handle) => {
                tracing::debug!("subscribed to default device changes");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(error = %e, "default device notifications unavailable");
                None
            }
        }
    }

    /// Resolve and open; on failure back off and return `None`.
    fn open_session(&mut self, selector: &str, generation: u64) -> Option<DeviceSession> {
        let endpoint = match resolve_endpoint(self.backend.as_ref(), selector) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.status.resolve_failures.fetch_add(1, Ordering::Relaxed);
                self.status.set_state(RenderState::Idle);
                self.report_unmatched(selector, &e);
                self.shutdown.wait_timeout(self.config.resolve_backoff);
                return None;
            }
        };
        self.last_unmatched = None;

        match DeviceSession::open(
            self.backend.as_ref(),
            endpoint,
            selector,
            generation,
            self.config.block_bytes(),
        ) {
            Ok(session) => Some(session),
            Err(e) => {
                self.status.open_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(selector, error = %e, "failed to open output device; retrying");
                self.shutdown.wait_timeout(self.config.resolve_backoff);
                None
            }
        }
    }

    fn report_unmatched(&mut self, selector: &str, error: &Error) {
        if self.last_unmatched.as_deref() == Some(selector) {
            tracing::debug!(selector, error = %error, "still no matching output device");
        } else {
            tracing::warn!(selector, error = %error, "no matching output device; waiting");
            self.last_unmatched = Some(selector.to_string());
        }
    }

    fn stream(&mut self, mut session: DeviceSession) {
        self.status.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.status.set_endpoint(Some(session.endpoint().name.clone()));
        self.status.set_state(RenderState::Streaming);

        let ctx = PumpContext {
            ring: &self.ring,
            params: &self.params,
            reset: &self.reset,
            shutdown: &self.shutdown,
            pump_wait: self.config.pump_wait,
        };

        let reason = loop {
            if let PumpStatus::NeedsRebuild(reason) = session.pump(&ctx) {
                break reason;
            }
        };

        tracing::info!(
            endpoint = %session.endpoint().name,
            ?reason,
            bytes_fed = session.bytes_fed(),
            "device session ending"
        );
        session.close();
        self.status.set_endpoint(None);

        if reason != RebuildReason::Shutdown {
            self.status.rebuilds.fetch_add(1, Ordering::Relaxed);
            self.status.set_state(RenderState::Resolving);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use std::time::{Duration, Instant};

    fn fast_config() -> EngineConfig {
        EngineConfig {
            block_frames: 16,
            resolve_backoff: Duration::from_millis(10),
            idle_wait: Duration::from_millis(5),
            rebuild_wait: Duration::from_millis(5),
            pump_wait: Duration::from_millis(1),
            shutdown_timeout: Duration::from_secs(1),
            default_poll: Duration::from_millis(10),
        }
    }

    struct Harness {
        backend: MockBackend,
        params: Arc<ToneParameters>,
        shutdown: ShutdownSignal,
        status: Arc<RenderStatus>,
        handle: Option<std::thread::JoinHandle<()>>,
    }

    impl Harness {
        fn start(backend: MockBackend, selector: &str) -> Self {
            let config = fast_config();
            let ring = Arc::new(RingBuffer::for_block(config.block_bytes()));
            let params = Arc::new(ToneParameters::new(1000.0, 0.5, false, selector));
            let shutdown = ShutdownSignal::new();
            let status = Arc::new(RenderStatus::new());
            let render = RenderLoop::new(
                Box::new(backend.clone()),
                ring,
                Arc::clone(&params),
                shutdown.clone(),
                config,
                Arc::clone(&status),
            );
            let handle = std::thread::spawn(move || render.run());
            Self {
                backend,
                params,
                shutdown,
                status,
                handle: Some(handle),
            }
        }

        fn wait_for(&self, what: impl Fn(&RenderSnapshot) -> bool) -> RenderSnapshot {
            let deadline = Instant::now() + Duration::from_secs(5);
            loop {
                let snapshot = self.status.snapshot();
                if what(&snapshot) {
                    return snapshot;
                }
                assert!(Instant::now() < deadline, "timed out at {snapshot:?}");
                std::thread::sleep(Duration::from_millis(2));
            }
        }

        fn stop(&mut self) {
            self.shutdown.request();
            if let Some(handle) = self.handle.take() {
                handle.join().unwrap();
            }
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            self.stop();
        }
    }

    #[test]
    fn streams_to_default_endpoint() {
        let h = Harness::start(MockBackend::with_endpoints(&["Speakers"]), "default");
        let snapshot = h.wait_for(|s| s.state == RenderState::Streaming);
        assert_eq!(snapshot.endpoint.as_deref(), Some("Speakers"));
        assert_eq!(h.backend.subscriber_count(), 1);
    }

    #[test]
    fn blank_selector_stays_idle() {
        let h = Harness::start(MockBackend::with_endpoints(&["Speakers"]), "");
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(h.status.state(), RenderState::Idle);
        assert_eq!(h.backend.open_count(), 0);
    }

    #[test]
    fn unmatched_selector_retries_until_device_appears() {
        let h = Harness::start(MockBackend::with_endpoints(&["Speakers"]), "Headphones");
        h.wait_for(|s| s.resolve_failures >= 2);
        assert_eq!(h.backend.open_count(), 0);

        h.backend.add_endpoint("Headphones");
        let snapshot = h.wait_for(|s| s.state == RenderState::Streaming);
        assert_eq!(snapshot.endpoint.as_deref(), Some("Headphones"));
    }

    #[test]
    fn open_failure_is_retried() {
        let backend = MockBackend::with_endpoints(&["Speakers"]);
        backend.fail_next_opens(2);
        let h = Harness::start(backend, "default");
        let snapshot = h.wait_for(|s| s.state == RenderState::Streaming);
        assert_eq!(snapshot.open_failures, 2);
        assert_eq!(h.backend.open_count(), 1);
    }

    #[test]
    fn removed_device_rebuilds_onto_new_default() {
        let h = Harness::start(
            MockBackend::with_endpoints(&["Headphones", "Speakers"]),
            "default",
        );
        h.wait_for(|s| s.endpoint.as_deref() == Some("Headphones"));

        h.backend.remove_endpoint("Headphones");
        h.backend.set_default("Speakers");
        let snapshot = h.wait_for(|s| s.endpoint.as_deref() == Some("Speakers"));
        assert!(snapshot.rebuilds >= 1);
    }

    #[test]
    fn selector_change_moves_session() {
        let h = Harness::start(
            MockBackend::with_endpoints(&["Speakers", "Headphones"]),
            "Speakers",
        );
        h.wait_for(|s| s.endpoint.as_deref() == Some("Speakers"));
        h.params.set_device_selector("Headphones");
        h.wait_for(|s| s.endpoint.as_deref() == Some("Headphones"));
        assert_eq!(h.backend.live_sinks(), 1);
    }

    #[test]
    fn default_change_rebuilds_named_session_too() {
        let h = Harness::start(
            MockBackend::with_endpoints(&["Speakers", "Headphones"]),
            "Speakers",
        );
        h.wait_for(|s| s.state == RenderState::Streaming);
        h.backend.set_default("Headphones");
        let snapshot = h.wait_for(|s| s.rebuilds >= 1 && s.state == RenderState::Streaming);
        assert_eq!(snapshot.endpoint.as_deref(), Some("Speakers"));
        assert_eq!(snapshot.sessions_opened, 2);
    }

    #[test]
    fn shutdown_terminates_and_releases_everything() {
        let mut h = Harness::start(MockBackend::with_endpoints(&["Speakers"]), "default");
        h.wait_for(|s| s.state == RenderState::Streaming);
        h.stop();
        assert_eq!(h.status.state(), RenderState::Terminated);
        assert_eq!(h.backend.live_sinks(), 0);
        assert_eq!(h.backend.subscriber_count(), 0);
    }

    #[test]
    fn state_labels() {
        assert_eq!(RenderState::Streaming.to_string(), "streaming");
        assert_eq!(RenderState::from_u8(3), RenderState::Terminated);
    }
}
