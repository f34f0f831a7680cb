//! Deterministic in-process backend for tests and headless runs.
//!
//! [`MockBackend`] keeps an endpoint list and a default endpoint that tests
//! mutate directly, fires default-changed callbacks synchronously, can fail
//! opens on demand, and captures every PCM byte pushed to its sinks.
//!
//! ```rust
//! use tonegen_io::mock::MockBackend;
//! use tonegen_io::{OutputBackend, SinkConfig};
//!
//! let backend = MockBackend::with_endpoints(&["Speakers", "Headphones"]);
//! let default = backend.default_output_endpoint()?.unwrap();
//! assert_eq!(default.name, "Speakers");
//!
//! let mut sink = backend.open_output(&default, &SinkConfig::for_block(16))?;
//! sink.push(&[1, 2, 3, 4])?;
//! assert_eq!(backend.captured(), vec![1, 2, 3, 4]);
//! # Ok::<(), tonegen_io::Error>(())
//! ```

use crate::backend::{
    DefaultChangedCallback, Endpoint, EndpointId, NotificationHandle, OutputBackend, OutputSink,
    SinkConfig,
};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Upper bound on captured PCM per backend; older bytes are dropped first.
const CAPTURE_LIMIT: usize = 4 * 1024 * 1024;

type SharedCallback = Arc<dyn Fn() + Send + Sync>;

/// Scriptable output backend.
///
/// Cloning yields another handle to the same device set, so a test can keep
/// one clone while the engine owns another.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    paused: Arc<AtomicBool>,
}

#[derive(Default)]
struct MockState {
    endpoints: Vec<Endpoint>,
    default: Option<EndpointId>,
    next_endpoint: u64,
    subscribers: Vec<(u64, SharedCallback)>,
    next_subscriber: u64,
    fail_opens: usize,
    opened: Vec<String>,
    closes: usize,
    sinks: Vec<Arc<MockSinkShared>>,
    captured: Vec<u8>,
    total_pushed: usize,
}

struct MockSinkShared {
    endpoint: Endpoint,
    lost: AtomicBool,
    closed: AtomicBool,
}

impl MockBackend {
    /// Empty device set with no default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Device set with `names` in enumeration order; the first is the default.
    pub fn with_endpoints(names: &[&str]) -> Self {
        let backend = Self::new();
        for name in names {
            backend.add_endpoint(name);
        }
        if let Some(first) = names.first() {
            backend.set_default(first);
        }
        backend
    }

    /// Add an active endpoint and return its identity.
    pub fn add_endpoint(&self, name: &str) -> EndpointId {
        let mut state = self.state.lock();
        state.next_endpoint += 1;
        let endpoint = Endpoint::new(format!("mock-{}", state.next_endpoint), name);
        let id = endpoint.id.clone();
        state.endpoints.push(endpoint);
        id
    }

    /// Remove the first endpoint named `name`.
    ///
    /// Open sinks on it start reporting `DeviceLost`. Removing the default
    /// endpoint clears the default and notifies subscribers.
    pub fn remove_endpoint(&self, name: &str) -> bool {
        let callbacks = {
            let mut state = self.state.lock();
            let Some(index) = state.endpoints.iter().position(|e| e.name == name) else {
                return false;
            };
            let removed = state.endpoints.remove(index);
            for sink in state.sinks.iter().filter(|s| s.endpoint.id == removed.id) {
                sink.lost.store(true, Ordering::SeqCst);
            }
            if state.default.as_ref() == Some(&removed.id) {
                state.default = None;
                Some(collect_callbacks(&state))
            } else {
                None
            }
        };
        if let Some(callbacks) = callbacks {
            notify(&callbacks);
        }
        true
    }

    /// Make the endpoint named `name` the system default and notify subscribers.
    pub fn set_default(&self, name: &str) -> bool {
        let callbacks = {
            let mut state = self.state.lock();
            let Some(id) = state
                .endpoints
                .iter()
                .find(|e| e.name == name)
                .map(|e| e.id.clone())
            else {
                return false;
            };
            state.default = Some(id);
            collect_callbacks(&state)
        };
        notify(&callbacks);
        true
    }

    /// Remove the system default and notify subscribers.
    pub fn clear_default(&self) {
        let callbacks = {
            let mut state = self.state.lock();
            state.default = None;
            collect_callbacks(&state)
        };
        notify(&callbacks);
    }

    /// Make the next `count` opens fail with `DeviceUnavailable`.
    pub fn fail_next_opens(&self, count: usize) {
        self.state.lock().fail_opens = count;
    }

    /// Stop (or resume) device-side consumption. While paused, pushed bytes
    /// stay buffered.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Names of endpoints opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.state.lock().opened.clone()
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.state.lock().opened.len()
    }

    /// Number of sinks closed.
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Sinks opened and not yet closed.
    pub fn live_sinks(&self) -> usize {
        self.state
            .lock()
            .sinks
            .iter()
            .filter(|s| !s.closed.load(Ordering::SeqCst))
            .count()
    }

    /// Registered default-changed callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Total bytes accepted by all sinks.
    pub fn total_pushed(&self) -> usize {
        self.state.lock().total_pushed
    }

    /// Most recent captured PCM across all sinks.
    pub fn captured(&self) -> Vec<u8> {
        self.state.lock().captured.clone()
    }

    /// Forget captured PCM.
    pub fn clear_captured(&self) {
        self.state.lock().captured.clear();
    }
}

fn collect_callbacks(state: &MockState) -> Vec<SharedCallback> {
    state
        .subscribers
        .iter()
        .map(|(_, cb)| Arc::clone(cb))
        .collect()
}

fn notify(callbacks: &[SharedCallback]) {
    for callback in callbacks {
        callback();
    }
}

impl OutputBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn output_endpoints(&self) -> Result<Vec<Endpoint>> {
        Ok(self.state.lock().endpoints.clone())
    }

    fn default_output_endpoint(&self) -> Result<Option<Endpoint>> {
        let state = self.state.lock();
        Ok(state
            .default
            .as_ref()
            .and_then(|id| state.endpoints.iter().find(|e| &e.id == id).cloned()))
    }

    fn open_output(
        &self,
        endpoint: &Endpoint,
        config: &SinkConfig,
    ) -> Result<Box<dyn OutputSink>> {
        let mut state = self.state.lock();
        if !state.endpoints.iter().any(|e| e.id == endpoint.id) {
            return Err(Error::DeviceUnavailable(format!(
                "endpoint '{}' is not active",
                endpoint.name
            )));
        }
        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            return Err(Error::DeviceUnavailable(format!(
                "injected open failure on '{}'",
                endpoint.name
            )));
        }

        let shared = Arc::new(MockSinkShared {
            endpoint: endpoint.clone(),
            lost: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });
        state.sinks.push(Arc::clone(&shared));
        state.opened.push(endpoint.name.clone());

        Ok(Box::new(MockSink {
            shared,
            backend: Arc::clone(&self.state),
            paused: Arc::clone(&self.paused),
            capacity: config.buffer_bytes,
            buffered: Mutex::new(0),
        }))
    }

    fn subscribe_default_changed(
        &self,
        callback: DefaultChangedCallback,
    ) -> Result<NotificationHandle> {
        let mut state = self.state.lock();
        state.next_subscriber += 1;
        let id = state.next_subscriber;
        state.subscribers.push((id, Arc::from(callback)));
        Ok(NotificationHandle::new(MockSubscription {
            id,
            backend: Arc::clone(&self.state),
        }))
    }
}

struct MockSubscription {
    id: u64,
    backend: Arc<Mutex<MockState>>,
}

impl Drop for MockSubscription {
    fn drop(&mut self) {
        self.backend.lock().subscribers.retain(|(id, _)| *id != self.id);
    }
}

struct MockSink {
    shared: Arc<MockSinkShared>,
    backend: Arc<Mutex<MockState>>,
    paused: Arc<AtomicBool>,
    capacity: usize,
    buffered: Mutex<usize>,
}

impl MockSink {
    fn lost_error(&self) -> Error {
        Error::DeviceLost(format!("endpoint '{}' removed", self.shared.endpoint.name))
    }
}

impl OutputSink for MockSink {
    fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    fn buffered_bytes(&self) -> usize {
        let mut buffered = self.buffered.lock();
        if !self.paused.load(Ordering::SeqCst) {
            // The simulated device consumes everything between polls.
            *buffered = 0;
        }
        *buffered
    }

    fn push(&mut self, pcm: &[u8]) -> Result<()> {
        if self.shared.lost.load(Ordering::SeqCst) {
            return Err(self.lost_error());
        }
        let mut buffered = self.buffered.lock();
        let accepted = pcm.len().min(self.capacity.saturating_sub(*buffered));
        *buffered += accepted;

        let mut state = self.backend.lock();
        state.total_pushed += accepted;
        state.captured.extend_from_slice(&pcm[..accepted]);
        if state.captured.len() > CAPTURE_LIMIT {
            let excess = state.captured.len() - CAPTURE_LIMIT;
            state.captured.drain(..excess);
        }
        Ok(())
    }

    fn health(&self) -> Result<()> {
        if self.shared.lost.load(Ordering::SeqCst) {
            Err(self.lost_error())
        } else {
            Ok(())
        }
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.backend.lock().closes += 1;
        // A vanished device can fail during teardown too.
        self.health()
    }
}
