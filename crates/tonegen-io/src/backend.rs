//! Pluggable output device abstraction.
//!
//! This module defines the [`OutputBackend`] trait, which decouples the render
//! loop from any specific platform audio API. The default implementation wraps
//! [cpal](https://crates.io/crates/cpal); [`MockBackend`](crate::mock::MockBackend)
//! provides a deterministic in-process device set for tests.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │            RenderLoop            │
//! │  resolve selector / pump / swap  │
//! └──────────────┬───────────────────┘
//!                │ uses OutputBackend trait
//!                ▼
//! ┌──────────────────────────────────┐
//! │       OutputBackend trait        │
//! │ enumerate / default / open / sub │
//! └──────────────┬───────────────────┘
//!                │ implemented by
//!        ┌───────┴────────┐
//!        ▼                ▼
//! ┌─────────────┐  ┌─────────────┐
//! │ CpalBackend │  │ MockBackend │
//! │  (default)  │  │   (tests)   │
//! └─────────────┘  └─────────────┘
//! ```
//!
//! Unlike a callback-driven stream, an [`OutputSink`] is *pushed*: the render
//! loop queries how much the device still has buffered and feeds one block
//! when there is headroom. Sinks own a small device-side buffer and render
//! silence whenever it runs dry.

use crate::Result;

/// System-assigned identity of an output endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId(String);

impl EndpointId {
    /// Wrap a backend-specific identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An active playback endpoint as seen during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Stable identity used to detect removal.
    pub id: EndpointId,
    /// Human-readable name matched against the device selector.
    pub name: String,
}

impl Endpoint {
    /// Create an endpoint description.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EndpointId::new(id),
            name: name.into(),
        }
    }
}

/// Parameters for opening an output sink.
///
/// ## Fields
///
/// - `sample_rate`: 48000 for this crate's PCM layout
/// - `channels`: 2 (interleaved stereo)
/// - `buffer_bytes`: device-side buffer length, two blocks by default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Device-side buffer length in bytes.
    pub buffer_bytes: usize,
}

impl SinkConfig {
    /// Standard 48 kHz stereo config sized for two blocks of `block_bytes`.
    pub fn for_block(block_bytes: usize) -> Self {
        Self {
            sample_rate: tonegen_core::format::SAMPLE_RATE,
            channels: tonegen_core::format::CHANNELS,
            buffer_bytes: tonegen_core::format::double_buffered(block_bytes),
        }
    }
}

/// One opened output endpoint.
///
/// Playback starts as soon as the sink is opened; while nothing has been
/// pushed the device plays silence.
pub trait OutputSink {
    /// Endpoint this sink was opened on.
    fn endpoint(&self) -> &Endpoint;

    /// Bytes pushed but not yet consumed by the device.
    fn buffered_bytes(&self) -> usize;

    /// Queue interleaved 16-bit PCM bytes. Bytes beyond the device-side
    /// buffer length are discarded.
    fn push(&mut self, pcm: &[u8]) -> Result<()>;

    /// `Ok` while the device is usable; `Err(DeviceLost)` once it is gone.
    fn health(&self) -> Result<()>;

    /// Stop playback and release the device.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Callback invoked when the system default output endpoint changes.
///
/// May run on any thread; implementations must only set a flag.
pub type DefaultChangedCallback = Box<dyn Fn() + Send + Sync>;

/// Registration for default-endpoint-changed notifications.
///
/// Dropping the handle unregisters the callback. The inner value is
/// type-erased so backend types stay out of the render loop.
pub struct NotificationHandle {
    _inner: Box<dyn Send>,
}

impl NotificationHandle {
    /// Wrap a backend-specific registration kept alive until drop.
    pub fn new<T: Send + 'static>(registration: T) -> Self {
        Self {
            _inner: Box::new(registration),
        }
    }

    /// A handle with nothing to unregister, for backends without notifications.
    pub fn inert() -> Self {
        Self::new(())
    }
}

impl std::fmt::Debug for NotificationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHandle").finish_non_exhaustive()
    }
}

/// Pluggable output backend.
///
/// Object-safe so the engine can hold a `Box<dyn OutputBackend>` chosen at
/// runtime. Only the render thread calls into the backend after startup.
pub trait OutputBackend: Send {
    /// Human-readable backend name (e.g. "cpal", "mock").
    fn name(&self) -> &str;

    /// Active render endpoints in enumeration order.
    fn output_endpoints(&self) -> Result<Vec<Endpoint>>;

    /// Current system default render endpoint, if any.
    fn default_output_endpoint(&self) -> Result<Option<Endpoint>>;

    /// Open `endpoint` and start playing silence.
    ///
    /// Failures are reported as [`Error::DeviceUnavailable`](crate::Error::DeviceUnavailable)
    /// or [`Error::UnsupportedFormat`](crate::Error::UnsupportedFormat).
    fn open_output(&self, endpoint: &Endpoint, config: &SinkConfig)
    -> Result<Box<dyn OutputSink>>;

    /// Register `callback` for default-endpoint changes until the returned
    /// handle is dropped.
    fn subscribe_default_changed(
        &self,
        callback: DefaultChangedCallback,
    ) -> Result<NotificationHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_config_holds_two_blocks() {
        let config = SinkConfig::for_block(3200);
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.channels, 2);
        assert_eq!(config.buffer_bytes, 6400);
    }

    #[test]
    fn notification_handle_debug() {
        let handle = NotificationHandle::inert();
        assert!(format!("{handle:?}").contains("NotificationHandle"));
    }

    #[test]
    fn endpoint_id_display() {
        let endpoint = Endpoint::new("hw:1", "USB Audio");
        assert_eq!(endpoint.id.to_string(), "hw:1");
        assert_eq!(endpoint.id.as_str(), "hw:1");
    }
}
