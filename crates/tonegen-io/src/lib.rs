//! Device I/O and worker loops for the tonegen tone streamer.
//!
//! This crate wires the [`tonegen_core`] primitives to a playback device:
//!
//! - **Device abstraction**: [`OutputBackend`] / [`OutputSink`], implemented by
//!   [`CpalBackend`] for real hardware and [`mock::MockBackend`] for tests
//! - **Producer**: [`GeneratorLoop`] synthesizes blocks into the ring buffer
//! - **Consumer**: [`RenderLoop`] resolves the device selector, drives a
//!   [`DeviceSession`], and rebuilds it when the device goes away or the
//!   system default changes
//! - **Lifecycle**: [`ToneEngine`] starts both threads and shuts them down
//!   cooperatively with a bounded join
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tonegen_core::ToneParameters;
//! use tonegen_io::{CpalBackend, EngineConfig, ToneEngine};
//!
//! let params = Arc::new(ToneParameters::default());
//! params.set_muted(false);
//!
//! let engine = ToneEngine::start(
//!     Box::new(CpalBackend::new()),
//!     Arc::clone(&params),
//!     EngineConfig::default(),
//! )?;
//!
//! params.set_frequency(440.0);
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! engine.shutdown()?;
//! # Ok::<(), tonegen_io::Error>(())
//! ```

pub mod backend;
mod config;
pub mod cpal_backend;
mod engine;
mod generator;
pub mod mock;
mod render;
mod selector;
mod session;
mod signal;

use std::time::Duration;

pub use backend::{
    DefaultChangedCallback, Endpoint, EndpointId, NotificationHandle, OutputBackend, OutputSink,
    SinkConfig,
};
pub use config::EngineConfig;
pub use cpal_backend::CpalBackend;
pub use engine::ToneEngine;
pub use generator::{GeneratorLoop, GeneratorStats};
pub use render::{RenderLoop, RenderSnapshot, RenderState, RenderStatus};
pub use selector::{DeviceSelector, list_output_endpoints, resolve_endpoint};
pub use session::{DeviceSession, PumpContext, PumpStatus, RebuildReason};
pub use signal::{ResetFlag, ShutdownSignal};

/// Error types for device I/O and worker lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The endpoint could not be opened. Transient: retried after backoff.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The selector matched no active endpoint. Retried after backoff.
    #[error("No output device matching '{0}'")]
    NoMatchingDevice(String),

    /// The endpoint disappeared or failed while streaming.
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// A worker thread did not exit within the bounded join window.
    #[error("Thread '{thread}' did not exit within {timeout:?}")]
    ShutdownTimeout {
        /// Name of the worker thread.
        thread: String,
        /// Join window that elapsed.
        timeout: Duration,
    },

    /// A worker thread panicked before it was joined.
    #[error("Thread '{thread}' panicked")]
    WorkerPanicked {
        /// Name of the worker thread.
        thread: String,
    },

    /// The backend could not enumerate or query endpoints.
    #[error("Audio backend error: {0}")]
    Backend(String),

    /// The endpoint supports none of the sample formats we can produce.
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// A worker thread could not be spawned.
    #[error("Failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl Error {
    /// Whether the render loop should retry after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::DeviceUnavailable(_)
                | Error::NoMatchingDevice(_)
                | Error::DeviceLost(_)
                | Error::Backend(_)
                | Error::UnsupportedFormat(_)
        )
    }
}

/// Convenience result type for device I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
