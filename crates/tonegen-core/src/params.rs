//! Tone parameters shared between the controller and the worker threads.
//!
//! Each field is an independent scalar. Readers take whatever value is
//! current when they look; a read may be one generator or render cycle
//! stale, which only delays a parameter change by one block. No lock sits on
//! the generation path.

use crate::format::MAX_FREQUENCY_HZ;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Selector value that follows the system default output endpoint.
pub const DEFAULT_SELECTOR: &str = "default";

/// An `f64` stored as its bit pattern in an [`AtomicU64`].
///
/// Loads and stores are `Relaxed`: the value is a standalone scalar and no
/// other memory is published through it.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    /// Create a new atomic holding `value`.
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    /// Read the current value.
    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Replace the current value.
    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Plain copy of the parameters, for display and logging.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneSnapshot {
    /// Tone frequency in Hz.
    pub frequency_hz: f64,
    /// Linear amplitude in `[0, 1]`.
    pub volume: f64,
    /// Whether silence is produced instead of the tone.
    pub muted: bool,
    /// `"default"` or a device name to match.
    pub device_selector: String,
}

/// Frequency, volume, mute and device selector.
///
/// Created once, shared through an `Arc` with the generator and render
/// threads, and mutated by the controller at any time.
///
/// ```rust
/// use tonegen_core::ToneParameters;
///
/// let params = ToneParameters::default();
/// params.set_volume(1.7);
/// assert_eq!(params.volume(), 1.0);
///
/// let generation = params.selector_generation();
/// params.set_device_selector("USB Audio");
/// assert!(params.selector_generation() > generation);
/// ```
#[derive(Debug)]
pub struct ToneParameters {
    frequency: AtomicF64,
    volume: AtomicF64,
    muted: AtomicBool,
    selector: RwLock<String>,
    selector_generation: AtomicU64,
}

impl Default for ToneParameters {
    /// 1 kHz at half volume, muted, following the default device.
    fn default() -> Self {
        Self::new(1000.0, 0.5, true, DEFAULT_SELECTOR)
    }
}

impl ToneParameters {
    /// Create parameters with explicit initial values (clamped like the setters).
    pub fn new(frequency_hz: f64, volume: f64, muted: bool, selector: impl Into<String>) -> Self {
        let params = Self {
            frequency: AtomicF64::new(1000.0),
            volume: AtomicF64::new(0.5),
            muted: AtomicBool::new(muted),
            selector: RwLock::new(selector.into()),
            selector_generation: AtomicU64::new(0),
        };
        params.set_frequency(frequency_hz);
        params.set_volume(volume);
        params
    }

    /// Current tone frequency in Hz.
    #[inline]
    pub fn frequency(&self) -> f64 {
        self.frequency.load()
    }

    /// Set the tone frequency, clamped to `[0, Nyquist]`. Non-finite values are ignored.
    pub fn set_frequency(&self, frequency_hz: f64) {
        if frequency_hz.is_finite() {
            self.frequency
                .store(frequency_hz.clamp(0.0, MAX_FREQUENCY_HZ));
        }
    }

    /// Current linear volume.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.volume.load()
    }

    /// Set the linear volume, clamped to `[0, 1]`. Non-finite values are ignored.
    pub fn set_volume(&self, volume: f64) {
        if volume.is_finite() {
            self.volume.store(volume.clamp(0.0, 1.0));
        }
    }

    /// Whether the generator writes silence.
    #[inline]
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Mute or unmute.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    /// Flip the mute state, returning the new value.
    pub fn toggle_muted(&self) -> bool {
        !self.muted.fetch_xor(true, Ordering::Relaxed)
    }

    /// Current device selector.
    pub fn device_selector(&self) -> String {
        self.selector.read().clone()
    }

    /// Replace the device selector.
    ///
    /// Bumps the selector generation only when the value actually changes,
    /// so re-applying the same selector does not tear down a live session.
    pub fn set_device_selector(&self, selector: impl Into<String>) {
        let selector = selector.into();
        let mut current = self.selector.write();
        if *current != selector {
            *current = selector;
            self.selector_generation.fetch_add(1, Ordering::Release);
        }
    }

    /// Counter bumped on every selector change.
    #[inline]
    pub fn selector_generation(&self) -> u64 {
        self.selector_generation.load(Ordering::Acquire)
    }

    /// Copy all fields.
    pub fn snapshot(&self) -> ToneSnapshot {
        ToneSnapshot {
            frequency_hz: self.frequency(),
            volume: self.volume(),
            muted: self.is_muted(),
            device_selector: self.device_selector(),
        }
    }
}
