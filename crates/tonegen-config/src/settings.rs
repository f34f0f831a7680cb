//! Settings file format and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tonegen_core::format::{DEFAULT_BLOCK_FRAMES, MAX_FREQUENCY_HZ, SAMPLE_RATE};
use tonegen_core::{DEFAULT_SELECTOR, ToneParameters};

use crate::error::ConfigError;
use crate::paths::default_settings_path;

/// Smallest accepted block, in frames.
const MIN_BLOCK_FRAMES: usize = 16;

/// Complete settings file.
///
/// # TOML Format
///
/// ```toml
/// [tone]
/// frequency_hz = 1000.0
/// volume = 0.5
/// muted = false
/// device = "default"
///
/// [engine]
/// block_frames = 800
/// resolve_backoff_ms = 500
/// idle_wait_ms = 100
/// rebuild_wait_ms = 100
/// pump_wait_ms = 1
/// shutdown_timeout_ms = 1000
/// default_poll_ms = 500
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Initial tone parameters.
    #[serde(default)]
    pub tone: ToneSettings,
    /// Engine sizing and timings.
    #[serde(default)]
    pub engine: EngineSettings,
}

/// Initial tone parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToneSettings {
    /// Tone frequency in Hz.
    pub frequency_hz: f64,
    /// Linear amplitude in `[0, 1]`.
    pub volume: f64,
    /// Start muted.
    pub muted: bool,
    /// `"default"`, a device name, or empty for no device.
    pub device: String,
}

impl Default for ToneSettings {
    /// 1 kHz at half volume on the default device, unmuted.
    ///
    /// Unlike [`ToneParameters::default`], which starts muted for library
    /// users, `tonegen play` with no settings file should be audible.
    fn default() -> Self {
        Self {
            frequency_hz: 1000.0,
            volume: 0.5,
            muted: false,
            device: DEFAULT_SELECTOR.to_string(),
        }
    }
}

impl ToneSettings {
    /// Shared parameters initialized from these settings.
    pub fn to_parameters(&self) -> ToneParameters {
        ToneParameters::new(self.frequency_hz, self.volume, self.muted, self.device.clone())
    }
}

/// Engine sizing and timings, in frames and milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineSettings {
    /// Frames per synthesis block.
    pub block_frames: usize,
    /// Wait after a failed resolution or open.
    pub resolve_backoff_ms: u64,
    /// Re-check interval while the device selector is blank.
    pub idle_wait_ms: u64,
    /// Pause between closing a session and resolving again.
    pub rebuild_wait_ms: u64,
    /// Bounded wait inside an idle pump tick.
    pub pump_wait_ms: u64,
    /// Join window per worker thread on shutdown.
    pub shutdown_timeout_ms: u64,
    /// Default-device poll interval.
    pub default_poll_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            block_frames: DEFAULT_BLOCK_FRAMES,
            resolve_backoff_ms: 500,
            idle_wait_ms: 100,
            rebuild_wait_ms: 100,
            pump_wait_ms: 1,
            shutdown_timeout_ms: 1000,
            default_poll_ms: 500,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load settings from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load from `path` if given, otherwise from the default path.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    /// The result is validated either way.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::load(path)?,
            None => {
                let path = default_settings_path();
                if path.exists() {
                    Self::load(&path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Save the settings to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the settings to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every field against its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tone = &self.tone;
        if !tone.frequency_hz.is_finite() || !(0.0..=MAX_FREQUENCY_HZ).contains(&tone.frequency_hz)
        {
            return Err(ConfigError::invalid(
                "tone.frequency_hz",
                format!("must be within [0, {MAX_FREQUENCY_HZ}]"),
            ));
        }
        if !tone.volume.is_finite() || !(0.0..=1.0).contains(&tone.volume) {
            return Err(ConfigError::invalid("tone.volume", "must be within [0, 1]"));
        }

        let engine = &self.engine;
        let max_block = SAMPLE_RATE as usize;
        if !(MIN_BLOCK_FRAMES..=max_block).contains(&engine.block_frames) {
            return Err(ConfigError::invalid(
                "engine.block_frames",
                format!("must be within [{MIN_BLOCK_FRAMES}, {max_block}]"),
            ));
        }

        for (field, value) in [
            ("engine.resolve_backoff_ms", engine.resolve_backoff_ms),
            ("engine.idle_wait_ms", engine.idle_wait_ms),
            ("engine.rebuild_wait_ms", engine.rebuild_wait_ms),
            ("engine.pump_wait_ms", engine.pump_wait_ms),
            ("engine.shutdown_timeout_ms", engine.shutdown_timeout_ms),
            ("engine.default_poll_ms", engine.default_poll_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        Ok(())
    }
}
