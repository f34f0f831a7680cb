//! Settings for the tonegen tone streamer.
//!
//! Initial tone parameters and engine timings can be kept in a TOML file.
//! Every field has a default, so an empty file (or no file at all) is valid.
//!
//! # Example
//!
//! ```rust,no_run
//! use tonegen_config::{Settings, default_settings_path};
//!
//! let settings = Settings::load_or_default(None).unwrap();
//! println!("{} Hz on {}", settings.tone.frequency_hz, settings.tone.device);
//!
//! let mut settings = Settings::default();
//! settings.tone.frequency_hz = 440.0;
//! settings.save(default_settings_path()).unwrap();
//! ```

mod error;
mod settings;

/// Platform-specific configuration paths.
pub mod paths;

pub use error::ConfigError;
pub use paths::{default_settings_path, ensure_user_config_dir, user_config_dir};
pub use settings::{EngineSettings, Settings, ToneSettings};
