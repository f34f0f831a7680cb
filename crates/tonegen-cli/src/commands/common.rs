//! Shared CLI helpers used across multiple commands.

use std::path::Path;
use std::time::Duration;
use tonegen_config::{EngineSettings, Settings};
use tonegen_io::{EngineConfig, OutputBackend, list_output_endpoints};

/// Load and validate settings from `path`, or the default location.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    Settings::load_or_default(path).map_err(|e| anyhow::anyhow!("{e}"))
}

/// Runtime engine configuration from the `[engine]` table.
pub fn engine_config(settings: &EngineSettings) -> EngineConfig {
    EngineConfig {
        block_frames: settings.block_frames,
        resolve_backoff: Duration::from_millis(settings.resolve_backoff_ms),
        idle_wait: Duration::from_millis(settings.idle_wait_ms),
        rebuild_wait: Duration::from_millis(settings.rebuild_wait_ms),
        pump_wait: Duration::from_millis(settings.pump_wait_ms),
        shutdown_timeout: Duration::from_millis(settings.shutdown_timeout_ms),
        default_poll: Duration::from_millis(settings.default_poll_ms),
    }
}

/// Print active output endpoints, marking the default.
pub fn print_endpoints(backend: &dyn OutputBackend) -> anyhow::Result<()> {
    let endpoints = list_output_endpoints(backend)?;
    if endpoints.is_empty() {
        println!("No output devices found.");
        return Ok(());
    }

    println!("Output Devices:");
    for (idx, (endpoint, is_default)) in endpoints.iter().enumerate() {
        let marker = if *is_default { " (default)" } else { "" };
        println!("  [{idx}] {}{marker}", endpoint.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_map_to_default_engine_config() {
        assert_eq!(
            engine_config(&EngineSettings::default()),
            EngineConfig::default()
        );
    }

    #[test]
    fn timings_are_milliseconds() {
        let settings = EngineSettings {
            shutdown_timeout_ms: 2500,
            ..EngineSettings::default()
        };
        assert_eq!(
            engine_config(&settings).shutdown_timeout,
            Duration::from_millis(2500)
        );
    }
}
