//! Platform-specific paths for the settings file.
//!
//! - Linux: `~/.config/tonegen/settings.toml`
//! - macOS: `~/Library/Application Support/tonegen/settings.toml`
//! - Windows: `%APPDATA%\tonegen\settings.toml`

use std::path::PathBuf;

/// Application name used for directory paths.
const APP_NAME: &str = "tonegen";

/// Settings file name inside the config directory.
const SETTINGS_FILE: &str = "settings.toml";

/// Returns the user-specific configuration directory.
///
/// Falls back to the current directory if the platform config directory
/// cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the path of the default settings file.
pub fn default_settings_path() -> PathBuf {
    user_config_dir().join(SETTINGS_FILE)
}

/// Ensure the user config directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_user_config_dir() -> Result<PathBuf, crate::ConfigError> {
    let dir = user_config_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::ConfigError::create_dir(&dir, e))?;
    }

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_path_is_inside_config_dir() {
        let path = default_settings_path();
        assert!(path.starts_with(user_config_dir()));
        assert!(path.ends_with("tonegen/settings.toml"));
    }
}
