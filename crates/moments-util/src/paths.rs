//! Default paths for momentsd components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/moments/config.toml` or `~/.config/moments/config.toml`
//! - Data: `$XDG_DATA_HOME/moments` or `~/.local/share/moments`
//! - Widget feed: `<data dir>/moments-widgets.json`
//! - Session status: `$XDG_RUNTIME_DIR/moments/session.json` or `/tmp/moments-$USER/session.json`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const MOMENTS_CONFIG_ENV: &str = "MOMENTS_CONFIG";

/// Environment variable for overriding the data directory
pub const MOMENTS_DATA_DIR_ENV: &str = "MOMENTS_DATA_DIR";

/// Application subdirectory name
const APP_DIR: &str = "moments";

const CONFIG_FILENAME: &str = "config.toml";
const MOMENTS_FILENAME: &str = "moments.json";
const STATUS_FILENAME: &str = "session.json";
const WIDGETS_FILENAME: &str = "moments-widgets.json";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$MOMENTS_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/moments/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/moments/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(MOMENTS_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$MOMENTS_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/moments` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/moments` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(MOMENTS_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking MOMENTS_DATA_DIR env var.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Default location of the moments snapshot file
pub fn default_moments_path() -> PathBuf {
    default_data_dir().join(MOMENTS_FILENAME)
}

/// Default location of the widget feed file
pub fn default_widgets_path() -> PathBuf {
    default_data_dir().join(WIDGETS_FILENAME)
}

/// Default location of the live session status file
pub fn default_status_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(STATUS_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(STATUS_FILENAME)
}
