pub mod settings;

pub use settings::{Settings, StashSettings, ToolSettings};

use crate::errors::{Result, StashError};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the svnstash configuration directory (~/.svnstash/)
pub fn get_config_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| StashError::config("Could not find home directory"))?;
    Ok(home_dir.join(".svnstash"))
}

/// Path of the user settings file
pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        fs::create_dir_all(config_dir).map_err(|e| {
            StashError::config(format!("Failed to create config directory: {e}"))
        })?;
    }
    Ok(())
}

/// Load user settings, falling back to defaults when no file exists
pub fn load_settings() -> Result<Settings> {
    Settings::load_from_file(&get_config_file()?)
}
