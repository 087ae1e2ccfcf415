use crate::errors::{Result, StashError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tools: ToolSettings,
    pub stash: StashSettings,
}

/// Executables svnstash shells out to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub svn: String,
    pub svnversion: String,
    pub patch: String,
}

/// Behaviour of save/apply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StashSettings {
    /// Run `svn update` on the scope before applying a stash
    pub update_before_apply: bool,
    /// Revision gap at which a rebase warns that it may take a while
    pub large_range_warning: u64,
    /// Colorize `show` output
    pub color: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            svn: "svn".to_string(),
            svnversion: "svnversion".to_string(),
            patch: "patch".to_string(),
        }
    }
}

impl Default for StashSettings {
    fn default() -> Self {
        Self {
            update_before_apply: true,
            large_range_warning: 25,
            color: true,
        }
    }
}

impl Settings {
    const KEYS: [&'static str; 6] = [
        "tools.svn",
        "tools.svnversion",
        "tools.patch",
        "stash.update_before_apply",
        "stash.large_range_warning",
        "stash.color",
    ];

    /// Load settings from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| StashError::config(format!("Failed to read config file: {e}")))?;

        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| StashError::config(format!("Failed to parse config file: {e}")))?;

        Ok(settings)
    }

    /// Save settings to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| StashError::config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)
            .map_err(|e| StashError::config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Update a configuration value by key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 2 {
            return Err(StashError::config(format!("Invalid config key format: {key}")));
        }

        match (parts[0], parts[1]) {
            ("tools", "svn") => self.tools.svn = non_empty(value)?,
            ("tools", "svnversion") => self.tools.svnversion = non_empty(value)?,
            ("tools", "patch") => self.tools.patch = non_empty(value)?,
            ("stash", "update_before_apply") => {
                self.stash.update_before_apply = value
                    .parse()
                    .map_err(|_| StashError::config(format!("Invalid boolean value: {value}")))?;
            }
            ("stash", "large_range_warning") => {
                self.stash.large_range_warning = value
                    .parse()
                    .map_err(|_| StashError::config(format!("Invalid number: {value}")))?;
            }
            ("stash", "color") => {
                self.stash.color = value
                    .parse()
                    .map_err(|_| StashError::config(format!("Invalid boolean value: {value}")))?;
            }
            _ => return Err(StashError::config(format!("Unknown config key: {key}"))),
        }

        Ok(())
    }

    /// Get a configuration value by key
    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 2 {
            return Err(StashError::config(format!("Invalid config key format: {key}")));
        }

        let value = match (parts[0], parts[1]) {
            ("tools", "svn") => self.tools.svn.clone(),
            ("tools", "svnversion") => self.tools.svnversion.clone(),
            ("tools", "patch") => self.tools.patch.clone(),
            ("stash", "update_before_apply") => self.stash.update_before_apply.to_string(),
            ("stash", "large_range_warning") => self.stash.large_range_warning.to_string(),
            ("stash", "color") => self.stash.color.to_string(),
            _ => return Err(StashError::config(format!("Unknown config key: {key}"))),
        };

        Ok(value)
    }

    /// All keys with their current values, in a stable order
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        Self::KEYS
            .iter()
            .filter_map(|key| self.get_value(key).ok().map(|value| (*key, value)))
            .collect()
    }
}

fn non_empty(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StashError::config("Tool path cannot be empty"));
    }
    Ok(trimmed.to_string())
}
