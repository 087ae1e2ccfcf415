use crate::cli::output::Output;
use crate::cli::ConfigAction;
use crate::config::{ensure_config_dir, get_config_dir, get_config_file, Settings};
use crate::errors::Result;
use std::path::Path;

/// Handle configuration commands
pub fn run(action: ConfigAction) -> Result<()> {
    let config_file = get_config_file()?;

    match action {
        ConfigAction::Set { key, value } => {
            ensure_config_dir(&get_config_dir()?)?;
            set_config_value(&config_file, &key, &value)
        }
        ConfigAction::Get { key } => get_config_value(&config_file, &key),
        ConfigAction::List => list_config_values(&config_file),
    }
}

fn set_config_value(config_file: &Path, key: &str, value: &str) -> Result<()> {
    let mut settings = Settings::load_from_file(config_file)?;
    settings.set_value(key, value)?;
    settings.save_to_file(config_file)?;

    Output::success(format!("Configuration updated: {key} = {value}"));
    Ok(())
}

fn get_config_value(config_file: &Path, key: &str) -> Result<()> {
    let settings = Settings::load_from_file(config_file)?;
    println!("{key} = {}", settings.get_value(key)?);
    Ok(())
}

fn list_config_values(config_file: &Path) -> Result<()> {
    let settings = Settings::load_from_file(config_file)?;

    Output::section(format!("svnstash configuration ({})", config_file.display()));
    for (key, value) in settings.entries() {
        Output::sub_item(format!("{key} = {value}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_set_get() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.json");

        set_config_value(&config_file, "tools.patch", "gpatch").unwrap();
        get_config_value(&config_file, "tools.patch").unwrap();

        let settings = Settings::load_from_file(&config_file).unwrap();
        assert_eq!(settings.tools.patch, "gpatch");
    }

    #[test]
    fn test_config_rejects_unknown_key() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.json");

        assert!(set_config_value(&config_file, "stash.nonsense", "1").is_err());
        assert!(!config_file.exists());
    }

    #[test]
    fn test_config_list_without_file() {
        let temp_dir = TempDir::new().unwrap();
        list_config_values(&temp_dir.path().join("config.json")).unwrap();
    }
}
