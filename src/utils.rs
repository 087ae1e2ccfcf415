use crate::errors::{Result, StashError};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Spinner shown while long-running svn queries block
pub mod spinner;

/// Atomic file operations to prevent corruption during writes
pub mod atomic_file {
    use super::*;
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use std::path::PathBuf;

    /// Write JSON data to a file atomically using a temporary file + rename strategy
    pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| StashError::config(format!("Failed to serialize data: {e}")))?;

        write_bytes(path, content.as_bytes())
    }

    /// Write binary data to a file atomically
    pub fn write_bytes(path: &Path, data: &[u8]) -> Result<()> {
        replace_with(path, |writer| {
            writer.write_all(data)?;
            Ok(())
        })
    }

    /// Stream new content for `path` into a sibling temporary file and swap it in.
    ///
    /// The target is only replaced once `write` returned `Ok` and the data was
    /// flushed. On any failure the temporary file is removed and the target is
    /// left exactly as it was.
    pub fn replace_with<F>(path: &Path, write: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        let temp_path = temp_path_for(path);

        let file = File::create(&temp_path)
            .map_err(|e| StashError::config(format!("Failed to write temporary file: {e}")))?;
        let mut writer = BufWriter::new(file);

        let outcome = write(&mut writer).and_then(|_| {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            Ok(())
        });

        match outcome {
            Ok(()) => atomic_rename(&temp_path, path),
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }

    /// Temporary sibling used while rewriting `path`
    pub fn temp_path_for(path: &Path) -> PathBuf {
        path.with_extension("tmp")
    }

    /// Platform-specific atomic rename operation
    #[cfg(windows)]
    fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
        // Windows: More robust rename with retry on failure
        const MAX_RETRIES: u32 = 3;
        const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(100);

        for attempt in 1..=MAX_RETRIES {
            match fs::rename(temp_path, final_path) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if attempt == MAX_RETRIES {
                        let _ = fs::remove_file(temp_path);
                        return Err(StashError::config(format!(
                            "Failed to finalize file write after {MAX_RETRIES} attempts on Windows: {e}"
                        )));
                    }
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        }

        unreachable!("Loop should have returned or failed by now")
    }

    #[cfg(not(windows))]
    fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
        fs::rename(temp_path, final_path).map_err(|e| {
            let _ = fs::remove_file(temp_path);
            StashError::config(format!("Failed to finalize file write: {e}"))
        })
    }
}

/// Format a byte count the way `list` shows stash sizes (e.g. `  3K`)
pub fn human_readable_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];

    let mut size = bytes as f64;
    for unit in UNITS.iter().take(UNITS.len() - 1) {
        if size < 1024.0 {
            return format!("{size:3.0}{unit}");
        }
        size /= 1024.0;
    }
    format!("{size:3.0}{}", UNITS[UNITS.len() - 1])
}

/// Normalize a relative path to forward slashes, `.` for the empty path
pub fn to_scope_string(path: &Path) -> String {
    let joined = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
