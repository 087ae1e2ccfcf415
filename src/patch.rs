use crate::errors::{Result, StashError};
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Applies a diff artifact to the working copy.
///
/// Application is best effort: hunks that do not apply are left for the
/// operator as `.rej` / `.orig` files, and only a failure to run the tool at
/// all is reported as an error.
pub trait PatchTool {
    /// Whether the tool can be run
    fn is_available(&self) -> bool;

    /// Apply `artifact` with `root` as the current directory
    fn apply(&self, root: &Path, artifact: &Path) -> Result<()>;

    /// Name used in diagnostics
    fn name(&self) -> &str;
}

/// GNU `patch` run with `-p0` against the working-copy root
pub struct GnuPatch {
    program: String,
}

impl GnuPatch {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PatchTool for GnuPatch {
    fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    fn apply(&self, root: &Path, artifact: &Path) -> Result<()> {
        debug!("Applying {} with {}", artifact.display(), self.program);

        let output = Command::new(&self.program)
            .args(["--forward", "-p0", "--binary", "--batch", "-s", "-i"])
            .arg(artifact)
            .current_dir(root)
            .output()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    StashError::missing_tool(self.program.clone())
                } else {
                    StashError::Io(e)
                }
            })?;

        if !output.status.success() {
            debug!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stdout).trim()
            );
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}
