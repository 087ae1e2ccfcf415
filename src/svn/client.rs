use super::history::{parse_log, RevisionEntry};
use super::{ChangeStatus, StatusEntry, VersionControl};
use crate::config::ToolSettings;
use crate::errors::{Result, StashError};
use percent_encoding::percent_decode_str;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// `VersionControl` backed by the `svn` and `svnversion` executables.
///
/// Every command runs with the working-copy root as its current directory.
pub struct SvnClient {
    root: PathBuf,
    svn: String,
    svnversion: String,
}

impl SvnClient {
    pub fn new(root: &Path, tools: &ToolSettings) -> Self {
        Self {
            root: root.to_path_buf(),
            svn: tools.svn.clone(),
            svnversion: tools.svnversion.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        debug!("Running {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| spawn_error(program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StashError::svn(format!(
                "`{} {}` failed: {}",
                program,
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(output)
    }

    fn svn(&self, args: &[&str]) -> Result<Output> {
        self.run(&self.svn, args)
    }

    /// Repository path the working copy root is checked out from, e.g. `/trunk`
    fn repository_prefix(&self) -> Result<String> {
        let output = self.svn(&["info", "--show-item", "relative-url", "."])?;
        parse_relative_url(&String::from_utf8_lossy(&output.stdout))
    }
}

fn spawn_error(program: &str, e: io::Error) -> StashError {
    if e.kind() == io::ErrorKind::NotFound {
        StashError::missing_tool(program)
    } else {
        StashError::svn(format!("could not run {program}: {e}"))
    }
}

impl VersionControl for SvnClient {
    fn status(&self, scope: &str) -> Result<Vec<StatusEntry>> {
        let output = self.svn(&["status", scope])?;
        Ok(parse_status(&String::from_utf8_lossy(&output.stdout)))
    }

    fn diff(&self, scope: &str) -> Result<Vec<u8>> {
        let output = self.svn(&[
            "diff",
            "--force",
            "--diff-cmd",
            "diff",
            "-x",
            "-au --binary",
            scope,
        ])?;
        Ok(output.stdout)
    }

    fn add(&self, path: &str) -> Result<()> {
        self.svn(&["add", "-q", "--force", "--parents", path])?;
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        self.svn(&["remove", "-q", "--force", path])?;
        Ok(())
    }

    fn revert(&self, path: &str) -> Result<()> {
        self.svn(&["revert", "-q", "--depth=infinity", path])?;
        Ok(())
    }

    fn update(&self, path: &str) -> Result<()> {
        self.svn(&["update", "-q", path])?;
        Ok(())
    }

    fn log(&self, scope: &str, from: u64, to: u64) -> Result<Vec<RevisionEntry>> {
        let prefix = self
            .repository_prefix()
            .map_err(|e| StashError::history(e.to_string()))?;
        let range = format!("{from}:{to}");
        let output = self
            .svn(&["log", "-v", "-r", &range, scope])
            .map_err(|e| match e {
                StashError::MissingExternalTool(_) => e,
                other => StashError::history(other.to_string()),
            })?;

        let entries = parse_log(&String::from_utf8_lossy(&output.stdout))?;
        Ok(entries
            .into_iter()
            .map(|entry| entry.relative_to(&prefix))
            .collect())
    }

    fn local_revision(&self, scope: &str) -> Result<u64> {
        let output = self.run(&self.svnversion, &[scope])?;
        parse_svnversion(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse `svn status` output into entries, skipping informational lines
pub fn parse_status(output: &str) -> Vec<StatusEntry> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            if line.len() < 9 || line.as_bytes()[7] != b' ' {
                return None;
            }
            let mut columns = line.chars();
            let status = match columns.next()? {
                ' ' => ChangeStatus::from_property_code(columns.next()?)?,
                code => ChangeStatus::from_code(code)?,
            };
            let path = line.get(8..)?.trim();
            if path.is_empty() {
                return None;
            }
            Some(StatusEntry::new(status, path.replace('\\', "/")))
        })
        .collect()
}

/// Parse `svnversion` output such as `4168`, `4123:4168MS` or `12P`.
///
/// For a mixed-revision working copy the lowest revision is returned.
pub fn parse_svnversion(output: &str) -> Result<u64> {
    let trimmed = output.trim().trim_end_matches(['M', 'S', 'P']);
    let lowest = trimmed.split(':').next().unwrap_or_default();

    lowest
        .parse()
        .map_err(|_| StashError::svn(format!("unexpected svnversion output: {}", output.trim())))
}

/// Turn `svn info --show-item relative-url` output such as `^/my%20project`
/// into the decoded repository path `svn log -v` reports, `/my project`.
pub fn parse_relative_url(output: &str) -> Result<String> {
    let url = output.trim();
    let encoded = url.strip_prefix('^').unwrap_or(url);
    let prefix = percent_decode_str(encoded)
        .decode_utf8()
        .map_err(|e| StashError::svn(format!("unexpected relative URL {url}: {e}")))?;

    Ok(if prefix.is_empty() { "/".to_string() } else { prefix.into_owned() })
}
