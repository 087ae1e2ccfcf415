use super::diff::{self, FILE_INDICATOR};
use crate::errors::Result;
use crate::svn::{PathTarget, RevisionHistory};
use crate::utils::atomic_file;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, info};

/// Original path -> where it lives now, built during one rebase
pub type RenameMap = BTreeMap<String, PathTarget>;

/// Paths of files deleted upstream are rewritten under this absolute prefix,
/// which `patch -p0` refuses to write to.
pub const DELETED_PATH_PREFIX: &str = "/nonexistent/svnstash-deleted/";

const PROPERTY_INDICATOR: &[u8] = b"Property changes on: ";
const OLD_FILE_INDICATOR: &[u8] = b"--- ";
const NEW_FILE_INDICATOR: &[u8] = b"+++ ";
const HUNK_INDICATOR: &[u8] = b"@@";

/// The name written into the artifact for `original` once it moved to `target`
pub fn rendered_path(original: &str, target: &PathTarget) -> String {
    match target {
        PathTarget::Moved(path) => path.clone(),
        PathTarget::Deleted => format!("{DELETED_PATH_PREFIX}{original}"),
    }
}

/// Whether `path` is the rewritten name of a file deleted upstream
pub fn is_deleted_marker(path: &str) -> bool {
    path.starts_with(DELETED_PATH_PREFIX)
}

/// Keeps a captured diff valid after the paths it names moved upstream
pub struct DiffRebaser<'a> {
    history: &'a RevisionHistory,
}

impl<'a> DiffRebaser<'a> {
    pub fn new(history: &'a RevisionHistory) -> Self {
        Self { history }
    }

    /// Resolve every path in `files` against the history.
    ///
    /// Nothing is written here, so a declined prompt leaves no trace.
    pub fn build_rename_map(
        &self,
        files: &[String],
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<RenameMap> {
        let mut renames = RenameMap::new();
        for file in files {
            if let Some(target) = self.history.resolve(file, confirm)? {
                debug!("{} -> {:?}", file, target);
                renames.insert(file.clone(), target);
            }
        }
        Ok(renames)
    }

    /// Rebase the artifact at `artifact` in place, returning the renames applied
    pub fn rebase(
        &self,
        artifact: &Path,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<RenameMap> {
        let files = diff::read_files(artifact)?;
        let renames = self.build_rename_map(&files, confirm)?;

        if renames.is_empty() {
            debug!("No path of {} moved upstream", artifact.display());
        } else {
            info!("Rewriting {} path(s) in {}", renames.len(), artifact.display());
            rewrite_artifact(artifact, &renames)?;
        }

        Ok(renames)
    }
}

/// Rewrite the artifact at `path` through a temporary file.
///
/// The original bytes stay in place until the complete rewrite succeeded.
pub fn rewrite_artifact(path: &Path, renames: &RenameMap) -> Result<()> {
    let source = File::open(path)?;
    atomic_file::replace_with(path, move |writer| {
        rewrite_into(BufReader::new(source), writer, renames)
    })
}

/// Copy a diff from `reader` to `writer`, substituting renamed paths.
///
/// Only header lines are touched: `Index:` and `Property changes on:` lines,
/// plus the `---`/`+++` lines between a section's `Index:` line and its first
/// hunk. Hunk bodies are copied verbatim.
pub fn rewrite_into<R, W>(mut reader: R, writer: &mut W, renames: &RenameMap) -> Result<()>
where
    R: BufRead,
    W: Write + ?Sized,
{
    let mut active: Option<String> = None;
    let mut in_header = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let (content, eol) = split_line_ending(&buf);

        if let Some(name) = diff::header_path(content, FILE_INDICATOR) {
            active = renames.get(&name).map(|target| rendered_path(&name, target));
            in_header = true;
            match &active {
                Some(new_name) => write_header(writer, FILE_INDICATOR, new_name, b"", eol)?,
                None => writer.write_all(&buf)?,
            }
        } else if let Some(name) = diff::header_path(content, PROPERTY_INDICATOR) {
            in_header = false;
            match renames.get(&name) {
                Some(target) => {
                    let new_name = rendered_path(&name, target);
                    write_header(writer, PROPERTY_INDICATOR, &new_name, b"", eol)?
                }
                None => writer.write_all(&buf)?,
            }
        } else if in_header && is_file_line(content) {
            match &active {
                Some(new_name) => {
                    let label = content
                        .iter()
                        .position(|&b| b == b'\t')
                        .map(|tab| &content[tab..])
                        .unwrap_or(b"");
                    write_header(writer, &content[..4], new_name, label, eol)?
                }
                None => writer.write_all(&buf)?,
            }
        } else {
            if content.starts_with(HUNK_INDICATOR) {
                in_header = false;
            }
            writer.write_all(&buf)?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn is_file_line(content: &[u8]) -> bool {
    content.starts_with(OLD_FILE_INDICATOR) || content.starts_with(NEW_FILE_INDICATOR)
}

fn split_line_ending(line: &[u8]) -> (&[u8], &[u8]) {
    if let Some(content) = line.strip_suffix(b"\r\n") {
        (content, b"\r\n")
    } else if let Some(content) = line.strip_suffix(b"\n") {
        (content, b"\n")
    } else {
        (line, b"")
    }
}

fn write_header<W: Write + ?Sized>(
    writer: &mut W,
    prefix: &[u8],
    path: &str,
    label: &[u8],
    eol: &[u8],
) -> Result<()> {
    writer.write_all(prefix)?;
    writer.write_all(path.as_bytes())?;
    writer.write_all(label)?;
    writer.write_all(eol)?;
    Ok(())
}
