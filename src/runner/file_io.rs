//! Output helpers: atomic file replacement and stdout.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::Path;
use tempfile::{Builder, NamedTempFile};
use tracing::info;

/// Permission class of a written file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FileMode {
    /// Ordinary readable file.
    Regular,
    /// Script the user runs directly.
    Executable,
}

#[cfg_attr(
    not(unix),
    expect(
        unused_variables,
        unused_mut,
        reason = "permission bits are only applied on Unix"
    )
)]
fn temp_builder(mode: FileMode) -> Builder<'static, 'static> {
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let bits = match mode {
            FileMode::Regular => 0o644,
            FileMode::Executable => 0o755,
        };
        builder.permissions(std::fs::Permissions::from_mode(bits));
    }
    builder
}

/// Return `true` when `path` is the CLI sentinel indicating "write to stdout".
#[must_use]
pub(super) fn is_stdout_path(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// A fully written temporary file waiting to replace its destination.
pub(super) struct Staged<'a> {
    tmp: NamedTempFile,
    path: &'a Path,
}

impl Staged<'_> {
    /// Rename the staged file over its destination.
    pub(super) fn commit(self) -> Result<()> {
        self.tmp
            .persist(self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        info!("Wrote {}", self.path.display());
        Ok(())
    }
}

/// Write `content` to a synced temporary file next to `path` without
/// touching `path` itself. Dropping the result discards the file.
pub(super) fn stage<'a>(path: &'a Path, content: &str, mode: FileMode) -> Result<Staged<'a>> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create directory {}", parent.display()))?;
    let mut tmp = temp_builder(mode)
        .tempfile_in(parent)
        .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
    {
        let handle = tmp.as_file_mut();
        handle
            .write_all(content.as_bytes())
            .with_context(|| format!("failed to write temporary file for {}", path.display()))?;
        handle.flush().context("failed to flush temporary file")?;
        handle.sync_all().context("failed to sync temporary file")?;
    }
    Ok(Staged { tmp, path })
}

/// Replace `path` with `content`.
///
/// The text goes to a temporary file in the destination directory, which is
/// flushed, synced and renamed over `path`, so readers never observe a
/// partially written file.
pub(super) fn write_atomic(path: &Path, content: &str, mode: FileMode) -> Result<()> {
    stage(path, content, mode)?.commit()
}

/// Replace several files. Every file is staged before the first rename, so a
/// failure while writing leaves all destinations untouched.
pub(super) fn write_all_atomic(outputs: &[(&Path, &str)], mode: FileMode) -> Result<()> {
    let staged = outputs
        .iter()
        .map(|(path, content)| {
            stage(path, content, mode)
                .with_context(|| format!("write failed for {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    for file in staged {
        let path = file.path;
        file.commit()
            .with_context(|| format!("write failed for {}", path.display()))?;
    }
    Ok(())
}

fn is_broken_pipe(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}

fn ignoring_broken_pipe(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if is_broken_pipe(&err) => Ok(()),
        other => other,
    }
}

/// Write `content` to stdout. A closed pipe is not an error.
pub(super) fn write_stdout(content: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    ignoring_broken_pipe(stdout.write_all(content.as_bytes()))
        .context("failed to write to stdout")?;
    ignoring_broken_pipe(stdout.flush()).context("failed to flush stdout")?;
    Ok(())
}

/// Write to stdout for `-`, otherwise replace the file atomically.
pub(super) fn write_output(path: &Path, content: &str, mode: FileMode) -> Result<()> {
    if is_stdout_path(path) {
        write_stdout(content)
    } else {
        write_atomic(path, content, mode)
    }
}
