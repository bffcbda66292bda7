//! Test utilities for process management.
//!
//! Discovery talks to an interpreter over a line protocol: one snapshot line
//! on start-up, then the entry name on stdin, then a second line. The helpers
//! here create fake interpreters that replay canned lines, so integration
//! tests run without Python installed.

pub mod project;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Make a script file executable on Unix platforms.
#[cfg(unix)]
fn make_script_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .with_context(|| format!("read metadata {}", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
        .with_context(|| format!("set permissions {}", path.display()))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_script_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// One snapshot line mapping module names to their files; `None` marks a
/// builtin module.
pub fn snapshot_line(modules: &[(&str, Option<&str>)]) -> String {
    let map: serde_json::Map<String, serde_json::Value> = modules
        .iter()
        .map(|(name, file)| {
            let value = file.map_or(serde_json::Value::Null, |f| {
                serde_json::Value::String(f.to_owned())
            });
            ((*name).to_owned(), value)
        })
        .collect();
    serde_json::json!({ "modules": map }).to_string()
}

/// The line the probe prints when importing the entry point raised.
pub fn failure_line(error: &str, sys_path: &[&str]) -> String {
    serde_json::json!({ "error": error, "sys_path": sys_path }).to_string()
}

/// Quote `line` as a single POSIX shell word.
fn sh_single_quoted(line: &str) -> String {
    format!("'{}'", line.replace('\'', r"'\''"))
}

/// Create a fake interpreter that prints `baseline`, consumes one line from
/// stdin and prints `after`. The entry name it received is appended to
/// `entry.log` next to the script, and the probe environment to `env.log`.
///
/// Returns the temporary directory and the path to the executable.
pub fn fake_python(baseline: &str, after: &str) -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new().context("fake_python: create temp dir")?;
    let path = dir.path().join("python");
    let entry_log = dir.path().join("entry.log");
    let env_log = dir.path().join("env.log");
    let script = format!(
        concat!(
            "#!/bin/sh\n",
            "printf '%s\\n' {baseline}\n",
            "read -r entry\n",
            "printf '%s\\n' \"$entry\" >> {entry_log}\n",
            "printf '%s %s\\n' \"${{{probe}:-}}\" \"${{PYTHONPATH:-}}\" >> {env_log}\n",
            "printf '%s\\n' {after}\n",
        ),
        baseline = sh_single_quoted(baseline),
        after = sh_single_quoted(after),
        entry_log = sh_single_quoted(&entry_log.display().to_string()),
        env_log = sh_single_quoted(&env_log.display().to_string()),
        probe = inro_env::DEPS_PROBE_ENV,
    );
    fs::write(&path, script).with_context(|| format!("fake_python: write {}", path.display()))?;
    make_script_executable(&path)?;
    Ok((dir, path))
}

/// Create a fake interpreter that exits with `exit_code` before reporting.
pub fn fake_python_exiting(exit_code: i32) -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new().context("fake_python_exiting: create temp dir")?;
    let path = dir.path().join("python");
    fs::write(&path, format!("#!/bin/sh\nexit {exit_code}\n"))
        .with_context(|| format!("fake_python_exiting: write {}", path.display()))?;
    make_script_executable(&path)?;
    Ok((dir, path))
}
