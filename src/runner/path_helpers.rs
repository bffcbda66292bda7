//! Path resolution helpers for the runner module.
//!
//! The `-C/--directory` option behaves like a working directory change for
//! every filesystem path supplied on the command line or read from the
//! project description.

use camino::{Utf8Path, Utf8PathBuf};
use std::borrow::Cow;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::RunnerError;
use crate::cli::Cli;

/// Resolve `path` against the CLI working directory. Absolute paths and the
/// stdout sentinel are returned unchanged.
#[must_use]
pub(super) fn resolve_output_path<'a>(cli: &Cli, path: &'a Path) -> Cow<'a, Path> {
    if path.is_relative() && !super::file_io::is_stdout_path(path) {
        cli.directory
            .as_ref()
            .map_or_else(|| Cow::Borrowed(path), |dir| Cow::Owned(dir.join(path)))
    } else {
        Cow::Borrowed(path)
    }
}

/// Convert a command-line path to UTF-8.
pub(super) fn utf8(path: &Path) -> Result<&Utf8Path, RunnerError> {
    Utf8Path::from_path(path).ok_or_else(|| RunnerError::NonUtf8Path {
        path: path.to_path_buf(),
    })
}

/// Base directory for paths in the project description.
pub(super) fn project_root(cli: &Cli) -> Result<Utf8PathBuf, RunnerError> {
    cli.directory
        .as_deref()
        .map_or_else(|| Ok(Utf8PathBuf::from(".")), |dir| utf8(dir).map(Utf8Path::to_owned))
}

/// Locate the project description, failing early when it is missing.
pub(super) fn resolve_config_path(cli: &Cli, file: &Path) -> Result<Utf8PathBuf, RunnerError> {
    let resolved = utf8(&resolve_output_path(cli, file))?.to_owned();
    if resolved.as_std_path().is_file() {
        Ok(resolved)
    } else {
        Err(RunnerError::ConfigNotFound {
            path: resolved.into_std_path_buf(),
        })
    }
}

/// Append `suffix` to the final component of `prefix`.
#[must_use]
pub(super) fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse cli")
    }

    #[rstest]
    #[case(&["inro", "gen"], "build.ninja", "build.ninja")]
    #[case(&["inro", "-C", "work", "gen"], "build.ninja", "work/build.ninja")]
    #[case(&["inro", "-C", "work", "gen"], "/abs/build.ninja", "/abs/build.ninja")]
    #[case(&["inro", "-C", "work", "gen"], "-", "-")]
    fn output_paths_follow_directory(
        #[case] argv: &[&str],
        #[case] path: &str,
        #[case] expected: &str,
    ) {
        let resolved = resolve_output_path(&cli(argv), Path::new(path));
        assert_eq!(resolved.as_ref(), Path::new(expected));
    }

    #[test]
    fn listing_suffix_extends_the_file_name() {
        assert_eq!(
            with_suffix(Path::new("out/deps"), "-py.txt"),
            PathBuf::from("out/deps-py.txt")
        );
    }

    #[test]
    fn missing_description_is_reported_with_its_path() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dir = temp.path().to_str().expect("utf-8 temp dir");
        let err = resolve_config_path(&cli(&["inro", "-C", dir, "gen"]), Path::new("inro.yml"))
            .expect_err("missing file");
        assert!(matches!(err, RunnerError::ConfigNotFound { .. }));
        assert!(err.to_string().contains("inro.yml"));
    }
}
