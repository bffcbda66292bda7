//! Error types for the runner module.
//!
//! This submodule isolates derive-macro-affected code to scope lint
//! suppressions narrowly.

// The unused_assignments lint fires on miette/thiserror derive expansions in
// some Rust versions but not others, so `#[expect]` cannot be used here.
// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised during command execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// The project description does not exist at the expected path.
    #[error("project description {} not found", path.display())]
    #[diagnostic(
        code(inro::runner::config_not_found),
        help("create inro.yml or pass -f/--file; -C/--directory changes the base directory")
    )]
    ConfigNotFound {
        /// The path that was attempted.
        path: PathBuf,
    },

    /// A path given on the command line is not valid UTF-8.
    #[error("path {} is not valid UTF-8", path.display())]
    #[diagnostic(code(inro::runner::non_utf8_path))]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },
}
