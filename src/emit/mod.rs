//! Serialisers for a validated build graph.
//!
//! Every emitter reads the same [`ValidatedGraph`](crate::graph::ValidatedGraph)
//! and walks it in registration order, so repeated runs over identical input
//! produce byte-identical text. Emitters only build strings; writing them to
//! disk is the runner's job.

pub mod metrics;
pub mod ninja;
pub mod package;
pub mod shell;

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while serialising a graph.
#[derive(Debug, Error, Diagnostic)]
pub enum EmitError {
    /// Formatting into the output buffer failed.
    #[error("failed to format output")]
    #[diagnostic(code(inro::emit::format))]
    Format(#[from] std::fmt::Error),

    /// A rule the emitter depends on is not registered.
    #[error("rule `{rule}` is not registered")]
    #[diagnostic(code(inro::emit::missing_rule))]
    MissingRule {
        /// Missing rule name.
        rule: String,
    },

    /// A placeholder has no shell rendering.
    #[error("rule `{rule}` references `${name}`, which has no value in the standalone script")]
    #[diagnostic(code(inro::emit::unbound_placeholder))]
    UnboundPlaceholder {
        /// Rule being rendered.
        rule: String,
        /// Placeholder name.
        name: String,
    },

    /// A rendered command does not parse as shell words.
    #[error("rule `{rule}` renders to an unparsable shell command: {command}")]
    #[diagnostic(code(inro::emit::invalid_command))]
    InvalidCommand {
        /// Rule being rendered.
        rule: String,
        /// Rendered command line.
        command: String,
    },

    /// An asset glob pattern is malformed.
    #[error("invalid asset pattern `{pattern}`")]
    #[diagnostic(code(inro::emit::asset_pattern))]
    AssetPattern {
        /// Offending pattern.
        pattern: String,
        /// Underlying glob error.
        #[source]
        source: glob::PatternError,
    },

    /// An asset glob matched a path that could not be read.
    #[error("failed to expand asset pattern `{pattern}`")]
    #[diagnostic(code(inro::emit::asset_glob))]
    AssetGlob {
        /// Pattern being expanded.
        pattern: String,
        /// Underlying glob error.
        #[source]
        source: glob::GlobError,
    },

    /// An asset path is not valid UTF-8.
    #[error("asset path `{path}` is not valid UTF-8")]
    #[diagnostic(code(inro::emit::asset_utf8))]
    NonUtf8Asset {
        /// Lossy rendering of the path.
        path: String,
    },
}
