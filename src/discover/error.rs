//! Errors raised while discovering runtime dependencies.

use std::io;
use std::process::ExitStatus;

use miette::Diagnostic;
use thiserror::Error;

/// Failures of a discovery run. None are retried: a partially loaded closure
/// cannot yield a trustworthy dependency set.
#[derive(Debug, Error, Diagnostic)]
pub enum DiscoveryError {
    /// Importing the entry point raised.
    #[error("failed to import `{entry}` with search path [{search_path}]: {message}")]
    #[diagnostic(code(inro::discover::import_failed))]
    ImportFailed {
        /// Entry-point module that was imported.
        entry: String,
        /// Search path in effect, comma separated.
        search_path: String,
        /// Exception raised by the import.
        message: String,
    },

    /// The interpreter could not be started.
    #[error("failed to start interpreter `{program}`")]
    #[diagnostic(
        code(inro::discover::spawn),
        help("set INRO_PYTHON or pass --python to choose another interpreter")
    )]
    Spawn {
        /// Interpreter program.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Talking to the interpreter failed.
    #[error("lost contact with the discovery probe")]
    #[diagnostic(code(inro::discover::io))]
    Io(#[from] io::Error),

    /// The probe printed something other than a snapshot.
    #[error("malformed probe output: {line}")]
    #[diagnostic(code(inro::discover::protocol))]
    Protocol {
        /// Offending line.
        line: String,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The probe exited before reporting.
    #[error("discovery probe exited early ({status})")]
    #[diagnostic(code(inro::discover::probe_exited))]
    ProbeExited {
        /// Exit status of the interpreter.
        status: ExitStatus,
    },
}
