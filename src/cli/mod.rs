//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and its subcommands. It is also
//! included by the build script to render the manual page, so it must not
//! depend on the rest of the crate.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Default project description file.
const DEFAULT_FILE: &str = "inro.yml";

/// Default interpreter used for dependency discovery.
const DEFAULT_PYTHON: &str = "python3";

/// Runtime dependency discovery and matrix build-graph generation.
#[derive(Debug, Parser, PartialEq, Eq, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR", global = true)]
    pub directory: Option<PathBuf>,

    /// Enable verbose logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Discover the modules an entry point loads.
    Deps {
        /// Listing format to produce.
        #[command(subcommand)]
        action: DepsAction,
    },

    /// Generate build artefacts from the project description.
    Gen(GenArgs),
}

/// Interpreter options shared by the discovery commands.
#[derive(Debug, Args, PartialEq, Eq, Clone)]
pub struct DiscoveryArgs {
    /// Qualified name of the entry module to import.
    #[arg(value_name = "MODULE")]
    pub module: String,

    /// Interpreter used to import the entry module.
    #[arg(long, value_name = "PROGRAM", env = "INRO_PYTHON", default_value = DEFAULT_PYTHON)]
    pub python: String,

    /// Extra module search directory; may be repeated.
    #[arg(long = "search-path", value_name = "DIR")]
    pub search_path: Vec<PathBuf>,
}

/// Discovery listing modes.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum DepsAction {
    /// Write `<PREFIX>-py.txt` and `<PREFIX>-c.txt` listings.
    Both {
        /// Discovery options.
        #[command(flatten)]
        discovery: DiscoveryArgs,

        /// Path prefix of the two listing files.
        #[arg(value_name = "PREFIX")]
        prefix: PathBuf,
    },

    /// Print source and bytecode pairs of interpreted modules to stdout.
    Py {
        /// Discovery options.
        #[command(flatten)]
        discovery: DiscoveryArgs,
    },
}

/// Arguments accepted by the `gen` command.
#[derive(Debug, Args, PartialEq, Eq, Clone)]
pub struct GenArgs {
    /// Artefact to generate; defaults to the Ninja descriptor.
    #[command(subcommand)]
    pub action: Option<GenAction>,

    /// Path to the project description.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_FILE, global = true)]
    pub file: PathBuf,

    /// Output path; `-` writes to stdout.
    #[arg(short, long, value_name = "OUT", global = true)]
    pub output: Option<PathBuf>,
}

impl GenArgs {
    /// The requested action, falling back to the Ninja descriptor.
    #[must_use]
    pub const fn action(&self) -> GenAction {
        match self.action {
            Some(action) => action,
            None => GenAction::Ninja,
        }
    }
}

/// Artefacts `gen` can produce.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone, Copy)]
pub enum GenAction {
    /// Ninja build descriptor, written to `build.ninja` by default.
    Ninja,
    /// Standalone build script, written to the configured script path.
    Shell,
    /// Packaging manifest, printed to stdout by default.
    TarballManifest,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["inro", "gen"], None)]
    #[case(&["inro", "gen", "shell"], Some(GenAction::Shell))]
    #[case(&["inro", "gen", "tarball-manifest", "-o", "-"], Some(GenAction::TarballManifest))]
    fn parses_gen_actions(#[case] argv: &[&str], #[case] expected: Option<GenAction>) {
        let cli = Cli::try_parse_from(argv).expect("parse");
        let Commands::Gen(args) = cli.command else {
            panic!("expected gen command");
        };
        assert_eq!(args.action, expected);
        assert_eq!(args.file, PathBuf::from(DEFAULT_FILE));
    }

    #[test]
    fn parses_dual_discovery() {
        let cli = Cli::try_parse_from([
            "inro",
            "-C",
            "work",
            "deps",
            "both",
            "app.main",
            "out/deps",
            "--search-path",
            "src",
            "--search-path",
            "lib",
        ])
        .expect("parse");
        assert_eq!(cli.directory, Some(PathBuf::from("work")));
        let Commands::Deps {
            action: DepsAction::Both { discovery, prefix },
        } = cli.command
        else {
            panic!("expected deps both");
        };
        assert_eq!(discovery.module, "app.main");
        assert_eq!(prefix, PathBuf::from("out/deps"));
        assert_eq!(discovery.search_path, [PathBuf::from("src"), PathBuf::from("lib")]);
    }

    #[test]
    fn interpreter_defaults_match_shared_names() {
        assert_eq!(DEFAULT_PYTHON, inro_env::DEFAULT_PYTHON);
        let command = Cli::command();
        let deps = command.find_subcommand("deps").expect("deps command");
        let py = deps.find_subcommand("py").expect("py action");
        let python = py
            .get_arguments()
            .find(|arg| arg.get_id() == "python")
            .expect("python flag");
        assert_eq!(
            python.get_env().and_then(|name| name.to_str()),
            Some(inro_env::PYTHON_ENV)
        );
    }

    #[test]
    fn unknown_gen_action_is_rejected() {
        let err = Cli::try_parse_from(["inro", "gen", "bogus"]).expect_err("usage error");
        assert!(err.to_string().contains("bogus"));
    }
}
