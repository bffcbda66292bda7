//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! handles command execution. Each stage wraps its failure in context naming
//! the stage, so the one-line error printed by `main` says where it broke.

mod error;
mod file_io;
mod path_helpers;

pub use error::RunnerError;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::path::Path;
use tracing::info;

use crate::cli::{Cli, Commands, DepsAction, DiscoveryArgs, GenAction, GenArgs};
use crate::config::ProjectConfig;
use crate::discover::{self, DependencySet, PythonHost, listing};
use crate::project::Project;
use file_io::FileMode;
use path_helpers::{project_root, resolve_config_path, resolve_output_path, utf8, with_suffix};

/// Default destination of `gen ninja`.
pub const NINJA_FILE: &str = "build.ninja";

/// Execute the parsed [`Cli`] command.
///
/// # Errors
///
/// Returns an error if discovery, configuration loading, graph construction,
/// emission or writing an output fails.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Deps { action } => handle_deps(cli, action),
        Commands::Gen(args) => handle_gen(cli, args),
    }
}

fn handle_deps(cli: &Cli, action: &DepsAction) -> Result<()> {
    match action {
        DepsAction::Both { discovery, prefix } => {
            let deps = run_discovery(cli, discovery)?;
            let dual = listing::dual(&deps);
            let base = resolve_output_path(cli, prefix);
            let interpreted = with_suffix(&base, listing::INTERPRETED_SUFFIX);
            let native = with_suffix(&base, listing::NATIVE_SUFFIX);
            file_io::write_all_atomic(
                &[
                    (interpreted.as_path(), dual.interpreted.as_str()),
                    (native.as_path(), dual.native.as_str()),
                ],
                FileMode::Regular,
            )
        }
        DepsAction::Py { discovery } => {
            let deps = run_discovery(cli, discovery)?;
            file_io::write_stdout(&listing::single(&deps)).context("write failed")
        }
    }
}

fn run_discovery(cli: &Cli, args: &DiscoveryArgs) -> Result<DependencySet> {
    let search_path = args
        .search_path
        .iter()
        .map(|dir| utf8(&resolve_output_path(cli, dir)).map(ToOwned::to_owned))
        .collect::<Result<Vec<Utf8PathBuf>, _>>()?;
    let host = PythonHost::spawn(&args.python, &search_path)
        .with_context(|| format!("discovery failed for `{}`", args.module))?;
    let deps = discover::discover(host, &args.module)
        .with_context(|| format!("discovery failed for `{}`", args.module))?;
    info!(modules = deps.len(), "discovery complete");
    Ok(deps)
}

fn handle_gen(cli: &Cli, args: &GenArgs) -> Result<()> {
    let config_path = resolve_config_path(cli, &args.file)?;
    let config = ProjectConfig::from_path(&config_path)
        .with_context(|| format!("configuration failed for {config_path}"))?;
    let root = project_root(cli)?;
    let project =
        Project::generate(config, &root, std::env::vars()).context("graph construction failed")?;

    let action = args.action();
    let (text, default_output, mode) = match action {
        GenAction::Ninja => (
            project.ninja(),
            Some(Utf8PathBuf::from(NINJA_FILE)),
            FileMode::Regular,
        ),
        GenAction::Shell => (
            project.shell_script(),
            Some(project.config().script_path()),
            FileMode::Executable,
        ),
        GenAction::TarballManifest => (project.tarball_manifest(), None, FileMode::Regular),
    };
    let rendered = text.with_context(|| format!("emission failed for {action:?}"))?;

    let requested = args
        .output
        .clone()
        .or_else(|| default_output.map(Utf8PathBuf::into_std_path_buf));
    match requested {
        Some(path) => {
            let destination = resolve_output_path(cli, &path);
            file_io::write_output(&destination, &rendered, mode)
                .with_context(|| format!("write failed for {}", destination.display()))
        }
        None => file_io::write_output(Path::new("-"), &rendered, mode).context("write failed"),
    }
}
