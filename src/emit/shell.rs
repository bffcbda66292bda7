//! Standalone build script.
//!
//! The script compiles, links and (for the release variant) strips one
//! matrix cell chosen at run time, without an external graph executor. Each
//! step is the registered rule's command template rendered with shell
//! expressions in place of the placeholders, so the script and the descriptor
//! never drift apart.

use std::borrow::Cow;
use std::fmt::Write;

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use tracing::{debug, info};

use crate::graph::{Rule, ValidatedGraph};
use crate::matrix::{FLAGS_VAR, MatrixExpander, TOOLCHAIN_VAR, VARIANT_VAR, unit_stem};
use crate::quote::{dq_escape, sh_quote, sh_word};

use super::EmitError;

/// Run-time settings baked into the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOptions {
    /// Where the script will be written; named in its header.
    pub path: Utf8PathBuf,
    /// Helper script sourced before `main` runs.
    pub steps: Utf8PathBuf,
    /// Toolchain used when the caller passes none.
    pub toolchain: String,
    /// Variant used when the caller passes none.
    pub variant: String,
}

/// Render the standalone build script.
///
/// # Errors
///
/// Returns [`EmitError::MissingRule`] when the compile, link or strip rule is
/// absent, [`EmitError::UnboundPlaceholder`] for a template placeholder with
/// no shell value, and [`EmitError::InvalidCommand`] when a rendered command
/// is not valid shell.
pub fn generate(
    graph: &ValidatedGraph,
    expander: &MatrixExpander,
    options: &ScriptOptions,
) -> Result<String, EmitError> {
    let rules = expander.rules();
    let steps = StepRenderer {
        graph,
        steps: &options.steps,
    };
    let compile = steps.rule(&rules.compile)?;
    let link = steps.rule(&rules.link)?;
    let strip = steps.rule(&rules.strip)?;
    let layout = expander.layout();
    let obj_dir = format!("{}/$compiler-$variant-sh", dq_escape(layout.obj_root.as_str()));
    let bin_dir = format!("{}/$compiler-$variant-sh", dq_escape(layout.bin_root.as_str()));

    let mut out = String::new();
    write_header(&mut out, options)?;
    write_flags(&mut out, expander)?;

    writeln!(out, "  local out=\"{bin_dir}/{}\"", dq_escape(expander.binary()))?;
    writeln!(out)?;
    writeln!(out, "  if test -n \"$skip_rebuild\" && test -f \"$out\"; then")?;
    writeln!(out, "    echo \"$0: skipping build because $out exists\"")?;
    writeln!(out, "    return")?;
    writeln!(out, "  fi")?;
    writeln!(out)?;
    writeln!(out, "  echo \"$0: building $out\"")?;
    writeln!(out, "  mkdir -p \"{obj_dir}\" \"{bin_dir}\"")?;
    writeln!(out)?;

    let mut objects = Vec::with_capacity(expander.units().len());
    for unit in expander.units() {
        let unit_arg = sh_word(unit.as_str());
        let object = format!(
            "\"{obj_dir}/{}\"",
            dq_escape(&format!("{}.{}", unit_stem(unit), layout.obj_ext))
        );
        let flags = flags_expr(expander, unit);
        let compile_step = steps.render(compile, |name| match name {
            "in" | "in_newline" => Some(Cow::Borrowed(unit_arg.as_str())),
            "out" => Some(Cow::Borrowed(object.as_str())),
            FLAGS_VAR => Some(Cow::Borrowed(flags.as_str())),
            _ => None,
        })?;
        writeln!(out, "  echo {}", sh_quote(&format!("CXX {unit}")))?;
        writeln!(out, "  {compile_step}")?;
        objects.push(object);
    }
    writeln!(out)?;

    let object_list = objects.iter().join(" ");
    let link_step = steps.render(link, |name| match name {
        "in" | "in_newline" => Some(Cow::Borrowed(object_list.as_str())),
        "out" => Some(Cow::Borrowed("\"$out\"")),
        _ => None,
    })?;
    writeln!(out, "  echo \"LINK $out\"")?;
    writeln!(out, "  {link_step}")?;
    writeln!(out)?;

    let strip_step = steps.render(strip, |name| match name {
        "in" | "in_newline" => Some(Cow::Borrowed("\"$out\"")),
        "out" => Some(Cow::Borrowed("\"$out.stripped\" \"$out.symbols\"")),
        _ => None,
    })?;
    writeln!(
        out,
        "  if test \"$variant\" = {}; then",
        sh_word(expander.release_variant())
    )?;
    writeln!(out, "    echo \"STRIP $out\"")?;
    writeln!(out, "    {strip_step}")?;
    writeln!(out, "  fi")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "main \"$@\"")?;

    info!(
        units = expander.units().len(),
        bytes = out.len(),
        "generated standalone script"
    );
    Ok(out)
}

fn write_header(out: &mut String, options: &ScriptOptions) -> Result<(), EmitError> {
    let path = &options.path;
    writeln!(out, "#!/usr/bin/env bash")?;
    writeln!(out, "#")?;
    writeln!(out, "# {path} - generated by inro. Do not edit.")?;
    writeln!(out, "#")?;
    writeln!(out, "# Usage")?;
    writeln!(out, "#   {path} TOOLCHAIN? VARIANT? SKIP_REBUILD?")?;
    writeln!(out, "#")?;
    writeln!(out, "#   TOOLCHAIN: compiler identity [default {}]", options.toolchain)?;
    writeln!(out, "#   VARIANT: build variant [default {}]", options.variant)?;
    writeln!(out, "#   SKIP_REBUILD: if non-empty, skip the build when the output exists")?;
    writeln!(out)?;
    writeln!(out, "set -o errexit -o nounset -o pipefail")?;
    writeln!(out)?;
    writeln!(out, ". {}", sh_word(options.steps.as_str()))?;
    writeln!(out)?;
    writeln!(out, "main() {{")?;
    writeln!(out, "  local compiler=${{1:-{}}}", sh_word(&options.toolchain))?;
    writeln!(out, "  local variant=${{2:-{}}}", sh_word(&options.variant))?;
    writeln!(out, "  local skip_rebuild=${{3:-}}")?;
    writeln!(out)?;
    Ok(())
}

fn write_flags(out: &mut String, expander: &MatrixExpander) -> Result<(), EmitError> {
    let flags = expander.flags();
    writeln!(out, "  local cxx_flags={}", sh_quote(flags.default_flags()))?;
    let mut overrides = flags.cell_overrides().peekable();
    if overrides.peek().is_some() {
        writeln!(out, "  case \"$compiler-$variant\" in")?;
        for (cell, cell_flags) in overrides {
            writeln!(
                out,
                "    {}) cxx_flags={} ;;",
                sh_quote(&cell.to_string()),
                sh_quote(cell_flags)
            )?;
        }
        writeln!(out, "  esac")?;
    }
    writeln!(out)?;
    Ok(())
}

/// Shell expression for the flags of `unit`: the cell flags chosen at run
/// time followed by any per-unit flags, as one word.
fn flags_expr(expander: &MatrixExpander, unit: &Utf8Path) -> String {
    match expander.flags().unit_flags(unit) {
        Some(extra) => format!("\"$cxx_flags\"{}", sh_quote(&format!(" {extra}"))),
        None => String::from("\"$cxx_flags\""),
    }
}

struct StepRenderer<'g> {
    graph: &'g ValidatedGraph,
    steps: &'g Utf8Path,
}

impl<'g> StepRenderer<'g> {
    fn rule(&self, name: &str) -> Result<&'g Rule, EmitError> {
        self.graph.rule(name).ok_or_else(|| EmitError::MissingRule {
            rule: name.to_owned(),
        })
    }

    /// Render `rule`'s command with `paths` resolving node-specific
    /// placeholders and the cell variables bound to the script arguments.
    ///
    /// A leading invocation of the steps script becomes a direct call to the
    /// sourced function.
    fn render<'a, F>(&self, rule: &Rule, paths: F) -> Result<String, EmitError>
    where
        F: Fn(&str) -> Option<Cow<'a, str>>,
    {
        let rendered = rule
            .command()
            .render(|name| {
                paths(name).or_else(|| match name {
                    TOOLCHAIN_VAR => Some(Cow::Borrowed("\"$compiler\"")),
                    VARIANT_VAR => Some(Cow::Borrowed("\"$variant\"")),
                    _ => self
                        .graph
                        .global(name)
                        .map(|value| Cow::Owned(value.to_owned())),
                })
            })
            .map_err(|err| EmitError::UnboundPlaceholder {
                rule: rule.name().to_owned(),
                name: err.name,
            })?;
        let command = rendered
            .strip_prefix(self.steps.as_str())
            .and_then(|rest| rest.strip_prefix(' '))
            .map_or(rendered.as_str(), str::trim_start)
            .to_owned();
        if shlex::split(&command).is_none() {
            return Err(EmitError::InvalidCommand {
                rule: rule.name().to_owned(),
                command,
            });
        }
        debug!(rule = rule.name(), command = %command, "rendered script step");
        Ok(command)
    }
}
