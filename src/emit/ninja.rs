//! Ninja file generator.
//!
//! This module converts a [`ValidatedGraph`] into the textual representation
//! expected by the Ninja build system. Rules, edges and phony groups are
//! written in registration order; nothing is sorted or hashed, which keeps
//! the output byte-identical across runs.

use std::fmt::{self, Display, Formatter, Write};

use camino::Utf8PathBuf;
use itertools::Itertools;
use tracing::info;

use crate::graph::{Node, Rule, ValidatedGraph};

use super::EmitError;

/// First line of every generated descriptor.
pub const HEADER: &str = "# Generated by inro. Do not edit.";

macro_rules! write_kv {
    ($f:expr, $key:expr, $opt:expr) => {
        if let Some(val) = $opt {
            writeln!($f, "  {} = {}", $key, val)?;
        }
    };
}

/// Generate a Ninja build file as a string.
///
/// # Errors
///
/// Returns [`EmitError::Format`] if writing to the buffer fails, which is not
/// expected in practice.
///
/// # Examples
///
/// ```
/// use inro::emit::ninja;
/// use inro::graph::{BuildGraph, Node, Rule};
///
/// let mut graph = BuildGraph::default();
/// graph
///     .register_rule(Rule::new("cc", "cc -c $in -o $out", "CC $out").expect("rule"))
///     .expect("register");
/// graph
///     .add_node(Node::new("cc", ["hello.o"]).inputs(["hello.c"]))
///     .expect("node");
/// let text = ninja::generate(&graph.validate().expect("valid")).expect("emit");
/// assert!(text.contains("build hello.o: cc hello.c\n"));
/// ```
pub fn generate(graph: &ValidatedGraph) -> Result<String, EmitError> {
    let mut out = String::new();
    writeln!(out, "{HEADER}")?;
    writeln!(out)?;

    let mut globals = graph.globals().peekable();
    if globals.peek().is_some() {
        for (name, value) in globals {
            writeln!(out, "{name} = {}", escape_value(value))?;
        }
        writeln!(out)?;
    }

    for rule in graph.rules() {
        write!(out, "{}", DisplayRule(rule))?;
    }

    let mut edges = 0_usize;
    for (_, node) in graph.nodes() {
        write!(out, "{}", DisplayEdge(node))?;
        edges += 1;
    }

    for (name, members) in graph.phony_groups() {
        writeln!(out, "build {}: phony {}", escape_path(name), join(members))?;
    }
    if graph.phony_groups().next().is_some() {
        writeln!(out)?;
    }

    if !graph.default_targets().is_empty() {
        writeln!(out, "default {}", join(graph.default_targets()))?;
    }

    info!(edges, bytes = out.len(), "generated Ninja descriptor");
    Ok(out)
}

/// Escape a path for use in a `build` or `default` line.
///
/// # Examples
///
/// ```
/// use inro::emit::ninja::escape_path;
///
/// assert_eq!(escape_path("a b:$c"), "a$ b$:$$c");
/// ```
#[must_use]
pub fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for ch in path.chars() {
        if matches!(ch, '$' | ' ' | ':') {
            escaped.push('$');
        }
        escaped.push(ch);
    }
    escaped
}

/// Escape a variable value so Ninja reads it literally. Values never carry
/// references of their own; placeholders live in rule templates.
///
/// # Examples
///
/// ```
/// use inro::emit::ninja::escape_value;
///
/// assert_eq!(escape_value("-DVER='$HOME' -O2"), "-DVER='$$HOME' -O2");
/// ```
#[must_use]
pub fn escape_value(value: &str) -> String {
    value.replace('$', "$$")
}

/// Convert paths into a space-separated, escaped string.
fn join<'a, I>(paths: I) -> String
where
    I: IntoIterator<Item = &'a Utf8PathBuf>,
{
    paths
        .into_iter()
        .map(|p| escape_path(p.as_str()))
        .join(" ")
}

/// Wrapper struct to display a rule block.
struct DisplayRule<'a>(&'a Rule);

impl Display for DisplayRule<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rule = self.0;
        writeln!(f, "rule {}", rule.name())?;
        writeln!(f, "  command = {}", rule.command().as_str())?;
        writeln!(f, "  description = {}", rule.description().as_str())?;
        write_kv!(f, "depfile", rule.depfile().map(|d| d.as_str()));
        writeln!(f)
    }
}

/// Wrapper struct to display a build edge.
struct DisplayEdge<'a>(&'a Node);

impl Display for DisplayEdge<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let node = self.0;
        write!(f, "build {}: {}", join(&node.outputs), node.rule)?;
        if !node.explicit_inputs.is_empty() {
            write!(f, " {}", join(&node.explicit_inputs))?;
        }
        if !node.implicit_inputs.is_empty() {
            write!(f, " | {}", join(&node.implicit_inputs))?;
        }
        if !node.order_only_inputs.is_empty() {
            write!(f, " || {}", join(&node.order_only_inputs))?;
        }
        writeln!(f)?;
        for (name, value) in &node.variables {
            writeln!(f, "  {name} = {}", escape_value(value))?;
        }
        writeln!(f)
    }
}
