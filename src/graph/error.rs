//! Structural errors raised while building or validating a graph.

use camino::Utf8PathBuf;
use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

use super::template::TemplateError;

fn format_cycle(cycle: &[Utf8PathBuf]) -> String {
    cycle.iter().join(" -> ")
}

/// Errors raised by [`BuildGraph`](super::BuildGraph) construction and
/// validation. Every variant is fatal for the current generation run.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// A rule was declared with an empty name.
    #[error("rule name must not be empty")]
    #[diagnostic(code(inro::graph::empty_rule_name))]
    EmptyRuleName,

    /// A rule template could not be parsed.
    #[error("rule `{rule}` has a malformed template `{template}`: {source}")]
    #[diagnostic(code(inro::graph::malformed_template))]
    MalformedTemplate {
        /// Rule owning the template.
        rule: String,
        /// Offending template text.
        template: String,
        /// Underlying parse error.
        source: TemplateError,
    },

    /// A rule name was re-registered with different templates.
    #[error("rule `{name}` is already registered with a different template")]
    #[diagnostic(code(inro::graph::rule_conflict))]
    RuleConflict {
        /// Conflicting rule name.
        name: String,
    },

    /// A node declared no outputs.
    #[error("a `{rule}` node declares no outputs")]
    #[diagnostic(code(inro::graph::no_outputs))]
    NoOutputs {
        /// Rule referenced by the node.
        rule: String,
    },

    /// Two nodes claim the same output path.
    #[error("output `{output}` is produced by both {first} and {second}")]
    #[diagnostic(
        code(inro::graph::duplicate_output),
        help("every output path must be produced by exactly one build node")
    )]
    DuplicateOutput {
        /// Path claimed twice.
        output: Utf8PathBuf,
        /// Description of the node registered first.
        first: String,
        /// Description of the node that attempted to claim it again.
        second: String,
    },

    /// A node references a rule that was never registered.
    #[error("output `{output}` references unknown rule `{rule}`")]
    #[diagnostic(code(inro::graph::unknown_rule))]
    UnknownRule {
        /// Primary output of the node.
        output: Utf8PathBuf,
        /// Missing rule name.
        rule: String,
    },

    /// A rule placeholder has no binding on a node using it.
    #[error("output `{output}` leaves placeholder `{name}` of rule `{rule}` unbound")]
    #[diagnostic(
        code(inro::graph::unbound_placeholder),
        help("bind the variable on the node or declare a global default")
    )]
    UnboundPlaceholder {
        /// Primary output of the node.
        output: Utf8PathBuf,
        /// Rule declaring the placeholder.
        rule: String,
        /// Placeholder name.
        name: String,
    },

    /// A variable value cannot be represented on a single descriptor line.
    #[error("variable `{name}` on `{output}` contains a line break")]
    #[diagnostic(code(inro::graph::invalid_variable))]
    InvalidVariable {
        /// Primary output of the node, or `<global>`.
        output: Utf8PathBuf,
        /// Variable name.
        name: String,
    },

    /// A phony group shares its name with a node output.
    #[error("phony group `{name}` collides with a build output of the same name")]
    #[diagnostic(code(inro::graph::phony_collision))]
    PhonyOutputCollision {
        /// Group name.
        name: String,
    },

    /// A phony group member is neither an output nor another group.
    #[error("phony group `{group}` references `{member}`, which no node or group provides")]
    #[diagnostic(code(inro::graph::dangling_phony_member))]
    DanglingPhonyMember {
        /// Group name.
        group: String,
        /// Unresolved member.
        member: Utf8PathBuf,
    },

    /// The declared edges form a cycle.
    #[error("circular dependency detected: {}", format_cycle(.cycle))]
    #[diagnostic(code(inro::graph::cycle))]
    CircularDependency {
        /// Paths along the cycle; the first path is repeated at the end.
        cycle: Vec<Utf8PathBuf>,
    },
}
