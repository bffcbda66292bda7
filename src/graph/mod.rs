//! Build graph: rules, nodes, phony groups and default targets.
//!
//! The graph mirrors the incremental-build descriptor without embedding its
//! syntax. It is assembled once per generation run by independent builders,
//! then consumed by [`BuildGraph::validate`], which checks every structural
//! invariant and hands back a read-only [`ValidatedGraph`] for emission.
//!
//! Output uniqueness is enforced eagerly in [`BuildGraph::add_node`]. Rule
//! references, placeholder bindings, phony members and acyclicity are checked
//! only during validation so that rules registered later in the same pass
//! still resolve.
//!
//! # Examples
//!
//! ```
//! use inro::graph::{BuildGraph, Node, Rule};
//!
//! let mut graph = BuildGraph::default();
//! graph
//!     .register_rule(Rule::new("cc", "cc -c $in -o $out", "CC $out").expect("rule"))
//!     .expect("register");
//! graph
//!     .add_node(Node::new("cc", ["hello.o"]).inputs(["hello.c"]))
//!     .expect("add node");
//! graph.set_default(["hello.o"]);
//! let graph = graph.validate().expect("valid graph");
//! assert_eq!(graph.nodes().count(), 1);
//! ```

mod cycle;
mod error;
mod rules;
mod template;

use std::collections::HashMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::phony::PhonyAggregator;

pub use error::GraphError;
pub use rules::{Rule, RuleRegistry};
pub use template::{BUILTIN_PLACEHOLDERS, Template, TemplateError, UnboundPlaceholder};

/// Index of a node in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in registration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One build action: a rule applied to inputs, producing outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Produced paths; the first is the primary output.
    pub outputs: Vec<Utf8PathBuf>,
    /// Name of the rule executed for this node.
    pub rule: String,
    /// Inputs substituted for `$in`, in order.
    pub explicit_inputs: Vec<Utf8PathBuf>,
    /// Inputs that trigger rebuilds without appearing in `$in`.
    pub implicit_inputs: IndexSet<Utf8PathBuf>,
    /// Inputs that must exist first but never trigger rebuilds.
    pub order_only_inputs: IndexSet<Utf8PathBuf>,
    /// Per-node variable bindings.
    pub variables: IndexMap<String, String>,
}

impl Node {
    /// Start a node for `rule` producing `outputs`.
    pub fn new<I, P>(rule: &str, outputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        Self {
            outputs: outputs.into_iter().map(Into::into).collect(),
            rule: rule.to_owned(),
            explicit_inputs: Vec::new(),
            implicit_inputs: IndexSet::new(),
            order_only_inputs: IndexSet::new(),
            variables: IndexMap::new(),
        }
    }

    /// Append explicit inputs, preserving their order.
    #[must_use]
    pub fn inputs<I, P>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.explicit_inputs
            .extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Add implicit inputs.
    #[must_use]
    pub fn implicit<I, P>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.implicit_inputs
            .extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Add order-only inputs.
    #[must_use]
    pub fn order_only<I, P>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.order_only_inputs
            .extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Bind a variable for this node.
    #[must_use]
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.variables.insert(name.to_owned(), value.into());
        self
    }

    /// The first output.
    #[must_use]
    pub fn primary_output(&self) -> Option<&Utf8Path> {
        self.outputs.first().map(Utf8PathBuf::as_path)
    }

    fn display_name(&self) -> Utf8PathBuf {
        self.primary_output()
            .map_or_else(Utf8PathBuf::new, Utf8Path::to_owned)
    }

    fn all_inputs(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.explicit_inputs
            .iter()
            .chain(&self.implicit_inputs)
            .chain(&self.order_only_inputs)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.primary_output() {
            Some(output) => write!(f, "`{}` node producing {output}", self.rule),
            None => write!(f, "`{}` node", self.rule),
        }
    }
}

/// Mutable graph under construction.
#[derive(Debug, Default)]
pub struct BuildGraph {
    rules: RuleRegistry,
    globals: IndexMap<String, String>,
    nodes: Vec<Node>,
    producers: HashMap<Utf8PathBuf, NodeId>,
    phony: PhonyAggregator,
    default_targets: Vec<Utf8PathBuf>,
}

impl BuildGraph {
    /// Register a rule.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::RuleConflict`] when the name is taken by a rule
    /// with different templates.
    pub fn register_rule(&mut self, rule: Rule) -> Result<(), GraphError> {
        if self.rules.register(rule)? {
            debug!(rules = self.rules.len(), "registered rule");
        }
        Ok(())
    }

    /// Declare a global default binding available to every node.
    pub fn set_global(&mut self, name: &str, value: impl Into<String>) {
        self.globals.insert(name.to_owned(), value.into());
    }

    /// Add a node, claiming its outputs.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NoOutputs`] for a node without outputs and
    /// [`GraphError::DuplicateOutput`] when any output is already produced by
    /// another node (or listed twice on this one).
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if node.outputs.is_empty() {
            return Err(GraphError::NoOutputs {
                rule: node.rule.clone(),
            });
        }
        let id = NodeId(self.nodes.len());
        let mut claimed = IndexSet::new();
        for output in &node.outputs {
            if let Some(existing) = self.producers.get(output) {
                let first = self
                    .nodes
                    .get(existing.0)
                    .map_or_else(String::new, ToString::to_string);
                return Err(GraphError::DuplicateOutput {
                    output: output.clone(),
                    first,
                    second: node.to_string(),
                });
            }
            if !claimed.insert(output) {
                return Err(GraphError::DuplicateOutput {
                    output: output.clone(),
                    first: node.to_string(),
                    second: node.to_string(),
                });
            }
        }
        for output in &node.outputs {
            self.producers.insert(output.clone(), id);
        }
        debug!(node = %node, "added build node");
        self.nodes.push(node);
        Ok(id)
    }

    /// Union `paths` into the implicit inputs of node `id`.
    pub(crate) fn extend_implicit_inputs<'p, I>(&mut self, id: NodeId, paths: I)
    where
        I: IntoIterator<Item = &'p Utf8PathBuf>,
    {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.implicit_inputs.extend(paths.into_iter().cloned());
        }
    }

    /// Merge members into phony group `name`.
    pub fn add_phony_member<I, P>(&mut self, name: &str, members: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.phony.add_members(name, members);
    }

    /// Declare a phony group that may stay empty.
    pub fn declare_phony(&mut self, name: &str) {
        self.phony.declare(name);
    }

    /// Drop empty phony groups and return the names of the remaining ones.
    pub fn seal_phony_groups(&mut self) -> Vec<String> {
        self.phony.seal()
    }

    /// Append to the default target list.
    pub fn set_default<I, P>(&mut self, outputs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.default_targets
            .extend(outputs.into_iter().map(Into::into));
    }

    /// Nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(idx, node)| (NodeId(idx), node))
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Node producing `path`, if any.
    #[must_use]
    pub fn producer_of(&self, path: &Utf8Path) -> Option<NodeId> {
        self.producers.get(path).copied()
    }

    /// Check every invariant and freeze the graph.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphError`] found: unknown rule references,
    /// unbound placeholders, multi-line variable values, phony groups that
    /// collide with outputs or reference unknown members, and cycles.
    pub fn validate(mut self) -> Result<ValidatedGraph, GraphError> {
        self.phony.seal();
        self.check_globals()?;
        self.check_nodes()?;
        self.check_phony_groups()?;
        self.check_acyclic()?;
        debug!(
            rules = self.rules.len(),
            nodes = self.nodes.len(),
            "graph validated"
        );
        Ok(ValidatedGraph { graph: self })
    }

    fn check_globals(&self) -> Result<(), GraphError> {
        match self.globals.iter().find(|(_, value)| has_line_break(value)) {
            Some((name, _)) => Err(GraphError::InvalidVariable {
                output: Utf8PathBuf::from("<global>"),
                name: name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn check_nodes(&self) -> Result<(), GraphError> {
        for node in &self.nodes {
            let rule = self
                .rules
                .get(&node.rule)
                .ok_or_else(|| GraphError::UnknownRule {
                    output: node.display_name(),
                    rule: node.rule.clone(),
                })?;
            for name in rule.placeholders() {
                let bound = BUILTIN_PLACEHOLDERS.contains(&name)
                    || node.variables.contains_key(name)
                    || self.globals.contains_key(name);
                if !bound {
                    return Err(GraphError::UnboundPlaceholder {
                        output: node.display_name(),
                        rule: node.rule.clone(),
                        name: name.to_owned(),
                    });
                }
            }
            if let Some((name, _)) = node.variables.iter().find(|(_, v)| has_line_break(v)) {
                return Err(GraphError::InvalidVariable {
                    output: node.display_name(),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_phony_groups(&self) -> Result<(), GraphError> {
        for (name, members) in self.phony.groups() {
            if self.producers.contains_key(Utf8Path::new(name)) {
                return Err(GraphError::PhonyOutputCollision {
                    name: name.to_owned(),
                });
            }
            for member in members {
                if !self.producers.contains_key(member) && !self.phony.contains(member) {
                    return Err(GraphError::DanglingPhonyMember {
                        group: name.to_owned(),
                        member: member.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_acyclic(&self) -> Result<(), GraphError> {
        let mut edges: cycle::Adjacency<'_> = IndexMap::new();
        for node in &self.nodes {
            let deps: Vec<&Utf8Path> = node.all_inputs().map(Utf8PathBuf::as_path).collect();
            for output in &node.outputs {
                edges.insert(output.as_path(), deps.clone());
            }
        }
        for (name, members) in self.phony.groups() {
            edges.insert(
                Utf8Path::new(name),
                members.iter().map(Utf8PathBuf::as_path).collect(),
            );
        }
        match cycle::find_cycle(&edges) {
            Some(cycle) => Err(GraphError::CircularDependency { cycle }),
            None => Ok(()),
        }
    }
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\n', '\r'])
}

/// A graph that passed validation. Read-only from here on.
#[derive(Debug)]
pub struct ValidatedGraph {
    graph: BuildGraph,
}

impl ValidatedGraph {
    /// Registered rules in registration order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.graph.rules.iter()
    }

    /// Look up a rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.graph.rules.get(name)
    }

    /// Global default bindings in declaration order.
    pub fn globals(&self) -> impl Iterator<Item = (&str, &str)> {
        self.graph
            .globals
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Look up a global default binding.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&str> {
        self.graph.globals.get(name).map(String::as_str)
    }

    /// Nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.graph.nodes()
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node(id)
    }

    /// Node producing `path`, if any.
    #[must_use]
    pub fn producer_of(&self, path: &Utf8Path) -> Option<NodeId> {
        self.graph.producer_of(path)
    }

    /// Non-empty phony groups in declaration order.
    pub fn phony_groups(&self) -> impl Iterator<Item = (&str, &IndexSet<Utf8PathBuf>)> {
        self.graph.phony.groups()
    }

    /// Default targets in the order they were set.
    #[must_use]
    pub fn default_targets(&self) -> &[Utf8PathBuf] {
        &self.graph.default_targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn graph() -> BuildGraph {
        let mut graph = BuildGraph::default();
        graph
            .register_rule(
                Rule::new("cc", "cc $flags -c $in -o $out", "CC $out").expect("rule"),
            )
            .expect("register");
        graph
    }

    #[rstest]
    fn duplicate_output_names_both_nodes(mut graph: BuildGraph) {
        graph
            .add_node(Node::new("cc", ["a.o"]).inputs(["a.c"]))
            .expect("first");
        let err = graph
            .add_node(Node::new("cc", ["a.o"]).inputs(["other/a.c"]))
            .expect_err("duplicate");
        let message = err.to_string();
        assert!(message.contains("a.o"), "{message}");
        assert!(matches!(err, GraphError::DuplicateOutput { .. }));
    }

    #[rstest]
    fn output_listed_twice_on_one_node_is_rejected(mut graph: BuildGraph) {
        let err = graph
            .add_node(Node::new("cc", ["a.o", "a.o"]))
            .expect_err("duplicate");
        assert!(matches!(err, GraphError::DuplicateOutput { .. }));
    }

    #[rstest]
    fn rule_registered_after_node_still_resolves(mut graph: BuildGraph) {
        graph
            .add_node(Node::new("link", ["app"]).inputs(["a.o"]))
            .expect("node");
        graph
            .register_rule(Rule::new("link", "ld -o $out $in", "LINK $out").expect("rule"))
            .expect("register");
        assert!(graph.validate().is_ok());
    }

    #[rstest]
    fn global_default_binds_placeholder(mut graph: BuildGraph) {
        graph
            .add_node(Node::new("cc", ["a.o"]).inputs(["a.c"]))
            .expect("node");
        graph.set_global("flags", "-O2");
        assert!(graph.validate().is_ok());
    }

    #[rstest]
    fn multi_line_variable_is_rejected(mut graph: BuildGraph) {
        graph
            .add_node(Node::new("cc", ["a.o"]).var("flags", "-O2\n-g"))
            .expect("node");
        let err = graph.validate().expect_err("invalid");
        assert!(matches!(err, GraphError::InvalidVariable { ref name, .. } if name == "flags"));
    }

    #[rstest]
    fn phony_group_may_not_shadow_an_output(mut graph: BuildGraph) {
        graph
            .add_node(Node::new("cc", ["a.o"]).var("flags", ""))
            .expect("node");
        graph.add_phony_member("a.o", ["a.o"]);
        let err = graph.validate().expect_err("collision");
        assert!(matches!(err, GraphError::PhonyOutputCollision { .. }));
    }

    #[rstest]
    fn cycle_through_phony_group_is_detected(mut graph: BuildGraph) {
        graph
            .add_node(Node::new("cc", ["a.o"]).var("flags", "").order_only(["objs"]))
            .expect("node");
        graph.add_phony_member("objs", ["a.o"]);
        let err = graph.validate().expect_err("cycle");
        assert!(matches!(err, GraphError::CircularDependency { .. }));
    }
}
