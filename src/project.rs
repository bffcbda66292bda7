//! One generation pass: project description in, validated graph out.
//!
//! Rules are registered first (project rules, then the built-ins), followed
//! by code-generation nodes, the matrix, metrics nodes, generated-header
//! edges and phony groups. The graph is validated once at the end and every
//! emitter reads the same [`ValidatedGraph`].

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::config::{GeneratorDecl, ProjectConfig};
use crate::discover::listing;
use crate::emit::metrics::{self, LINE_COUNT_RULE, PREPROCESS_RULE};
use crate::emit::shell::ScriptOptions;
use crate::emit::{EmitError, ninja, package, shell};
use crate::graph::{BuildGraph, GraphError, Node, Rule, ValidatedGraph};
use crate::headers::HeaderDependencyPropagator;
use crate::matrix::{CellOutputs, FlagOverrides, MatrixExpander, MatrixRules};

/// Phony group collecting the metrics reports.
pub const METRICS_GROUP: &str = "metrics";

/// Escape literal text for use inside a command template.
fn template_literal(text: &str) -> String {
    text.replace('$', "$$")
}

/// Rules every project gets, each calling a function of the `steps` script.
///
/// # Errors
///
/// Returns [`GraphError::MalformedTemplate`] if a rule fails to parse, which
/// only happens for a steps path the template escaping cannot represent.
pub fn builtin_rules(steps: &Utf8Path) -> Result<Vec<Rule>, GraphError> {
    let script = template_literal(steps.as_str());
    let rules = MatrixRules::default();
    Ok(vec![
        Rule::new(
            PREPROCESS_RULE,
            &format!("{script} compile_one $compiler $variant $more_cxx_flags $in $out"),
            "PP $compiler $variant $more_cxx_flags $in $out",
        )?,
        Rule::new(
            LINE_COUNT_RULE,
            &format!("{script} line_count $out $in"),
            "line_count $out $in",
        )?,
        Rule::new(
            &rules.compile,
            &format!("{script} compile_one $compiler $variant $more_cxx_flags $in $out $out.d"),
            "$compiler $variant $more_cxx_flags $in $out",
        )?
        .with_depfile("$out.d")?,
        Rule::new(
            &rules.link,
            &format!("{script} link $compiler $variant $out $in"),
            "LINK $compiler $variant $out $in",
        )?,
        Rule::new(
            &rules.strip,
            &format!("{script} strip_ $in $out"),
            "STRIP $in $out",
        )?,
    ])
}

/// A validated project graph plus what the emitters need besides it.
#[derive(Debug)]
pub struct Project {
    config: ProjectConfig,
    root: Utf8PathBuf,
    expander: MatrixExpander,
    headers: HeaderDependencyPropagator,
    cells: Vec<CellOutputs>,
    graph: ValidatedGraph,
}

impl Project {
    /// Build and validate the graph for `config`.
    ///
    /// `root` anchors relative listing and asset paths; `env` supplies flag
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error when a listing cannot be read or the graph violates a
    /// structural invariant.
    pub fn generate<I>(config: ProjectConfig, root: &Utf8Path, env: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut graph = BuildGraph::default();
        for (name, value) in &config.vars {
            graph.set_global(name, value.clone());
        }
        for decl in &config.rules {
            let description = decl.description.as_deref().unwrap_or(&decl.command);
            let mut rule = Rule::new(&decl.name, &decl.command, description)?;
            if let Some(depfile) = &decl.depfile {
                rule = rule.with_depfile(depfile)?;
            }
            graph.register_rule(rule)?;
        }
        for rule in builtin_rules(&config.steps)? {
            graph.register_rule(rule)?;
        }
        for generator in &config.generators {
            add_generator(&mut graph, root, generator)?;
        }

        let expander = expander_for(&config, env);
        let cells = expander.expand(&mut graph, &config.matrix)?;
        let reports = metrics::add_metrics_nodes(
            &mut graph,
            &expander,
            &config.matrix,
            &config.metrics_variants,
        )?;

        let mut headers = HeaderDependencyPropagator::default();
        for entry in &config.header_deps {
            headers.add(entry.units.iter().cloned(), entry.headers.iter().cloned());
        }
        let augmented = headers.apply(
            &mut graph,
            &[expander.rules().compile.as_str(), PREPROCESS_RULE],
        );
        debug!(augmented, "propagated generated headers");

        add_phony_groups(&mut graph, &config, &cells, reports);
        if config.defaults.is_empty() {
            graph.set_default(cells.first().map(|cell| cell.binary.clone()));
        } else {
            graph.set_default(config.defaults.iter().cloned());
        }

        let validated = graph.validate().context("graph validation failed")?;
        info!(nodes = validated.nodes().count(), "generated build graph");
        Ok(Self {
            config,
            root: root.to_owned(),
            expander,
            headers,
            cells,
            graph: validated,
        })
    }

    /// The validated graph.
    #[must_use]
    pub const fn graph(&self) -> &ValidatedGraph {
        &self.graph
    }

    /// The project description.
    #[must_use]
    pub const fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Per-cell outputs in matrix order.
    #[must_use]
    pub fn cells(&self) -> &[CellOutputs] {
        &self.cells
    }

    /// Render the Ninja descriptor.
    ///
    /// # Errors
    ///
    /// Propagates [`EmitError`].
    pub fn ninja(&self) -> Result<String, EmitError> {
        ninja::generate(&self.graph)
    }

    /// Render the standalone script.
    ///
    /// # Errors
    ///
    /// Propagates [`EmitError`].
    pub fn shell_script(&self) -> Result<String, EmitError> {
        let options = ScriptOptions {
            path: self.config.script_path(),
            steps: self.config.steps.clone(),
            toolchain: self.config.script_toolchain(),
            variant: self.config.script_variant(),
        };
        shell::generate(&self.graph, &self.expander, &options)
    }

    /// Render the packaging manifest. The steps script and the standalone
    /// script are always part of the package.
    ///
    /// # Errors
    ///
    /// Propagates [`EmitError`].
    pub fn tarball_manifest(&self) -> Result<String, EmitError> {
        let mut assets = self.config.assets.clone();
        assets.push(self.config.steps.to_string());
        assets.push(self.config.script_path().to_string());
        package::generate(
            &self.root,
            &assets,
            self.expander.units(),
            self.headers.all_headers(),
        )
    }
}

fn expander_for<I>(config: &ProjectConfig, env: I) -> MatrixExpander
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut flags = FlagOverrides::default();
    if let Some(cxx_flags) = &config.cxx_flags {
        flags = flags.with_default(cxx_flags.clone());
    }
    for (unit, unit_flags) in &config.unit_flags {
        flags = flags.with_unit(unit.clone(), unit_flags.clone());
    }
    MatrixExpander::new(config.units.clone(), &config.binary)
        .with_layout(config.layout.clone())
        .with_release_variant(&config.release_variant)
        .with_flags(flags.with_env(env, &config.matrix))
}

fn add_generator(graph: &mut BuildGraph, root: &Utf8Path, generator: &GeneratorDecl) -> Result<()> {
    let mut node = Node::new(&generator.rule, generator.outputs.iter().cloned())
        .inputs(generator.inputs.iter().cloned())
        .implicit(generator.implicit.iter().cloned());
    if let Some(listing_path) = &generator.inputs_from {
        let path = root.join(listing_path);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read dependency listing {path}"))?;
        node = node.inputs(listing::first_column(&text));
    }
    for (name, value) in &generator.vars {
        node = node.var(name, value.clone());
    }
    graph.add_node(node)?;
    Ok(())
}

fn add_phony_groups(
    graph: &mut BuildGraph,
    config: &ProjectConfig,
    cells: &[CellOutputs],
    reports: Vec<Utf8PathBuf>,
) {
    let binaries = cells.iter().map(|cell| {
        cell.strip
            .as_ref()
            .map_or_else(|| cell.binary.clone(), |(_, stripped)| stripped.clone())
    });
    graph.add_phony_member(&format!("{}-all", config.binary), binaries);
    graph.add_phony_member(METRICS_GROUP, reports);
    for (name, members) in &config.phony {
        graph.add_phony_member(name, members.iter().cloned());
    }
    let groups: Vec<String> = graph
        .seal_phony_groups()
        .into_iter()
        .filter(|name| *name != config.aggregate)
        .collect();
    graph.add_phony_member(&config.aggregate, groups);
}
