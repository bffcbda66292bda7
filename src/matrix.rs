//! Compile, link and strip nodes across a toolchain × variant matrix.
//!
//! For every cell of the axis each translation unit gets one compile node,
//! all of the cell's objects feed one link node, and the release variant
//! alone gets a strip node splitting the binary into a stripped executable
//! and a symbol file. Objects keep the original unit order on the link line
//! because some linkers resolve symbols in argument order.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::graph::{BuildGraph, GraphError, Node, NodeId};
use crate::quote::sh_quote;

/// Variable naming the toolchain on compile and link nodes.
pub const TOOLCHAIN_VAR: &str = "compiler";
/// Variable naming the variant on compile and link nodes.
pub const VARIANT_VAR: &str = "variant";
/// Variable carrying the additional compiler flags as one shell word.
pub const FLAGS_VAR: &str = "more_cxx_flags";

/// One `(toolchain, variant)` pair of the build matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixCell {
    /// Compiler identity, e.g. `cxx` or `clang`.
    pub toolchain: String,
    /// Build configuration, e.g. `dbg` or `opt`.
    pub variant: String,
}

impl MatrixCell {
    /// Create a cell.
    #[must_use]
    pub fn new(toolchain: &str, variant: &str) -> Self {
        Self {
            toolchain: toolchain.to_owned(),
            variant: variant.to_owned(),
        }
    }
}

impl fmt::Display for MatrixCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.toolchain, self.variant)
    }
}

/// Directory conventions for generated paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Layout {
    /// Root of per-cell object directories.
    pub obj_root: Utf8PathBuf,
    /// Root of per-cell binary directories.
    pub bin_root: Utf8PathBuf,
    /// Root of metrics reports and preprocessed sources.
    pub metrics_root: Utf8PathBuf,
    /// Object file extension without the dot.
    pub obj_ext: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            obj_root: Utf8PathBuf::from("_build/obj"),
            bin_root: Utf8PathBuf::from("_bin"),
            metrics_root: Utf8PathBuf::from("_build/preprocessed"),
            obj_ext: String::from("o"),
        }
    }
}

/// File name of `unit` without its extension.
pub(crate) fn unit_stem(unit: &Utf8Path) -> &str {
    unit.file_stem().unwrap_or_else(|| unit.as_str())
}

impl Layout {
    /// `<obj-root>/<cell>/<unit-stem>.<obj-ext>`
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use inro::matrix::{Layout, MatrixCell};
    ///
    /// let layout = Layout::default();
    /// let obj = layout.object_path(&MatrixCell::new("cxx", "dbg"), Utf8Path::new("cpp/core.cc"));
    /// assert_eq!(obj, "_build/obj/cxx-dbg/core.o");
    /// ```
    #[must_use]
    pub fn object_path(&self, cell: &MatrixCell, unit: &Utf8Path) -> Utf8PathBuf {
        self.obj_root
            .join(cell.to_string())
            .join(format!("{}.{}", unit_stem(unit), self.obj_ext))
    }

    /// `<bin-root>/<cell>/<binary>`
    #[must_use]
    pub fn binary_path(&self, cell: &MatrixCell, binary: &str) -> Utf8PathBuf {
        self.bin_root.join(cell.to_string()).join(binary)
    }

    /// `<metrics-root>/<cell>.txt`
    #[must_use]
    pub fn metrics_report(&self, cell: &MatrixCell) -> Utf8PathBuf {
        self.metrics_root.join(format!("{cell}.txt"))
    }

    /// `<metrics-root>/<cell>/<unit-stem>.<unit-ext>`
    #[must_use]
    pub fn preprocessed_path(&self, cell: &MatrixCell, unit: &Utf8Path) -> Utf8PathBuf {
        let ext = unit.extension().unwrap_or("cc");
        self.metrics_root
            .join(cell.to_string())
            .join(format!("{}.{ext}", unit_stem(unit)))
    }
}

/// Rule names used by the expander.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRules {
    /// Compiles one unit to one object.
    pub compile: String,
    /// Links a cell's objects into a binary.
    pub link: String,
    /// Splits a binary into stripped executable and symbols.
    pub strip: String,
}

impl Default for MatrixRules {
    fn default() -> Self {
        Self {
            compile: String::from("compile_one"),
            link: String::from("link"),
            strip: String::from("strip"),
        }
    }
}

/// Additional compiler flags by matrix cell and by unit.
///
/// Cell flags (an explicit per-cell override, else the default) come first
/// and unit flags are appended. The combined text is bound as a single shell
/// word when the node is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagOverrides {
    default: Option<String>,
    cells: IndexMap<MatrixCell, String>,
    units: IndexMap<Utf8PathBuf, String>,
}

impl FlagOverrides {
    /// Flags for every cell without a dedicated override.
    #[must_use]
    pub fn with_default(mut self, flags: impl Into<String>) -> Self {
        self.default = Some(flags.into());
        self
    }

    /// Flags for one cell.
    #[must_use]
    pub fn with_cell(mut self, cell: MatrixCell, flags: impl Into<String>) -> Self {
        self.cells.insert(cell, flags.into());
        self
    }

    /// Flags appended for one unit in every cell.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<Utf8PathBuf>, flags: impl Into<String>) -> Self {
        self.units.insert(unit.into(), flags.into());
        self
    }

    /// Apply environment overrides: [`inro_env::CXXFLAGS_ENV`] replaces the
    /// default and the per-cell variables replace the flags of their cell.
    #[must_use]
    pub fn with_env<I>(mut self, vars: I, axis: &[MatrixCell]) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: IndexMap<String, String> = vars.into_iter().collect();
        if let Some(flags) = env.get(inro_env::CXXFLAGS_ENV) {
            debug!(flags = %flags, "default flags overridden from environment");
            self.default = Some(flags.clone());
        }
        for cell in axis {
            if let Some(flags) = env.get(&inro_env::cell_flags_var(&cell.toolchain, &cell.variant)) {
                debug!(cell = %cell, flags = %flags, "cell flags overridden from environment");
                self.cells.insert(cell.clone(), flags.clone());
            }
        }
        self
    }

    /// Flags shared by every unit of `cell`.
    #[must_use]
    pub fn cell_flags(&self, cell: &MatrixCell) -> &str {
        self.cells
            .get(cell)
            .or(self.default.as_ref())
            .map_or("", String::as_str)
    }

    /// Extra flags for `unit`.
    #[must_use]
    pub fn unit_flags(&self, unit: &Utf8Path) -> Option<&str> {
        self.units.get(unit).map(String::as_str)
    }

    /// Cells with a dedicated override, in insertion order.
    pub fn cell_overrides(&self) -> impl Iterator<Item = (&MatrixCell, &str)> {
        self.cells.iter().map(|(cell, flags)| (cell, flags.as_str()))
    }

    /// Default flags, empty when unset.
    #[must_use]
    pub fn default_flags(&self) -> &str {
        self.default.as_deref().unwrap_or("")
    }

    /// Combined flags for `unit` in `cell`, quoted as one shell word.
    #[must_use]
    pub fn shell_word(&self, cell: &MatrixCell, unit: &Utf8Path) -> String {
        let cell_flags = self.cell_flags(cell);
        match self.unit_flags(unit) {
            Some(extra) if cell_flags.is_empty() => sh_quote(extra),
            Some(extra) => sh_quote(&format!("{cell_flags} {extra}")),
            None => sh_quote(cell_flags),
        }
    }
}

/// Nodes produced for one matrix cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellOutputs {
    /// The cell expanded.
    pub cell: MatrixCell,
    /// Compile nodes in unit order.
    pub compile_nodes: Vec<NodeId>,
    /// Objects in unit order.
    pub objects: Vec<Utf8PathBuf>,
    /// The link node.
    pub link_node: NodeId,
    /// The linked binary.
    pub binary: Utf8PathBuf,
    /// Strip node with its stripped binary, for the release variant only.
    pub strip: Option<(NodeId, Utf8PathBuf)>,
}

/// Generates compile/link/strip nodes for a unit list across a matrix.
#[derive(Debug, Clone)]
pub struct MatrixExpander {
    units: Vec<Utf8PathBuf>,
    binary: String,
    layout: Layout,
    rules: MatrixRules,
    release_variant: String,
    flags: FlagOverrides,
}

impl MatrixExpander {
    /// Expand `units` into a binary called `binary`, using default layout,
    /// rules and `opt` as the release variant.
    #[must_use]
    pub fn new(units: Vec<Utf8PathBuf>, binary: &str) -> Self {
        Self {
            units,
            binary: binary.to_owned(),
            layout: Layout::default(),
            rules: MatrixRules::default(),
            release_variant: String::from("opt"),
            flags: FlagOverrides::default(),
        }
    }

    /// Use a custom directory layout.
    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Use custom rule names.
    #[must_use]
    pub fn with_rules(mut self, rules: MatrixRules) -> Self {
        self.rules = rules;
        self
    }

    /// Designate the variant that receives strip nodes.
    #[must_use]
    pub fn with_release_variant(mut self, variant: &str) -> Self {
        variant.clone_into(&mut self.release_variant);
        self
    }

    /// Use the given flag overrides.
    #[must_use]
    pub fn with_flags(mut self, flags: FlagOverrides) -> Self {
        self.flags = flags;
        self
    }

    /// Units in their canonical order.
    #[must_use]
    pub fn units(&self) -> &[Utf8PathBuf] {
        &self.units
    }

    /// Binary name.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Directory layout.
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Rule names.
    #[must_use]
    pub const fn rules(&self) -> &MatrixRules {
        &self.rules
    }

    /// The release variant.
    #[must_use]
    pub fn release_variant(&self) -> &str {
        &self.release_variant
    }

    /// Flag overrides.
    #[must_use]
    pub const fn flags(&self) -> &FlagOverrides {
        &self.flags
    }

    /// Expand every cell of `axis` in order.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateOutput`] when two units share a base
    /// name or a cell is listed twice.
    pub fn expand(
        &self,
        graph: &mut BuildGraph,
        axis: &[MatrixCell],
    ) -> Result<Vec<CellOutputs>, GraphError> {
        let expanded = axis
            .iter()
            .map(|cell| self.expand_cell(graph, cell))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            cells = expanded.len(),
            units = self.units.len(),
            "expanded build matrix"
        );
        Ok(expanded)
    }

    /// Expand a single cell.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateOutput`] when an output is already
    /// claimed.
    pub fn expand_cell(
        &self,
        graph: &mut BuildGraph,
        cell: &MatrixCell,
    ) -> Result<CellOutputs, GraphError> {
        let mut compile_nodes = Vec::with_capacity(self.units.len());
        let mut objects = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let object = self.layout.object_path(cell, unit);
            let node = Node::new(&self.rules.compile, [object.clone()])
                .inputs([unit.clone()])
                .var(TOOLCHAIN_VAR, cell.toolchain.clone())
                .var(VARIANT_VAR, cell.variant.clone())
                .var(FLAGS_VAR, self.flags.shell_word(cell, unit));
            compile_nodes.push(graph.add_node(node)?);
            objects.push(object);
        }

        let binary = self.layout.binary_path(cell, &self.binary);
        let link_node = graph.add_node(
            Node::new(&self.rules.link, [binary.clone()])
                .inputs(objects.iter().cloned())
                .var(TOOLCHAIN_VAR, cell.toolchain.clone())
                .var(VARIANT_VAR, cell.variant.clone()),
        )?;

        let strip = if cell.variant == self.release_variant {
            let stripped = with_suffix(&binary, "stripped");
            let symbols = with_suffix(&binary, "symbols");
            let id = graph.add_node(
                Node::new(&self.rules.strip, [stripped.clone(), symbols]).inputs([binary.clone()]),
            )?;
            Some((id, stripped))
        } else {
            None
        };

        debug!(cell = %cell, objects = objects.len(), stripped = strip.is_some(), "expanded cell");
        Ok(CellOutputs {
            cell: cell.clone(),
            compile_nodes,
            objects,
            link_node,
            binary,
            strip,
        })
    }
}

fn with_suffix(path: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{path}.{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cpp/core.cc", "_build/preprocessed/cxx-opt/core.cc")]
    #[case("mycpp/gc_heap.cpp", "_build/preprocessed/cxx-opt/gc_heap.cpp")]
    #[case("weird", "_build/preprocessed/cxx-opt/weird.cc")]
    fn preprocessed_path_keeps_unit_extension(#[case] unit: &str, #[case] expected: &str) {
        let layout = Layout::default();
        let path = layout.preprocessed_path(&MatrixCell::new("cxx", "opt"), Utf8Path::new(unit));
        assert_eq!(path, expected);
    }

    #[test]
    fn cell_override_wins_over_default() {
        let flags = FlagOverrides::default()
            .with_default("-O2")
            .with_cell(MatrixCell::new("clang", "asan"), "-fsanitize=address");
        assert_eq!(flags.cell_flags(&MatrixCell::new("cxx", "dbg")), "-O2");
        assert_eq!(
            flags.cell_flags(&MatrixCell::new("clang", "asan")),
            "-fsanitize=address"
        );
    }

    #[test]
    fn environment_overrides_default_and_cell() {
        let axis = [MatrixCell::new("cxx", "dbg"), MatrixCell::new("clang", "opt")];
        let vars = [
            ("INRO_CXXFLAGS".to_owned(), "-g3".to_owned()),
            ("INRO_CXXFLAGS_CLANG_OPT".to_owned(), "-O3".to_owned()),
            ("UNRELATED".to_owned(), "x".to_owned()),
        ];
        let flags = FlagOverrides::default()
            .with_default("-O0")
            .with_env(vars, &axis);
        assert_eq!(flags.cell_flags(&axis[0]), "-g3");
        assert_eq!(flags.cell_flags(&axis[1]), "-O3");
    }

    #[test]
    fn unit_flags_are_appended_in_one_word() {
        let flags = FlagOverrides::default()
            .with_default("-D A")
            .with_unit("cpp/x.cc", "-O0");
        let word = flags.shell_word(&MatrixCell::new("cxx", "dbg"), Utf8Path::new("cpp/x.cc"));
        assert!(crate::quote::splits_to(&word, &["-D A -O0"]), "{word}");
        let plain = flags.shell_word(&MatrixCell::new("cxx", "dbg"), Utf8Path::new("cpp/y.cc"));
        assert!(crate::quote::splits_to(&plain, &["-D A"]), "{plain}");
    }

    #[test]
    fn empty_flags_bind_an_empty_word() {
        let flags = FlagOverrides::default();
        let word = flags.shell_word(&MatrixCell::new("cxx", "dbg"), Utf8Path::new("a.cc"));
        assert_eq!(word, "''");
    }
}
