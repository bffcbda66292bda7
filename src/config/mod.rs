//! Project description loaded from `inro.yml`.
//!
//! The description names the translation units, the build matrix, extra
//! rules and code generators, and the packaging assets. It is plain data;
//! [`crate::project`] turns it into a build graph.
//!
//! # Examples
//!
//! ```
//! use inro::config::ProjectConfig;
//!
//! let yaml = r#"
//! inro_version: 1.0.0
//! binary: app
//! matrix:
//!   - { toolchain: cxx, variant: dbg }
//!   - { toolchain: cxx, variant: opt }
//! units: [cpp/a.cc, cpp/b.cc]
//! "#;
//! let config = ProjectConfig::from_str_named(yaml, "inro.yml").expect("valid config");
//! assert_eq!(config.release_variant, "opt");
//! assert_eq!(config.script_path(), "_build/app.sh");
//! ```

// The unused_assignments lint fires on miette/thiserror derive expansions in
// some Rust versions but not others, so `#[expect]` cannot be used here.
// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

mod yaml;

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use semver::Version;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::matrix::{Layout, MatrixCell};

/// Default project description file name.
pub const DEFAULT_CONFIG: &str = "inro.yml";

/// Major version of the description format this build understands.
pub const SUPPORTED_MAJOR: u64 = 1;

/// Errors raised while loading a project description.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}")]
    #[diagnostic(code(inro::config::read))]
    Read {
        /// Path that was read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML did not match the expected shape.
    #[error("failed to parse project description")]
    #[diagnostic(code(inro::config::parse))]
    Parse {
        /// Diagnostic with the offending span.
        #[source]
        #[diagnostic_source]
        source: Box<dyn Diagnostic + Send + Sync + 'static>,
    },

    /// The declared format version is not supported.
    #[error("unsupported inro_version {found}; expected 1.x")]
    #[diagnostic(code(inro::config::version))]
    UnsupportedVersion {
        /// Declared version.
        found: Version,
    },

    /// A required list is empty.
    #[error("`{key}` must not be empty")]
    #[diagnostic(code(inro::config::empty))]
    Empty {
        /// Offending key.
        key: &'static str,
    },

    /// A translation unit is listed twice.
    #[error("unit {unit} is listed more than once")]
    #[diagnostic(code(inro::config::duplicate_unit))]
    DuplicateUnit {
        /// Repeated unit.
        unit: Utf8PathBuf,
    },

    /// Per-unit flags name a unit that is not listed.
    #[error("unit_flags names {unit}, which is not in `units`")]
    #[diagnostic(code(inro::config::unknown_unit))]
    UnknownUnit {
        /// Unlisted unit.
        unit: Utf8PathBuf,
    },

    /// The release variant does not appear in the matrix.
    #[error("release variant `{variant}` does not appear in the matrix")]
    #[diagnostic(
        code(inro::config::release_variant),
        help("no strip node would be generated; add a matrix cell or change release_variant")
    )]
    UnknownReleaseVariant {
        /// Configured release variant.
        variant: String,
    },
}

/// Extra rule declared by the project, typically for a code generator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDecl {
    /// Rule name.
    pub name: String,
    /// Command template.
    pub command: String,
    /// Description template; defaults to the command.
    #[serde(default)]
    pub description: Option<String>,
    /// Depfile template.
    #[serde(default)]
    pub depfile: Option<String>,
}

/// A code-generation node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorDecl {
    /// Rule to run.
    pub rule: String,
    /// Produced files.
    pub outputs: Vec<Utf8PathBuf>,
    /// Explicit inputs.
    #[serde(default)]
    pub inputs: Vec<Utf8PathBuf>,
    /// Dependency listing whose first column is appended to the inputs.
    #[serde(default)]
    pub inputs_from: Option<Utf8PathBuf>,
    /// Implicit inputs.
    #[serde(default)]
    pub implicit: Vec<Utf8PathBuf>,
    /// Node variables.
    #[serde(default)]
    pub vars: IndexMap<String, String>,
}

/// Units that need generated headers before their first compilation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderDeps {
    /// Translation units.
    pub units: Vec<Utf8PathBuf>,
    /// Generated headers each unit requires.
    pub headers: Vec<Utf8PathBuf>,
}

/// Standalone script settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptSettings {
    /// Output path; defaults to `_build/<binary>.sh`.
    pub path: Option<Utf8PathBuf>,
    /// Default toolchain; defaults to the first matrix cell's.
    pub toolchain: Option<String>,
    /// Default variant; defaults to the release variant.
    pub variant: Option<String>,
}

fn default_steps() -> Utf8PathBuf {
    Utf8PathBuf::from("build/ninja-rules-cpp.sh")
}

fn default_release_variant() -> String {
    String::from("opt")
}

fn default_metrics_variants() -> Vec<String> {
    vec![String::from("dbg"), String::from("opt")]
}

fn default_aggregate() -> String {
    String::from("all")
}

/// The parsed project description.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Description format version.
    pub inro_version: Version,
    /// Name of the linked binary.
    pub binary: String,
    /// Helper script the built-in rules call.
    #[serde(default = "default_steps")]
    pub steps: Utf8PathBuf,
    /// Directory conventions.
    #[serde(default)]
    pub layout: Layout,
    /// Toolchain × variant cells.
    pub matrix: Vec<MatrixCell>,
    /// Variant that receives strip nodes.
    #[serde(default = "default_release_variant")]
    pub release_variant: String,
    /// Variants that get metrics nodes.
    #[serde(default = "default_metrics_variants")]
    pub metrics_variants: Vec<String>,
    /// Additional flags for every cell.
    #[serde(default)]
    pub cxx_flags: Option<String>,
    /// Additional flags for single units.
    #[serde(default)]
    pub unit_flags: IndexMap<Utf8PathBuf, String>,
    /// Translation units in link order.
    pub units: Vec<Utf8PathBuf>,
    /// Generated-header requirements.
    #[serde(default)]
    pub header_deps: Vec<HeaderDeps>,
    /// Extra rules.
    #[serde(default)]
    pub rules: Vec<RuleDecl>,
    /// Code-generation nodes.
    #[serde(default)]
    pub generators: Vec<GeneratorDecl>,
    /// Global variable defaults.
    #[serde(default)]
    pub vars: IndexMap<String, String>,
    /// Extra phony groups.
    #[serde(default)]
    pub phony: IndexMap<String, Vec<Utf8PathBuf>>,
    /// Static packaging paths and glob patterns.
    #[serde(default)]
    pub assets: Vec<String>,
    /// Default targets.
    #[serde(default)]
    pub defaults: Vec<Utf8PathBuf>,
    /// Standalone script settings.
    #[serde(default)]
    pub script: ScriptSettings,
    /// Umbrella phony group name.
    #[serde(default = "default_aggregate")]
    pub aggregate: String,
}

impl ProjectConfig {
    /// Parse and check a description; `name` labels diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML or unknown keys and
    /// the other [`ConfigError`] variants for semantic problems.
    pub fn from_str_named(yaml: &str, name: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_saphyr::from_str(yaml).map_err(|err| ConfigError::Parse {
            source: yaml::map_yaml_error(err, yaml, name),
        })?;
        config.check()?;
        debug!(
            name,
            units = config.units.len(),
            cells = config.matrix.len(),
            "loaded project description"
        );
        Ok(config)
    }

    /// Read and parse the description at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// as [`ProjectConfig::from_str_named`].
    pub fn from_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_str_named(&yaml, path.as_str())
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.inro_version.major != SUPPORTED_MAJOR {
            return Err(ConfigError::UnsupportedVersion {
                found: self.inro_version.clone(),
            });
        }
        if self.binary.is_empty() {
            return Err(ConfigError::Empty { key: "binary" });
        }
        if self.matrix.is_empty() {
            return Err(ConfigError::Empty { key: "matrix" });
        }
        if self.units.is_empty() {
            return Err(ConfigError::Empty { key: "units" });
        }
        let mut seen = IndexSet::new();
        for unit in &self.units {
            if !seen.insert(unit) {
                return Err(ConfigError::DuplicateUnit { unit: unit.clone() });
            }
        }
        if let Some(unit) = self.unit_flags.keys().find(|u| !seen.contains(u)) {
            return Err(ConfigError::UnknownUnit { unit: unit.clone() });
        }
        if !self
            .matrix
            .iter()
            .any(|cell| cell.variant == self.release_variant)
        {
            return Err(ConfigError::UnknownReleaseVariant {
                variant: self.release_variant.clone(),
            });
        }
        Ok(())
    }

    /// The first matrix cell.
    #[must_use]
    pub fn first_cell(&self) -> Option<&MatrixCell> {
        self.matrix.first()
    }

    /// Where the standalone script is written.
    #[must_use]
    pub fn script_path(&self) -> Utf8PathBuf {
        self.script
            .path
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(format!("_build/{}.sh", self.binary)))
    }

    /// Toolchain the standalone script uses by default.
    #[must_use]
    pub fn script_toolchain(&self) -> String {
        self.script
            .toolchain
            .clone()
            .or_else(|| self.first_cell().map(|cell| cell.toolchain.clone()))
            .unwrap_or_default()
    }

    /// Variant the standalone script uses by default.
    #[must_use]
    pub fn script_variant(&self) -> String {
        self.script
            .variant
            .clone()
            .unwrap_or_else(|| self.release_variant.clone())
    }
}
