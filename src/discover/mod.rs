//! Runtime dependency discovery by module-registry diffing.
//!
//! Instead of parsing sources, discovery lets the runtime's own loader import
//! an entry point and compares the loaded-module registry before and after.
//! Everything that appeared is a dependency. The only side effect lives in
//! [`ModuleHost::import_entry`]; the diff itself is the pure
//! [`DependencySet::from_diff`].
//!
//! # Examples
//!
//! ```
//! use camino::Utf8Path;
//! use inro::discover::{DependencySet, ModuleKind, ModuleSnapshot};
//!
//! let before: ModuleSnapshot = [("sys", None::<&str>)].into_iter().collect();
//! let after: ModuleSnapshot = [
//!     ("sys", None),
//!     ("app.util", Some("/src/app/util.py")),
//!     ("_speedups", Some("/src/_speedups.so")),
//! ]
//! .into_iter()
//! .collect();
//!
//! let deps = DependencySet::from_diff(&before, &after);
//! let util = deps.get("app.util").expect("interpreted module");
//! assert_eq!(util.kind, ModuleKind::Interpreted);
//! assert_eq!(util.relative_path.as_deref(), Some(Utf8Path::new("app/util.py")));
//! let native = deps.get("_speedups").expect("native module");
//! assert_eq!(native.kind, ModuleKind::Native);
//! assert!(native.relative_path.is_none());
//! ```

mod error;
mod host;
pub mod listing;
mod snapshot;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

pub use error::DiscoveryError;
pub use host::{ModuleHost, PythonHost};
pub use snapshot::ModuleSnapshot;

/// File name of a package initialiser.
const PACKAGE_INIT: &str = "__init__";

/// Suffixes of loadable native extensions.
const NATIVE_SUFFIXES: [&str; 4] = ["so", "pyd", "dylib", "dll"];

/// How a discovered module is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Source module executed by the interpreter.
    Interpreted,
    /// Compiled extension loaded from a shared library.
    Native,
}

/// One discovered dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Dotted module name.
    pub qualified_name: String,
    /// Absolute path of the backing file. Cached bytecode is resolved back to
    /// its source path.
    pub absolute_path: Utf8PathBuf,
    /// Loading mechanism.
    pub kind: ModuleKind,
    /// Path relative to the project root, for interpreted modules only.
    pub relative_path: Option<Utf8PathBuf>,
}

impl Module {
    /// Classify a loaded module by its backing file, or `None` when the
    /// suffix is not recognised.
    #[must_use]
    pub fn classify(name: &str, file: &Utf8Path) -> Option<Self> {
        match file.extension() {
            Some("py") => Some(Self::interpreted(name, file.to_owned())),
            Some("pyc") => {
                let source = Utf8PathBuf::from(file.as_str().strip_suffix('c')?);
                Some(Self::interpreted(name, source))
            }
            Some(ext) if NATIVE_SUFFIXES.contains(&ext) => Some(Self {
                qualified_name: name.to_owned(),
                absolute_path: file.to_owned(),
                kind: ModuleKind::Native,
                relative_path: None,
            }),
            _ => None,
        }
    }

    fn interpreted(name: &str, source: Utf8PathBuf) -> Self {
        let relative = relative_path(name, &source);
        Self {
            qualified_name: name.to_owned(),
            absolute_path: source,
            kind: ModuleKind::Interpreted,
            relative_path: Some(relative),
        }
    }

    /// Source and cached-bytecode path pairs `(absolute, relative)` for an
    /// interpreted module.
    #[must_use]
    pub fn derived_outputs(&self) -> Option<[(Utf8PathBuf, Utf8PathBuf); 2]> {
        let relative = self.relative_path.as_ref()?;
        Some([
            (self.absolute_path.clone(), relative.clone()),
            (
                Utf8PathBuf::from(format!("{}c", self.absolute_path)),
                Utf8PathBuf::from(format!("{relative}c")),
            ),
        ])
    }
}

/// Reconstruct the project-relative path of an interpreted module.
///
/// One trailing path component is kept per dotted segment of `name`; a
/// package initialiser keeps one more, because its last segment names the
/// directory rather than the file. When the path has too few components the
/// whole path is returned.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use inro::discover::relative_path;
///
/// let plain = relative_path("app.util", Utf8Path::new("/src/app/util.py"));
/// assert_eq!(plain, "app/util.py");
/// let package = relative_path("pkg", Utf8Path::new("/src/pkg/__init__.py"));
/// assert_eq!(package, "pkg/__init__.py");
/// ```
#[must_use]
pub fn relative_path(name: &str, path: &Utf8Path) -> Utf8PathBuf {
    let text = path.as_str();
    let is_init = path.file_stem() == Some(PACKAGE_INIT);
    let keep = name.split('.').count() + usize::from(is_init);
    let mut end = text.len();
    for _ in 0..keep {
        match text.get(..end).and_then(|head| head.rfind('/')) {
            Some(idx) => end = idx,
            None => return path.to_owned(),
        }
    }
    text.get(end + 1..)
        .map_or_else(|| path.to_owned(), Utf8PathBuf::from)
}

/// Dependencies discovered in one run, in sorted qualified-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    modules: Vec<Module>,
}

impl DependencySet {
    /// Every module loaded in `after` but not in `baseline` that has a
    /// backing file with a recognised suffix.
    #[must_use]
    pub fn from_diff(baseline: &ModuleSnapshot, after: &ModuleSnapshot) -> Self {
        let mut modules = Vec::new();
        for (name, backing) in after.added_since(baseline) {
            let Some(file) = backing else {
                debug!(module = name, "skipping module without a backing file");
                continue;
            };
            match Module::classify(name, file) {
                Some(module) => modules.push(module),
                None => warn!(module = name, file = %file, "skipping module with unrecognised suffix"),
            }
        }
        Self { modules }
    }

    /// Modules in sorted qualified-name order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Interpreted modules only.
    pub fn interpreted(&self) -> impl Iterator<Item = &Module> {
        self.iter().filter(|m| m.kind == ModuleKind::Interpreted)
    }

    /// Native modules only.
    pub fn native(&self) -> impl Iterator<Item = &Module> {
        self.iter().filter(|m| m.kind == ModuleKind::Native)
    }

    /// Look up a module by qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.qualified_name == name)
    }

    /// Number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether nothing was discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a Module;
    type IntoIter = std::slice::Iter<'a, Module>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.iter()
    }
}

/// Run discovery for `entry` on a fresh `host`.
///
/// # Errors
///
/// Returns [`DiscoveryError::ImportFailed`] when the entry point cannot be
/// imported, and other [`DiscoveryError`]s when the host fails.
pub fn discover<H: ModuleHost>(mut host: H, entry: &str) -> Result<DependencySet, DiscoveryError> {
    let baseline = host.baseline()?;
    let after = host.import_entry(entry)?;
    let deps = DependencySet::from_diff(&baseline, &after);
    info!(
        entry,
        baseline = baseline.len(),
        loaded = after.len(),
        interpreted = deps.interpreted().count(),
        native = deps.native().count(),
        "discovered dependencies"
    );
    Ok(deps)
}
