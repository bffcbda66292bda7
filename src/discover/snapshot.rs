//! Immutable views of the loaded-module registry.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// The loaded modules of a runtime at one instant, keyed by qualified name.
///
/// Modules without a backing file (builtins, namespace packages, frozen
/// modules) are recorded with no path.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use inro::discover::ModuleSnapshot;
///
/// let before: ModuleSnapshot = [("sys", None::<&str>)].into_iter().collect();
/// let after: ModuleSnapshot = [("sys", None), ("app", Some("/src/app.py"))]
///     .into_iter()
///     .collect();
/// let added: Vec<_> = after.added_since(&before).collect();
/// assert_eq!(added, [("app", Some(Utf8Path::new("/src/app.py")))]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ModuleSnapshot {
    modules: BTreeMap<String, Option<Utf8PathBuf>>,
}

impl ModuleSnapshot {
    /// Number of loaded modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no module is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Whether `name` is loaded.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Modules in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Utf8Path>)> {
        self.modules
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_deref()))
    }

    /// Modules present here but absent from `baseline`, in sorted name order.
    pub fn added_since<'a>(
        &'a self,
        baseline: &'a Self,
    ) -> impl Iterator<Item = (&'a str, Option<&'a Utf8Path>)> {
        self.iter().filter(|(name, _)| !baseline.contains(name))
    }
}

impl<N, P> FromIterator<(N, Option<P>)> for ModuleSnapshot
where
    N: Into<String>,
    P: Into<Utf8PathBuf>,
{
    fn from_iter<I: IntoIterator<Item = (N, Option<P>)>>(iter: I) -> Self {
        Self {
            modules: iter
                .into_iter()
                .map(|(name, path)| (name.into(), path.map(Into::into)))
                .collect(),
        }
    }
}
