//! Text listings of discovered dependencies.
//!
//! Each line holds two space-separated fields. Dual mode produces one listing
//! of interpreted modules (source and cached bytecode, absolute then
//! relative) and one of native modules (qualified name, absolute path).
//! Single mode pairs each interpreted source with the relative path of its
//! bytecode, which is what a bytecode compiler step consumes.

use camino::Utf8PathBuf;

use super::{DependencySet, ModuleKind};

/// Suffix appended to the prefix for the interpreted-module listing.
pub const INTERPRETED_SUFFIX: &str = "-py.txt";
/// Suffix appended to the prefix for the native-module listing.
pub const NATIVE_SUFFIX: &str = "-c.txt";

/// The two listings written in dual mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DualListing {
    /// `absolute relative` lines for sources and their bytecode.
    pub interpreted: String,
    /// `name absolute` lines for native extensions.
    pub native: String,
}

/// Render both listings.
///
/// # Examples
///
/// ```
/// use inro::discover::{DependencySet, ModuleSnapshot, listing};
///
/// let after: ModuleSnapshot = [
///     ("app.util", Some("/src/app/util.py")),
///     ("_speedups", Some("/src/_speedups.so")),
/// ]
/// .into_iter()
/// .collect();
/// let deps = DependencySet::from_diff(&ModuleSnapshot::default(), &after);
/// let dual = listing::dual(&deps);
/// assert_eq!(
///     dual.interpreted,
///     "/src/app/util.py app/util.py\n/src/app/util.pyc app/util.pyc\n"
/// );
/// assert_eq!(dual.native, "_speedups /src/_speedups.so\n");
/// ```
#[must_use]
pub fn dual(deps: &DependencySet) -> DualListing {
    let mut listing = DualListing::default();
    for module in deps {
        match module.kind {
            ModuleKind::Interpreted => {
                for (absolute, relative) in module.derived_outputs().into_iter().flatten() {
                    push_line(&mut listing.interpreted, absolute.as_str(), relative.as_str());
                }
            }
            ModuleKind::Native => push_line(
                &mut listing.native,
                &module.qualified_name,
                module.absolute_path.as_str(),
            ),
        }
    }
    listing
}

/// Render the single-mode listing.
#[must_use]
pub fn single(deps: &DependencySet) -> String {
    let mut out = String::new();
    for module in deps.interpreted() {
        if let Some([(source, _), (_, cached)]) = module.derived_outputs() {
            push_line(&mut out, source.as_str(), cached.as_str());
        }
    }
    out
}

/// First field of every non-blank line of a listing.
///
/// # Examples
///
/// ```
/// use inro::discover::listing::first_column;
///
/// let inputs = first_column("/src/a.py a.pyc\n\n/src/b.py b.pyc\n");
/// assert_eq!(inputs, ["/src/a.py", "/src/b.py"]);
/// ```
#[must_use]
pub fn first_column(text: &str) -> Vec<Utf8PathBuf> {
    text.lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(Utf8PathBuf::from)
        .collect()
}

fn push_line(out: &mut String, first: &str, second: &str) {
    out.push_str(first);
    out.push(' ');
    out.push_str(second);
    out.push('\n');
}
