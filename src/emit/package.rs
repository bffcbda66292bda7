//! Flat packaging manifest for source tarballs.
//!
//! One path per line: static assets first, then the translation units in
//! their canonical order, then the generated headers the units need. A path
//! listed by more than one source appears once, at its first position.

use std::fmt::Write;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use tracing::{debug, info};

use super::EmitError;

/// Render the packaging manifest.
///
/// Asset entries containing glob metacharacters are expanded relative to
/// `root`; matches are sorted and directories are skipped. Plain entries are
/// listed as given whether or not they exist yet, since some are produced by
/// the build itself.
///
/// # Errors
///
/// Returns an [`EmitError`] when an asset pattern is malformed or a match
/// cannot be read.
///
/// # Examples
///
/// ```
/// use camino::{Utf8Path, Utf8PathBuf};
/// use inro::emit::package;
///
/// let units = [Utf8PathBuf::from("cpp/a.cc")];
/// let headers = [Utf8PathBuf::from("_gen/a.h")];
/// let text = package::generate(
///     Utf8Path::new("."),
///     &["build/steps.sh".to_owned()],
///     &units,
///     &headers,
/// )
/// .expect("manifest");
/// assert_eq!(text, "build/steps.sh\ncpp/a.cc\n_gen/a.h\n");
/// ```
pub fn generate<'a, H>(
    root: &Utf8Path,
    assets: &[String],
    units: &[Utf8PathBuf],
    headers: H,
) -> Result<String, EmitError>
where
    H: IntoIterator<Item = &'a Utf8PathBuf>,
{
    let mut entries: IndexSet<Utf8PathBuf> = IndexSet::new();
    for asset in assets {
        if is_pattern(asset) {
            entries.extend(expand(root, asset)?);
        } else {
            entries.insert(Utf8PathBuf::from(asset));
        }
    }
    entries.extend(units.iter().cloned());
    entries.extend(headers.into_iter().cloned());

    let mut out = String::new();
    for entry in &entries {
        writeln!(out, "{entry}")?;
    }
    info!(entries = entries.len(), "generated packaging manifest");
    Ok(out)
}

fn is_pattern(text: &str) -> bool {
    text.contains(['*', '?', '['])
}

fn expand(root: &Utf8Path, pattern: &str) -> Result<Vec<Utf8PathBuf>, EmitError> {
    let root_prefix = if root.as_str().is_empty() || root == "." {
        String::new()
    } else {
        format!("{}/", glob::Pattern::escape(root.as_str()))
    };
    let full = format!("{root_prefix}{pattern}");
    let paths = glob::glob(&full).map_err(|source| EmitError::AssetPattern {
        pattern: pattern.to_owned(),
        source,
    })?;
    let mut matches = Vec::new();
    for entry in paths {
        let found = entry.map_err(|source| EmitError::AssetGlob {
            pattern: pattern.to_owned(),
            source,
        })?;
        if !found.is_file() {
            continue;
        }
        let path = Utf8PathBuf::from_path_buf(found).map_err(|p| EmitError::NonUtf8Asset {
            path: p.to_string_lossy().into_owned(),
        })?;
        let relative = path
            .strip_prefix(root)
            .map_or_else(|_| path.clone(), Utf8Path::to_path_buf);
        matches.push(relative);
    }
    matches.sort();
    debug!(pattern, matches = matches.len(), "expanded asset pattern");
    Ok(matches)
}
