//! Implicit generated-header dependencies for translation units.
//!
//! A compiler-probed dependency file only exists after a unit has been
//! compiled once, so on a from-scratch build it cannot mention headers that a
//! code generator elsewhere in the graph has yet to produce. The propagator
//! records which generated headers each unit needs and unions them into the
//! implicit inputs of every node compiled over that unit.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::graph::{BuildGraph, NodeId};

/// Mapping from translation unit to the generated headers it requires.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use inro::headers::HeaderDependencyPropagator;
///
/// let mut headers = HeaderDependencyPropagator::default();
/// headers.add(["cpp/core.cc"], ["_gen/consts.h", "_gen/types.h"]);
/// headers.add(["cpp/core.cc"], ["_gen/consts.h"]);
/// let needed = headers.headers_for(Utf8Path::new("cpp/core.cc"));
/// assert_eq!(needed.map(|h| h.len()), Some(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct HeaderDependencyPropagator {
    by_unit: IndexMap<Utf8PathBuf, IndexSet<Utf8PathBuf>>,
}

impl HeaderDependencyPropagator {
    /// Record that every unit in `units` requires every header in `headers`.
    pub fn add<U, H, P, Q>(&mut self, units: U, headers: H)
    where
        U: IntoIterator<Item = P>,
        H: IntoIterator<Item = Q>,
        P: Into<Utf8PathBuf>,
        Q: Into<Utf8PathBuf>,
    {
        let required: Vec<Utf8PathBuf> = headers.into_iter().map(Into::into).collect();
        for unit in units {
            self.by_unit
                .entry(unit.into())
                .or_default()
                .extend(required.iter().cloned());
        }
    }

    /// Headers recorded for `unit`.
    #[must_use]
    pub fn headers_for(&self, unit: &Utf8Path) -> Option<&IndexSet<Utf8PathBuf>> {
        self.by_unit.get(unit)
    }

    /// Every recorded header once, in first-recorded order.
    #[must_use]
    pub fn all_headers(&self) -> IndexSet<&Utf8PathBuf> {
        self.by_unit.values().flatten().collect()
    }

    /// Union the mapped headers into the implicit inputs of every node whose
    /// rule is in `rules` and whose explicit inputs include a mapped unit.
    ///
    /// Returns the number of nodes augmented.
    pub fn apply(&self, graph: &mut BuildGraph, rules: &[&str]) -> usize {
        let targets: Vec<(NodeId, Vec<&Utf8PathBuf>)> = graph
            .nodes()
            .filter(|(_, node)| rules.contains(&node.rule.as_str()))
            .filter_map(|(id, node)| {
                let headers: Vec<&Utf8PathBuf> = node
                    .explicit_inputs
                    .iter()
                    .filter_map(|input| self.by_unit.get(input))
                    .flatten()
                    .collect();
                (!headers.is_empty()).then_some((id, headers))
            })
            .collect();
        for (id, headers) in &targets {
            debug!(node = id.index(), headers = headers.len(), "adding generated headers");
            graph.extend_implicit_inputs(*id, headers.iter().copied());
        }
        targets.len()
    }
}
