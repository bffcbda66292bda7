//! Named aggregate targets contributed by independent subgraph builders.
//!
//! Builders append members under shared logical names as they go. Groups that
//! never received a member are dropped when the aggregator is sealed, and the
//! names of the surviving groups are handed back so the caller can roll them
//! into one umbrella group.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

/// Accumulates phony group members in insertion order.
///
/// # Examples
///
/// ```
/// use inro::phony::PhonyAggregator;
///
/// let mut phony = PhonyAggregator::default();
/// phony.declare("strip");
/// phony.add_members("unit", ["_test/a.task.txt"]);
/// assert_eq!(phony.seal(), vec!["unit".to_owned()]);
/// assert!(phony.members("strip").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PhonyAggregator {
    groups: IndexMap<String, IndexSet<Utf8PathBuf>>,
}

impl PhonyAggregator {
    /// Declare a group without contributing members yet.
    pub fn declare(&mut self, name: &str) {
        self.groups.entry(name.to_owned()).or_default();
    }

    /// Merge `members` into group `name`, creating it when absent.
    pub fn add_members<I, P>(&mut self, name: &str, members: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.groups
            .entry(name.to_owned())
            .or_default()
            .extend(members.into_iter().map(Into::into));
    }

    /// Drop empty groups and return the remaining names in declaration order.
    pub fn seal(&mut self) -> Vec<String> {
        self.groups.retain(|name, members| {
            let keep = !members.is_empty();
            if !keep {
                debug!(group = %name, "dropping empty phony group");
            }
            keep
        });
        self.groups.keys().cloned().collect()
    }

    /// Members of a non-empty group.
    #[must_use]
    pub fn members(&self, name: &str) -> Option<&IndexSet<Utf8PathBuf>> {
        self.groups.get(name).filter(|members| !members.is_empty())
    }

    /// Whether a non-empty group called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &Utf8Path) -> bool {
        self.members(name.as_str()).is_some()
    }

    /// Non-empty groups in declaration order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &IndexSet<Utf8PathBuf>)> {
        self.groups
            .iter()
            .filter(|(_, members)| !members.is_empty())
            .map(|(name, members)| (name.as_str(), members))
    }
}
