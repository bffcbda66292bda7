//! Cycle detection over declared graph edges.
//!
//! Vertices are output paths and phony group names. An output depends on
//! every input of the node producing it; a phony group depends on its
//! members. Inputs nobody produces are source files and end the walk.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

/// Tracks the visitation state of a vertex during cycle detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

pub(crate) type Adjacency<'a> = IndexMap<&'a Utf8Path, Vec<&'a Utf8Path>>;

/// Return the first cycle found, walking vertices in registration order.
pub(crate) fn find_cycle(edges: &Adjacency<'_>) -> Option<Vec<Utf8PathBuf>> {
    let mut detector = CycleDetector::new(edges);
    for &vertex in edges.keys() {
        if detector.is_visited(vertex) {
            continue;
        }
        if let Some(found) = detector.visit(vertex) {
            return Some(found);
        }
    }
    None
}

struct CycleDetector<'g, 'a> {
    edges: &'g Adjacency<'a>,
    stack: Vec<&'a Utf8Path>,
    states: HashMap<&'a Utf8Path, VisitState>,
}

impl<'g, 'a> CycleDetector<'g, 'a> {
    fn new(edges: &'g Adjacency<'a>) -> Self {
        Self {
            edges,
            stack: Vec::new(),
            states: HashMap::new(),
        }
    }

    fn is_visited(&self, vertex: &Utf8Path) -> bool {
        matches!(self.states.get(vertex), Some(VisitState::Visited))
    }

    fn visit(&mut self, vertex: &'a Utf8Path) -> Option<Vec<Utf8PathBuf>> {
        match self.states.get(vertex) {
            Some(VisitState::Visited) => return None,
            Some(VisitState::Visiting) => {
                let idx = self
                    .stack
                    .iter()
                    .position(|v| *v == vertex)
                    .unwrap_or_else(|| {
                        debug_assert!(false, "visiting vertex must be on the stack");
                        0
                    });
                let mut cycle: Vec<Utf8PathBuf> = self
                    .stack
                    .iter()
                    .skip(idx)
                    .map(|v| (*v).to_owned())
                    .collect();
                cycle.push(vertex.to_owned());
                return Some(canonicalize_cycle(cycle));
            }
            None => {
                self.states.insert(vertex, VisitState::Visiting);
            }
        }

        self.stack.push(vertex);

        if let Some(deps) = self.edges.get(vertex) {
            for &dep in deps {
                if !self.edges.contains_key(dep) {
                    continue;
                }
                if let Some(cycle) = self.visit(dep) {
                    return Some(cycle);
                }
            }
        }

        self.stack.pop();
        self.states.insert(vertex, VisitState::Visited);
        None
    }
}

/// Rotate a cycle so it starts at its smallest path, keeping the closing
/// repetition consistent.
fn canonicalize_cycle(mut cycle: Vec<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    if cycle.len() < 2 {
        return cycle;
    }
    let len = cycle.len() - 1;
    let start = cycle
        .iter()
        .take(len)
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    let (prefix, suffix) = cycle.split_at_mut(len);
    prefix.rotate_left(start);
    if let (Some(first), Some(slot)) = (prefix.first().cloned(), suffix.first_mut()) {
        slot.clone_from(&first);
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> &Utf8Path {
        Utf8Path::new(name)
    }

    fn adjacency<'a>(pairs: Vec<(&'a str, Vec<&'a str>)>) -> Adjacency<'a> {
        pairs
            .into_iter()
            .map(|(vertex, deps)| (p(vertex), deps.into_iter().map(p).collect()))
            .collect()
    }

    #[test]
    fn self_edge_is_a_cycle() {
        let edges = adjacency(vec![("a", vec!["a"])]);
        let cycle = find_cycle(&edges).expect("cycle");
        assert_eq!(cycle, vec![Utf8PathBuf::from("a"), Utf8PathBuf::from("a")]);
    }

    #[test]
    fn sources_end_the_walk() {
        let edges = adjacency(vec![("a.o", vec!["a.c", "gen.h"]), ("gen.h", vec!["gen.py"])]);
        assert!(find_cycle(&edges).is_none());
    }

    #[test]
    fn detector_marks_vertices_visited() {
        let edges = adjacency(vec![("a", vec!["b"]), ("b", vec![])]);
        let mut detector = CycleDetector::new(&edges);
        assert!(detector.visit(p("a")).is_none());
        assert!(detector.is_visited(p("a")));
        assert!(detector.is_visited(p("b")));
        assert!(detector.stack.is_empty());
    }

    #[test]
    fn two_node_cycle_is_canonical() {
        let edges = adjacency(vec![("b", vec!["a"]), ("a", vec!["b"])]);
        let cycle = find_cycle(&edges).expect("cycle");
        let expected: Vec<Utf8PathBuf> =
            ["a", "b", "a"].into_iter().map(Utf8PathBuf::from).collect();
        assert_eq!(cycle, expected);
    }

    #[test]
    fn canonicalize_cycle_rotates_smallest_node() {
        let cycle: Vec<Utf8PathBuf> = ["c", "a", "b", "c"]
            .into_iter()
            .map(Utf8PathBuf::from)
            .collect();
        let expected: Vec<Utf8PathBuf> = ["a", "b", "c", "a"]
            .into_iter()
            .map(Utf8PathBuf::from)
            .collect();
        assert_eq!(canonicalize_cycle(cycle), expected);
    }
}
