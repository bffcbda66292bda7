//! Generated-header propagation and phony aggregation over expanded graphs.

use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use inro::graph::{BuildGraph, Node, Rule};
use inro::headers::HeaderDependencyPropagator;
use inro::matrix::{MatrixCell, MatrixExpander};
use inro::phony::PhonyAggregator;
use inro::project::builtin_rules;
use rstest::rstest;

fn graph_with_rules() -> BuildGraph {
    let mut graph = BuildGraph::default();
    for rule in builtin_rules(Utf8Path::new("build/steps.sh")).expect("builtin rules") {
        graph.register_rule(rule).expect("register builtin rule");
    }
    graph
        .register_rule(Rule::new("gen", "gen $out", "GEN $out").expect("gen rule"))
        .expect("register gen");
    graph
}

#[rstest]
fn every_compile_node_over_a_mapped_unit_gets_its_headers() {
    let mut graph = graph_with_rules();
    graph
        .add_node(Node::new("gen", ["_gen/a.h", "_gen/b.h"]))
        .expect("generator");
    let units = vec![Utf8PathBuf::from("cpp/a.cc"), Utf8PathBuf::from("cpp/b.cc")];
    let expander = MatrixExpander::new(units, "app");
    let axis = [
        MatrixCell::new("cxx", "dbg"),
        MatrixCell::new("cxx", "opt"),
        MatrixCell::new("clang", "asan"),
    ];
    expander.expand(&mut graph, &axis).expect("expand");

    let mut headers = HeaderDependencyPropagator::default();
    headers.add(["cpp/a.cc"], ["_gen/a.h", "_gen/b.h"]);
    headers.add(["cpp/b.cc"], ["_gen/b.h"]);
    let augmented = headers.apply(&mut graph, &["compile_one"]);
    assert_eq!(augmented, 6);

    let validated = graph.validate().expect("valid graph");
    for (_, node) in validated.nodes().filter(|(_, n)| n.rule == "compile_one") {
        let unit = node.explicit_inputs.first().expect("unit input");
        let expected = headers.headers_for(unit).expect("mapped unit");
        for header in expected {
            assert!(
                node.implicit_inputs.contains(header),
                "{header} missing from compile of {unit}"
            );
        }
    }
    for (_, node) in validated.nodes().filter(|(_, n)| n.rule != "compile_one") {
        assert!(node.implicit_inputs.is_empty(), "{} was augmented", node.rule);
    }
}

#[rstest]
fn applying_twice_does_not_duplicate_inputs() {
    let mut graph = graph_with_rules();
    graph.add_node(Node::new("gen", ["_gen/a.h"])).expect("generator");
    MatrixExpander::new(vec![Utf8PathBuf::from("a.cc")], "app")
        .expand(&mut graph, &[MatrixCell::new("cxx", "dbg")])
        .expect("expand");
    let mut headers = HeaderDependencyPropagator::default();
    headers.add(["a.cc"], ["_gen/a.h"]);
    headers.apply(&mut graph, &["compile_one"]);
    headers.apply(&mut graph, &["compile_one"]);
    let validated = graph.validate().expect("valid graph");
    let (_, compile) = validated
        .nodes()
        .find(|(_, n)| n.rule == "compile_one")
        .expect("compile node");
    assert_eq!(compile.implicit_inputs.len(), 1);
}

#[rstest]
#[case(&[("unit", &["a"][..]), ("strip", &[][..]), ("unit", &["b", "a"][..])], &["unit"])]
#[case(&[("empty", &[][..])], &[])]
#[case(&[("x", &["1"][..]), ("y", &["2"][..])], &["x", "y"])]
fn sealing_keeps_only_groups_with_members(
    #[case] contributions: &[(&str, &[&str])],
    #[case] expected: &[&str],
) {
    let mut phony = PhonyAggregator::default();
    for (name, members) in contributions {
        phony.declare(name);
        phony.add_members(name, members.iter().copied());
    }
    assert_eq!(phony.seal(), expected);
    for name in expected {
        let accumulated: HashSet<&str> = contributions
            .iter()
            .filter(|(group, _)| group == name)
            .flat_map(|(_, members)| members.iter().copied())
            .collect();
        let sealed: HashSet<&str> = phony
            .members(name)
            .expect("non-empty group")
            .iter()
            .map(|p| p.as_str())
            .collect();
        assert_eq!(sealed, accumulated);
    }
}
