//! Size-metric nodes: preprocess every unit and count the result.
//!
//! Metrics are ordinary graph nodes, so the external executor rebuilds them
//! through the same mechanism as objects and binaries.

use camino::Utf8PathBuf;
use tracing::info;

use crate::graph::{BuildGraph, GraphError, Node};
use crate::matrix::{FLAGS_VAR, MatrixCell, MatrixExpander, TOOLCHAIN_VAR, VARIANT_VAR};

/// Rule that preprocesses one unit.
pub const PREPROCESS_RULE: &str = "preprocess";
/// Rule that totals the preprocessed size of a cell.
pub const LINE_COUNT_RULE: &str = "line_count";

/// Add preprocess and line-count nodes for every cell of `axis` whose variant
/// is listed in `variants`.
///
/// Returns the metrics reports in cell order.
///
/// # Errors
///
/// Returns [`GraphError::DuplicateOutput`] when a generated path is already
/// claimed.
pub fn add_metrics_nodes(
    graph: &mut BuildGraph,
    expander: &MatrixExpander,
    axis: &[MatrixCell],
    variants: &[String],
) -> Result<Vec<Utf8PathBuf>, GraphError> {
    let layout = expander.layout();
    let mut reports = Vec::new();
    for cell in axis.iter().filter(|cell| variants.contains(&cell.variant)) {
        let mut preprocessed = Vec::with_capacity(expander.units().len());
        for unit in expander.units() {
            let out = layout.preprocessed_path(cell, unit);
            graph.add_node(
                Node::new(PREPROCESS_RULE, [out.clone()])
                    .inputs([unit.clone()])
                    .var(TOOLCHAIN_VAR, cell.toolchain.clone())
                    .var(VARIANT_VAR, cell.variant.clone())
                    .var(FLAGS_VAR, expander.flags().shell_word(cell, unit)),
            )?;
            preprocessed.push(out);
        }
        let report = layout.metrics_report(cell);
        graph.add_node(Node::new(LINE_COUNT_RULE, [report.clone()]).inputs(preprocessed))?;
        reports.push(report);
    }
    info!(reports = reports.len(), "added metrics nodes");
    Ok(reports)
}
