//! YAML parse diagnostics for project descriptions.
//!
//! `serde_saphyr` reports line and column positions; this module turns them
//! into a [`miette`] diagnostic with a source span and, for a few common
//! mistakes, a hint.

// The unused_assignments lint fires on miette/thiserror derive expansions in
// some Rust versions but not others, so `#[expect]` cannot be used here.
// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_saphyr::{Error as YamlError, Location};
use thiserror::Error;

const YAML_HINTS: [(&str, &str); 3] = [
    (
        "did not find expected '-'",
        "Start list items with '-' and ensure proper indentation.",
    ),
    (
        "mapping values are not allowed",
        "Check for a stray ':' or add quotes around values where needed.",
    ),
    (
        "unknown field",
        "Check the key against the documented project keys; unknown keys are rejected.",
    ),
];

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(inro::config::yaml))]
struct YamlDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    #[source]
    source: YamlError,
    message: String,
}

/// Byte offset of a 1-based line and column, clamped to the source.
fn byte_offset(src: &str, line: u64, column: u64) -> usize {
    let target_line = usize::try_from(line.saturating_sub(1)).unwrap_or(usize::MAX);
    let target_column = usize::try_from(column.saturating_sub(1)).unwrap_or(usize::MAX);
    let mut offset = 0_usize;
    for (idx, segment) in src.split_inclusive('\n').enumerate() {
        if idx == target_line {
            let text = segment.trim_end_matches(['\n', '\r']);
            let column_offset = text
                .char_indices()
                .nth(target_column)
                .map_or(text.len(), |(byte_idx, _)| byte_idx);
            return offset + column_offset;
        }
        offset += segment.len();
    }
    src.len()
}

fn span_at(src: &str, loc: Location) -> SourceSpan {
    let at = byte_offset(src, loc.line(), loc.column());
    let len = usize::from(src.as_bytes().get(at).is_some_and(|b| !matches!(b, b'\n' | b'\r')));
    SourceSpan::new(at.into(), len)
}

fn hint_for(message: &str, src: &str, loc: Option<Location>) -> Option<String> {
    let tab_indented = loc.is_some_and(|l| {
        let idx = usize::try_from(l.line().saturating_sub(1)).unwrap_or(usize::MAX);
        src.lines().nth(idx).is_some_and(|line| {
            line.chars()
                .take_while(|c| c.is_whitespace())
                .any(|c| c == '\t')
        })
    });
    if tab_indented {
        return Some("Use spaces for indentation; tabs are invalid in YAML.".to_owned());
    }
    let lower = message.to_lowercase();
    YAML_HINTS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, hint)| (*hint).to_owned())
}

/// Map a `serde_saphyr` error into a diagnostic naming `name`.
pub(super) fn map_yaml_error(
    err: YamlError,
    src: &str,
    name: &str,
) -> Box<dyn Diagnostic + Send + Sync + 'static> {
    let loc = err.location();
    let (line, column, span) =
        loc.map_or((1, 1, None), |l| (l.line(), l.column(), Some(span_at(src, l))));
    let detail = err.to_string();
    let help = hint_for(&detail, src, loc);
    Box::new(YamlDiagnostic {
        src: NamedSource::new(name, src.to_owned()),
        span,
        help,
        source: err,
        message: format!("{name}:{line}:{column}: {detail}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("abc\ndef\n", 2, 2, 5)]
    #[case("abc\r\ndef", 2, 1, 5)]
    #[case("abc", 9, 1, 3)]
    #[case("héllo", 1, 3, 3)]
    fn offsets_follow_lines_and_chars(
        #[case] src: &str,
        #[case] line: u64,
        #[case] column: u64,
        #[case] expected: usize,
    ) {
        assert_eq!(byte_offset(src, line, column), expected);
    }

    #[test]
    fn tab_indentation_gets_a_hint() {
        let src = "\tunits: \"unterminated";
        let err = serde_saphyr::from_str::<serde_json::Value>(src).expect_err("tab error");
        let diag = map_yaml_error(err, src, "inro.yml");
        let help = diag.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("spaces"), "{help}");
        assert!(diag.to_string().starts_with("inro.yml:"));
    }
}
