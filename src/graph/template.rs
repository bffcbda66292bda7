//! Placeholder templates for rule commands, descriptions and depfiles.
//!
//! Templates use the descriptor's variable syntax: `$name` where the name is
//! made of `[A-Za-z0-9_-]`, `${name}` for names followed by identifier
//! characters, and `$$`, `$ ` and `$:` for literal `$`, space and colon.
//! Templates are parsed once, when a rule is registered, so malformed syntax
//! and the set of referenced placeholders are known before any node uses the
//! rule.

use std::borrow::Cow;

use indexmap::IndexSet;
use thiserror::Error;

/// Placeholders the executor binds for every build edge.
pub const BUILTIN_PLACEHOLDERS: [&str; 3] = ["in", "out", "in_newline"];

/// Syntax error found while parsing a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} at byte {position}")]
pub struct TemplateError {
    /// Byte offset of the offending `$`.
    pub position: usize,
    /// Short description of the problem.
    pub reason: &'static str,
}

/// Placeholder with no binding at render time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("placeholder `{name}` is not bound")]
pub struct UnboundPlaceholder {
    /// Name of the placeholder.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template string.
///
/// # Examples
///
/// ```
/// use inro::graph::Template;
///
/// let tmpl = Template::parse("cc $cflags -c $in -o $out").expect("valid template");
/// let names: Vec<&str> = tmpl.placeholders().collect();
/// assert_eq!(names, ["cflags", "in", "out"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

fn flush_literal(segments: &mut Vec<Segment>, literal: &mut String) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

impl Template {
    /// Parse `source` into literal and placeholder segments.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for a trailing `$`, an unterminated or empty
    /// `${...}`, or a `$` followed by a character that starts no escape.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();
        while let Some((pos, ch)) = chars.next() {
            if ch != '$' {
                literal.push(ch);
                continue;
            }
            match chars.peek().copied() {
                None => {
                    return Err(TemplateError {
                        position: pos,
                        reason: "trailing `$`",
                    });
                }
                Some((_, escaped @ ('$' | ' ' | ':'))) => {
                    literal.push(escaped);
                    chars.next();
                }
                Some((_, '{')) => {
                    chars.next();
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(TemplateError {
                            position: pos,
                            reason: "unterminated `${`",
                        });
                    }
                    if name.is_empty() || !name.chars().all(is_name_char) {
                        return Err(TemplateError {
                            position: pos,
                            reason: "invalid placeholder name",
                        });
                    }
                    flush_literal(&mut segments, &mut literal);
                    segments.push(Segment::Placeholder(name));
                }
                Some((_, c)) if is_name_char(c) => {
                    let mut name = String::new();
                    while let Some((_, c)) = chars.next_if(|&(_, c)| is_name_char(c)) {
                        name.push(c);
                    }
                    flush_literal(&mut segments, &mut literal);
                    segments.push(Segment::Placeholder(name));
                }
                Some(_) => {
                    return Err(TemplateError {
                        position: pos,
                        reason: "bad `$` escape",
                    });
                }
            }
        }
        flush_literal(&mut segments, &mut literal);
        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    /// The template text exactly as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        let mut seen = IndexSet::new();
        for segment in &self.segments {
            if let Segment::Placeholder(name) = segment {
                seen.insert(name.as_str());
            }
        }
        seen.into_iter()
    }

    /// Substitute every placeholder using `lookup`.
    ///
    /// Literal segments are copied with escapes already resolved, so `$$`
    /// renders as a single `$`.
    ///
    /// # Errors
    ///
    /// Returns [`UnboundPlaceholder`] for the first placeholder `lookup` does
    /// not resolve.
    pub fn render<'a, F>(&self, lookup: F) -> Result<String, UnboundPlaceholder>
    where
        F: Fn(&str) -> Option<Cow<'a, str>>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = lookup(name).ok_or_else(|| UnboundPlaceholder {
                        name: name.clone(),
                    })?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}
