//! POSIX shell quoting shared by node variables and the standalone script.

use shell_quote::{QuoteRefExt, Sh};

/// Shell word for an empty argument.
pub(crate) const EMPTY_ARG: &str = "''";

/// Quote `text` as a single POSIX shell word.
pub(crate) fn sh_quote(text: &str) -> String {
    if text.is_empty() {
        return EMPTY_ARG.to_owned();
    }
    let bytes: Vec<u8> = text.quoted(Sh);
    match String::from_utf8(bytes) {
        Ok(quoted) => quoted,
        Err(err) => {
            debug_assert!(false, "shell quoting produced non UTF-8 bytes: {err}");
            String::from_utf8_lossy(&err.into_bytes()).into_owned()
        }
    }
}

/// Quote `text` only when it contains characters the shell would interpret.
pub(crate) fn sh_word(text: &str) -> String {
    let plain = !text.is_empty()
        && text
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "_-./+=,%@:".contains(ch));
    if plain { text.to_owned() } else { sh_quote(text) }
}

/// Escape `text` for use inside a double-quoted shell string.
pub(crate) fn dq_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Whether `word` splits back into exactly `expected` under shell rules.
#[cfg(test)]
pub(crate) fn splits_to(word: &str, expected: &[&str]) -> bool {
    shlex::split(word).is_some_and(|parts| parts == expected)
}
