#![forbid(unsafe_code)]

//! Shared environment constants used across inro crates (library, tests, and
//! helpers).

/// Environment variable naming the interpreter used for dependency discovery.
///
/// # Examples
///
/// ```
/// use inro_env::PYTHON_ENV;
/// assert_eq!(PYTHON_ENV, "INRO_PYTHON");
/// ```
pub const PYTHON_ENV: &str = "INRO_PYTHON";

/// Interpreter used when [`PYTHON_ENV`] is unset.
pub const DEFAULT_PYTHON: &str = "python3";

/// Environment variable replacing the additional compiler flags of every
/// matrix cell.
pub const CXXFLAGS_ENV: &str = "INRO_CXXFLAGS";

/// Prefix of the per-cell flag overrides, completed by
/// [`cell_flags_var`].
pub const CXXFLAGS_CELL_PREFIX: &str = "INRO_CXXFLAGS_";

/// Marker exported to the discovery probe so programs can skip imports that
/// only matter in development runs.
pub const DEPS_PROBE_ENV: &str = "INRO_DEPS_PROBE";

/// Name of the variable overriding the flags of one `(toolchain, variant)`
/// cell.
///
/// Both components are upper-cased and every character outside
/// `[A-Za-z0-9]` becomes `_`.
///
/// # Examples
///
/// ```
/// use inro_env::cell_flags_var;
/// assert_eq!(cell_flags_var("clang", "asan"), "INRO_CXXFLAGS_CLANG_ASAN");
/// assert_eq!(cell_flags_var("g++", "opt"), "INRO_CXXFLAGS_G___OPT");
/// ```
#[must_use]
pub fn cell_flags_var(toolchain: &str, variant: &str) -> String {
    let mut name = String::from(CXXFLAGS_CELL_PREFIX);
    push_sanitised(&mut name, toolchain);
    name.push('_');
    push_sanitised(&mut name, variant);
    name
}

fn push_sanitised(buf: &mut String, part: &str) {
    buf.extend(part.chars().map(|c| {
        if c.is_ascii_alphanumeric() {
            c.to_ascii_uppercase()
        } else {
            '_'
        }
    }));
}
