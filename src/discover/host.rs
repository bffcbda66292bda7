//! The single side-effecting step of discovery: loading the entry point.
//!
//! Importing a module mutates the runtime's process-wide module registry and
//! cannot be undone, so a host performs exactly one import. [`ModuleHost`]
//! encodes that by consuming itself in [`ModuleHost::import_entry`].

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use camino::Utf8PathBuf;
use serde::Deserialize;
use tracing::debug;

use super::{DiscoveryError, ModuleSnapshot};

/// A fresh runtime able to report its loaded modules and import one entry
/// point.
pub trait ModuleHost {
    /// Snapshot of the modules loaded before any application code.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] when the runtime cannot report.
    fn baseline(&mut self) -> Result<ModuleSnapshot, DiscoveryError>;

    /// Import `entry` with the runtime's own loader and return the modules
    /// loaded afterwards. The host is spent.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::ImportFailed`] when the import raises.
    fn import_entry(self, entry: &str) -> Result<ModuleSnapshot, DiscoveryError>;
}

/// Probe run inside the interpreter. Prints the baseline, reads the entry
/// name from stdin, imports it and prints the result.
///
/// The probe imports nothing itself: any module it loaded would land in the
/// baseline and vanish from the closure. Protocol lines are JSON encoded by
/// hand and written to the original stdout, while `sys.stdout` points at
/// stderr for the duration of the import.
const PROBE: &str = r#"
import sys

def quote(text):
    out = ['"']
    for ch in text:
        if ch == '"' or ch == '\\':
            out.append('\\' + ch)
        elif ord(ch) < 0x20:
            out.append('\\u%04x' % ord(ch))
        else:
            out.append(ch)
    out.append('"')
    return ''.join(out)

def snapshot():
    mods = {}
    for name, mod in list(sys.modules.items()):
        if mod is None:
            continue
        path = getattr(mod, '__file__', None)
        mods[name] = path if isinstance(path, str) else None
    return mods

def encode_modules(mods):
    items = []
    for name, path in mods.items():
        items.append(quote(name) + ':' + (quote(path) if path is not None else 'null'))
    return '{"modules":{' + ','.join(items) + '}}'

def encode_failure(error, path):
    return '{"error":' + quote(error) + ',"sys_path":[' + ','.join(quote(p) for p in path if isinstance(p, str)) + ']}'

protocol = sys.stdout

def emit(line):
    protocol.write(line + '\n')
    protocol.flush()

emit(encode_modules(snapshot()))
entry = sys.stdin.readline().strip()
sys.stdout = sys.stderr
try:
    __import__(entry)
except BaseException as e:
    failure = (type(e).__name__, str(e))
else:
    failure = None
finally:
    sys.stdout = protocol
if failure is None:
    emit(encode_modules(snapshot()))
else:
    emit(encode_failure('%s: %s' % failure, sys.path))
"#;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProbeMessage {
    Snapshot {
        modules: ModuleSnapshot,
    },
    Failure {
        error: String,
        sys_path: Vec<String>,
    },
}

/// A Python interpreter started with `-S` so site packages stay out of the
/// closure.
#[derive(Debug)]
pub struct PythonHost {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl PythonHost {
    /// Start `program` with the probe, `PYTHONPATH` set from `search_path`
    /// and [`inro_env::DEPS_PROBE_ENV`] set so applications can skip
    /// debug-only imports.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Spawn`] when the interpreter cannot start.
    pub fn spawn(program: &str, search_path: &[Utf8PathBuf]) -> Result<Self, DiscoveryError> {
        let mut command = Command::new(program);
        command
            .arg("-S")
            .arg("-c")
            .arg(PROBE)
            .env(inro_env::DEPS_PROBE_ENV, "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if !search_path.is_empty() {
            let joined = std::env::join_paths(search_path).map_err(|err| DiscoveryError::Spawn {
                program: program.to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, err),
            })?;
            command.env("PYTHONPATH", joined);
        }
        debug!(program, search_path = search_path.len(), "starting discovery probe");
        let mut child = command.spawn().map_err(|source| DiscoveryError::Spawn {
            program: program.to_owned(),
            source,
        })?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(DiscoveryError::Io(std::io::Error::other(
                "probe pipes were not captured",
            )));
        };
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn read_message(&mut self) -> Result<ProbeMessage, DiscoveryError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            let status = self.child.wait()?;
            return Err(DiscoveryError::ProbeExited { status });
        }
        serde_json::from_str(line.trim_end()).map_err(|source| DiscoveryError::Protocol {
            line: line.trim_end().to_owned(),
            source,
        })
    }
}

impl ModuleHost for PythonHost {
    fn baseline(&mut self) -> Result<ModuleSnapshot, DiscoveryError> {
        match self.read_message()? {
            ProbeMessage::Snapshot { modules } => {
                debug!(modules = modules.len(), "baseline recorded");
                Ok(modules)
            }
            ProbeMessage::Failure { error, sys_path } => Err(DiscoveryError::ImportFailed {
                entry: String::new(),
                search_path: sys_path.join(", "),
                message: error,
            }),
        }
    }

    fn import_entry(mut self, entry: &str) -> Result<ModuleSnapshot, DiscoveryError> {
        writeln!(self.stdin, "{entry}")?;
        self.stdin.flush()?;
        let message = self.read_message()?;
        self.child.wait()?;
        match message {
            ProbeMessage::Snapshot { modules } => {
                debug!(entry, modules = modules.len(), "entry point imported");
                Ok(modules)
            }
            ProbeMessage::Failure { error, sys_path } => Err(DiscoveryError::ImportFailed {
                entry: entry.to_owned(),
                search_path: sys_path.join(", "),
                message: error,
            }),
        }
    }
}
