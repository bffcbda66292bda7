//! Project description fixtures.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

/// A two-cell, two-unit description with one generated header.
pub const MINIMAL: &str = "\
inro_version: 1.0.0
binary: app
steps: build/steps.sh
matrix:
  - { toolchain: cxx, variant: dbg }
  - { toolchain: cxx, variant: opt }
units: [cpp/a.cc, cpp/b.cc]
header_deps:
  - { units: [cpp/a.cc], headers: [_gen/consts.h] }
rules:
  - { name: gen_consts, command: 'python3 gen.py $out' }
generators:
  - { rule: gen_consts, outputs: [_gen/consts.h] }
";

/// Write `yaml` as `inro.yml` into a fresh directory.
///
/// Returns the directory and its UTF-8 path.
pub fn write_project(yaml: &str) -> Result<(TempDir, Utf8PathBuf)> {
    let dir = TempDir::new().context("write_project: create temp dir")?;
    let root = Utf8Path::from_path(dir.path())
        .context("write_project: temp dir is not UTF-8")?
        .to_owned();
    fs::write(root.join("inro.yml"), yaml).context("write_project: write inro.yml")?;
    Ok((dir, root))
}
