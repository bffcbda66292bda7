//! Emitters reading one validated project graph.

use anyhow::{Context, Result, ensure};
use camino::Utf8Path;
use inro::config::ProjectConfig;
use inro::emit::ninja::HEADER;
use inro::project::Project;
use rstest::{fixture, rstest};
use test_support::project::MINIMAL;

#[fixture]
fn config() -> ProjectConfig {
    ProjectConfig::from_str_named(MINIMAL, "inro.yml").expect("minimal config")
}

fn project(config: ProjectConfig) -> Project {
    Project::generate(config, Utf8Path::new("."), []).expect("project")
}

#[rstest]
fn descriptor_is_byte_identical_across_runs(config: ProjectConfig) -> Result<()> {
    let first = project(config.clone()).ninja()?;
    let second = project(config).ninja()?;
    ensure!(first == second, "descriptors differ between runs");
    ensure!(first.starts_with(HEADER), "missing header line");
    Ok(())
}

#[rstest]
fn descriptor_lists_rules_edges_phony_and_default(config: ProjectConfig) -> Result<()> {
    let text = project(config).ninja()?;
    let rule_at = text.find("rule compile_one\n").context("compile rule")?;
    let edge_at = text
        .find("build _build/obj/cxx-dbg/a.o: compile_one cpp/a.cc | _gen/consts.h\n")
        .context("compile edge with generated header")?;
    let phony_at = text.find("build all: phony app-all metrics\n").context("umbrella")?;
    let default_at = text.find("default _bin/cxx-dbg/app\n").context("default")?;
    ensure!(rule_at < edge_at && edge_at < phony_at && phony_at < default_at);
    ensure!(text.contains("  depfile = $out.d\n"), "compile rule depfile");
    ensure!(
        text.contains(
            "build _bin/cxx-opt/app.stripped _bin/cxx-opt/app.symbols: strip _bin/cxx-opt/app\n"
        ),
        "strip edge"
    );
    ensure!(
        !text.contains("_bin/cxx-dbg/app.stripped"),
        "debug binaries are never stripped"
    );
    ensure!(
        text.contains("build _build/preprocessed/cxx-dbg.txt: line_count"),
        "metrics report edge"
    );
    Ok(())
}

#[rstest]
fn link_edge_keeps_unit_order(config: ProjectConfig) -> Result<()> {
    let text = project(config).ninja()?;
    ensure!(
        text.contains(
            "build _bin/cxx-opt/app: link _build/obj/cxx-opt/a.o _build/obj/cxx-opt/b.o\n"
        ),
        "link edge in unit order:\n{text}"
    );
    Ok(())
}

#[rstest]
fn empty_metrics_group_is_dropped() -> Result<()> {
    let yaml = format!("{MINIMAL}metrics_variants: []\n");
    let config = ProjectConfig::from_str_named(&yaml, "inro.yml")?;
    let text = project(config).ninja()?;
    ensure!(!text.contains("build metrics: phony"), "empty group emitted");
    ensure!(text.contains("build all: phony app-all\n"), "umbrella:\n{text}");
    Ok(())
}

#[rstest]
fn standalone_script_compiles_links_and_strips(config: ProjectConfig) -> Result<()> {
    let script = project(config).shell_script()?;
    ensure!(script.starts_with("#!/usr/bin/env bash\n"));
    ensure!(script.contains("\n. build/steps.sh\n"), "sources steps");
    ensure!(script.contains("local compiler=${1:-cxx}"), "toolchain default");
    ensure!(script.contains("local variant=${2:-opt}"), "variant default");
    ensure!(
        script.contains(
            "compile_one \"$compiler\" \"$variant\" \"$cxx_flags\" cpp/a.cc \"_build/obj/$compiler-$variant-sh/a.o\""
        ),
        "compile step:\n{script}"
    );
    ensure!(
        script.contains(
            "link \"$compiler\" \"$variant\" \"$out\" \"_build/obj/$compiler-$variant-sh/a.o\" \"_build/obj/$compiler-$variant-sh/b.o\""
        ),
        "link step:\n{script}"
    );
    ensure!(script.contains("if test \"$variant\" = opt; then"), "strip guard");
    ensure!(
        script.contains("strip_ \"$out\" \"$out.stripped\" \"$out.symbols\""),
        "strip step:\n{script}"
    );
    ensure!(script.ends_with("main \"$@\"\n"));
    Ok(())
}

#[rstest]
fn packaging_manifest_unions_assets_units_and_headers(config: ProjectConfig) -> Result<()> {
    let text = project(config).tarball_manifest()?;
    let lines: Vec<&str> = text.lines().collect();
    ensure!(
        lines == ["build/steps.sh", "_build/app.sh", "cpp/a.cc", "cpp/b.cc", "_gen/consts.h"],
        "unexpected manifest {lines:?}"
    );
    Ok(())
}

#[test]
fn asset_globs_are_sorted_and_relative_to_root() -> Result<()> {
    let (dir, root) = test_support::project::write_project(MINIMAL)?;
    std::fs::create_dir_all(dir.path().join("doc")).context("mkdir doc")?;
    for name in ["b.md", "a.md"] {
        std::fs::write(dir.path().join("doc").join(name), "x").context("write doc")?;
    }
    let yaml = format!("{MINIMAL}assets: ['doc/*.md', LICENSE]\n");
    let config = ProjectConfig::from_str_named(&yaml, "inro.yml")?;
    let text = Project::generate(config, &root, [])?.tarball_manifest()?;
    let head: Vec<&str> = text.lines().take(3).collect();
    ensure!(head == ["doc/a.md", "doc/b.md", "LICENSE"], "unexpected {head:?}");
    Ok(())
}

#[test]
fn dollar_in_flags_reaches_both_artifacts_literally() -> Result<()> {
    let yaml = format!("{MINIMAL}cxx_flags: '-DVER=$HOME'\n");
    let config = ProjectConfig::from_str_named(&yaml, "inro.yml")?;
    let built = Project::generate(config, Utf8Path::new("."), [])?;

    let descriptor = built.ninja()?;
    let flag_lines: Vec<&str> = descriptor
        .lines()
        .filter(|line| line.starts_with("  more_cxx_flags = "))
        .collect();
    ensure!(!flag_lines.is_empty(), "no flag bindings in descriptor");
    for line in &flag_lines {
        ensure!(line.contains("$$HOME"), "unescaped flags: {line}");
        ensure!(
            !line.replace("$$", "").contains('$'),
            "Ninja would expand a variable in {line}"
        );
    }

    let script = built.shell_script()?;
    let default_flags = script
        .lines()
        .find(|line| line.trim_start().starts_with("local cxx_flags="))
        .context("script flags")?;
    ensure!(
        default_flags.contains("$HOME") && !default_flags.contains("$$"),
        "script flags changed: {default_flags}"
    );
    Ok(())
}
