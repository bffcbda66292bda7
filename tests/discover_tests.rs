//! Dependency discovery through the module-host seam.

use anyhow::{Context, Result, ensure};
use camino::{Utf8Path, Utf8PathBuf};
use inro::discover::{
    self, DependencySet, DiscoveryError, ModuleHost, ModuleKind, ModuleSnapshot, PythonHost,
    listing,
};
use rstest::{fixture, rstest};
use test_support::{failure_line, fake_python, fake_python_exiting, snapshot_line};

/// In-memory host replaying two snapshots.
struct ScriptedHost {
    baseline: ModuleSnapshot,
    after: Result<ModuleSnapshot, String>,
    imported: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
}

impl ModuleHost for ScriptedHost {
    fn baseline(&mut self) -> Result<ModuleSnapshot, DiscoveryError> {
        Ok(self.baseline.clone())
    }

    fn import_entry(self, entry: &str) -> Result<ModuleSnapshot, DiscoveryError> {
        self.imported.borrow_mut().push(entry.to_owned());
        self.after.map_err(|message| DiscoveryError::ImportFailed {
            entry: entry.to_owned(),
            search_path: "/src".to_owned(),
            message,
        })
    }
}

#[fixture]
fn baseline() -> ModuleSnapshot {
    [("sys", None::<&str>), ("os", Some("/usr/lib/python3/os.py"))]
        .into_iter()
        .collect()
}

#[fixture]
fn after_main() -> ModuleSnapshot {
    [
        ("sys", None),
        ("os", Some("/usr/lib/python3/os.py")),
        ("app", Some("/src/app/__init__.py")),
        ("app.main", Some("/src/app/main.py")),
        ("app.util", Some("/src/app/util.py")),
        ("pkg", Some("/src/pkg/__init__.pyc")),
        ("pkg.sub", Some("/src/pkg/sub/__init__.py")),
        ("pkg.sub.mod", Some("/src/pkg/sub/mod.py")),
        ("_speedups", Some("/src/_speedups.so")),
        ("zipimport", None),
        ("app.data", Some("/src/app/data.json")),
    ]
    .into_iter()
    .collect()
}

#[rstest]
fn entry_point_scenario(baseline: ModuleSnapshot, after_main: ModuleSnapshot) {
    let imported = std::rc::Rc::default();
    let host = ScriptedHost {
        baseline,
        after: Ok(after_main),
        imported: std::rc::Rc::clone(&imported),
    };
    let deps = discover::discover(host, "app.main").expect("discovery");
    assert_eq!(*imported.borrow(), ["app.main"]);

    let util = deps.get("app.util").expect("app.util");
    assert_eq!(util.kind, ModuleKind::Interpreted);
    assert_eq!(util.relative_path.as_deref(), Some(Utf8Path::new("app/util.py")));

    let leaf = deps.get("pkg.sub.mod").expect("pkg.sub.mod");
    assert_eq!(leaf.kind, ModuleKind::Interpreted);
    assert_eq!(leaf.relative_path.as_deref(), Some(Utf8Path::new("pkg/sub/mod.py")));

    let native = deps.get("_speedups").expect("_speedups");
    assert_eq!(native.kind, ModuleKind::Native);
    assert_eq!(native.absolute_path, "/src/_speedups.so");
    assert!(native.relative_path.is_none());
}

#[rstest]
fn baseline_builtin_and_unknown_modules_are_skipped(
    baseline: ModuleSnapshot,
    after_main: ModuleSnapshot,
) {
    let deps = DependencySet::from_diff(&baseline, &after_main);
    for skipped in ["sys", "os", "zipimport", "app.data"] {
        assert!(deps.get(skipped).is_none(), "{skipped} should be skipped");
    }
    let names: Vec<&str> = deps.iter().map(|m| m.qualified_name.as_str()).collect();
    assert_eq!(
        names,
        ["_speedups", "app", "app.main", "app.util", "pkg", "pkg.sub", "pkg.sub.mod"]
    );
}

#[rstest]
#[case("app", "/src/app/__init__.py", "app/__init__.py")]
#[case("app.util", "/src/app/util.py", "app/util.py")]
#[case("pkg.sub.mod", "/src/pkg/sub/mod.py", "pkg/sub/mod.py")]
#[case("pkg.sub", "/src/pkg/sub/__init__.py", "pkg/sub/__init__.py")]
fn initialiser_files_keep_one_extra_component(
    #[case] name: &str,
    #[case] path: &str,
    #[case] expected: &str,
) {
    assert_eq!(discover::relative_path(name, Utf8Path::new(path)), expected);
}

#[rstest]
fn cached_package_initialiser_resolves_to_source(
    baseline: ModuleSnapshot,
    after_main: ModuleSnapshot,
) {
    let deps = DependencySet::from_diff(&baseline, &after_main);
    let pkg = deps.get("pkg").expect("pkg");
    assert_eq!(pkg.absolute_path, "/src/pkg/__init__.py");
    let dual = listing::dual(&deps);
    assert!(dual.interpreted.contains("/src/pkg/__init__.py pkg/__init__.py\n"));
    assert!(dual.interpreted.contains("/src/pkg/__init__.pyc pkg/__init__.pyc\n"));
}

#[rstest]
fn import_failure_names_entry_and_search_path(baseline: ModuleSnapshot) {
    let host = ScriptedHost {
        baseline,
        after: Err("ModuleNotFoundError: No module named 'nope'".to_owned()),
        imported: std::rc::Rc::default(),
    };
    let err = discover::discover(host, "nope").expect_err("import failure");
    let text = err.to_string();
    assert!(text.contains("`nope`"), "{text}");
    assert!(text.contains("/src"), "{text}");
    assert!(text.contains("ModuleNotFoundError"), "{text}");
}

#[cfg(unix)]
#[test]
fn python_host_speaks_the_probe_protocol() -> Result<()> {
    let baseline = snapshot_line(&[("sys", None)]);
    let after = snapshot_line(&[
        ("sys", None),
        ("app.main", Some("/src/app/main.py")),
        ("_speedups", Some("/src/_speedups.so")),
    ]);
    let (dir, python) = fake_python(&baseline, &after)?;
    let program = python.to_str().context("utf-8 interpreter path")?;
    let search = [Utf8PathBuf::from("/src"), Utf8PathBuf::from("/lib")];
    let host = PythonHost::spawn(program, &search)?;
    let deps = discover::discover(host, "app.main")?;
    ensure!(deps.len() == 2, "expected two modules, got {}", deps.len());

    let entry = std::fs::read_to_string(dir.path().join("entry.log")).context("entry log")?;
    ensure!(entry == "app.main\n", "probe received {entry:?}");
    let env = std::fs::read_to_string(dir.path().join("env.log")).context("env log")?;
    let expected_path = std::env::join_paths(["/src", "/lib"]).context("join paths")?;
    ensure!(
        env.trim_end() == format!("1 {}", expected_path.to_string_lossy()),
        "probe environment was {env:?}"
    );
    Ok(())
}

#[cfg(unix)]
#[test]
fn python_host_reports_import_errors() -> Result<()> {
    let baseline = snapshot_line(&[("sys", None)]);
    let failure = failure_line("ImportError: boom", &["/src", "/usr/lib/python3"]);
    let (_dir, python) = fake_python(&baseline, &failure)?;
    let host = PythonHost::spawn(python.to_str().context("utf-8 path")?, &[])?;
    let err = discover::discover(host, "app.main").expect_err("import error");
    ensure!(
        matches!(&err, DiscoveryError::ImportFailed { entry, search_path, .. }
            if entry == "app.main" && search_path == "/src, /usr/lib/python3"),
        "unexpected error {err:?}"
    );
    Ok(())
}

#[cfg(unix)]
#[test]
fn python_host_reports_early_exit() -> Result<()> {
    let (_dir, python) = fake_python_exiting(3)?;
    let host = PythonHost::spawn(python.to_str().context("utf-8 path")?, &[]);
    let err = host
        .and_then(|h| discover::discover(h, "app.main"))
        .expect_err("probe exited");
    ensure!(
        matches!(err, DiscoveryError::ProbeExited { .. } | DiscoveryError::Io(_)),
        "unexpected error {err:?}"
    );
    Ok(())
}

#[test]
fn missing_interpreter_is_a_spawn_error() {
    let err = PythonHost::spawn("/nonexistent/inro-python", &[]).expect_err("spawn failure");
    assert!(matches!(err, DiscoveryError::Spawn { .. }), "{err:?}");
}

fn python3_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

/// Package tree with a plain module, package initialisers, a nested leaf, a
/// stdlib import and output printed while importing.
fn write_package_tree(root: &Utf8Path) -> Result<()> {
    for (path, text) in [
        ("app/__init__.py", ""),
        (
            "app/main.py",
            "from app import util\nimport pkg.sub.mod\nimport re\nimport json\nprint('starting up')\n",
        ),
        ("app/util.py", "VALUE = 1\n"),
        ("pkg/__init__.py", ""),
        ("pkg/sub/__init__.py", ""),
        ("pkg/sub/mod.py", "LEAF = True\n"),
    ] {
        let file = root.join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {parent}"))?;
        }
        std::fs::write(&file, text).with_context(|| format!("write {file}"))?;
    }
    Ok(())
}

#[test]
fn real_interpreter_discovers_the_full_closure() -> Result<()> {
    if !python3_available() {
        eprintln!("skipping test: python3 must be installed for interpreter tests");
        return Ok(());
    }
    let temp = tempfile::tempdir().context("create temp dir")?;
    let root = Utf8Path::from_path(temp.path()).context("utf-8 temp dir")?;
    write_package_tree(root)?;

    let host = PythonHost::spawn("python3", &[root.to_owned()])?;
    let deps = discover::discover(host, "app.main")?;

    for (name, relative) in [
        ("app.main", "app/main.py"),
        ("app.util", "app/util.py"),
        ("pkg", "pkg/__init__.py"),
        ("pkg.sub", "pkg/sub/__init__.py"),
        ("pkg.sub.mod", "pkg/sub/mod.py"),
    ] {
        let module = deps
            .get(name)
            .with_context(|| format!("{name} missing from {:?}", names(&deps)))?;
        ensure!(module.kind == ModuleKind::Interpreted, "{name} is {:?}", module.kind);
        ensure!(
            module.relative_path.as_deref() == Some(Utf8Path::new(relative)),
            "{name} relative path was {:?}",
            module.relative_path
        );
    }
    for stdlib in ["re", "json", "json.decoder"] {
        let module = deps
            .get(stdlib)
            .with_context(|| format!("{stdlib} missing from {:?}", names(&deps)))?;
        ensure!(module.kind == ModuleKind::Interpreted, "{stdlib} is {:?}", module.kind);
    }
    ensure!(deps.get("sys").is_none(), "builtin sys must not be a dependency");
    Ok(())
}

#[test]
fn real_interpreter_reports_missing_entry_point() -> Result<()> {
    if !python3_available() {
        eprintln!("skipping test: python3 must be installed for interpreter tests");
        return Ok(());
    }
    let temp = tempfile::tempdir().context("create temp dir")?;
    let root = Utf8Path::from_path(temp.path()).context("utf-8 temp dir")?;

    let host = PythonHost::spawn("python3", &[root.to_owned()])?;
    let err = discover::discover(host, "inro_missing_entry").expect_err("import failure");
    ensure!(
        matches!(&err, DiscoveryError::ImportFailed { entry, search_path, message }
            if entry == "inro_missing_entry"
                && search_path.contains(root.as_str())
                && message.starts_with("ModuleNotFoundError")),
        "unexpected error {err:?}"
    );
    Ok(())
}

fn names(deps: &DependencySet) -> Vec<&str> {
    deps.iter().map(|m| m.qualified_name.as_str()).collect()
}
