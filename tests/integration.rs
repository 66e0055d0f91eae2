// Integration testing can be done either by calling library functions directly or by invoking your CLI as a subprocess.
use predicates::prelude::*;
use std::{fs, path::Path};

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

/// A project that builds without sass or esbuild installed.
fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(
        root,
        "Sprig.toml",
        r#"
        [source.styles]
        preprocessor = "css"

        [source.scripts]
        browserify = false
        "#,
    );
    write(root, "app/index.html", "<html><body></body></html>");
    write(root, "app/app.js", "console.log('app');");
    write(root, "app/styles/app.css", "body {}");
    write(root, "public/robots.txt", "User-agent: *");
    write(root, "vendor/lib.js", "var lib;");

    dir
}

fn sprig(root: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("sprig").unwrap();
    cmd.arg("--root").arg(root).env_remove("SPRIG_ENV");
    cmd
}

/// `sprig build` with modules left as written, so esbuild is not needed.
fn sprig_build(root: &Path) -> assert_cmd::Command {
    let mut cmd = sprig(root);
    cmd.arg("build").arg("--transpiler").arg("none");
    cmd
}

#[test]
fn config_prints_merged_options() {
    let dir = project();

    sprig(dir.path())
        .arg("config")
        .arg("--set")
        .arg("source.name=main")
        .assert()
        .success()
        .stdout(predicate::str::contains("name = \"main\""))
        .stdout(predicate::str::contains("preprocessor = \"css\""))
        .stdout(predicate::str::contains("srcDir = \"app\""));
}

#[test]
fn config_rejects_a_malformed_set() {
    let dir = project();

    sprig(dir.path())
        .arg("config")
        .arg("--set")
        .arg("source.name")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --set argument"));
}

#[test]
fn build_writes_the_composed_tree() {
    let dir = project();
    let root = dir.path();

    sprig_build(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("create"));

    let dist = root.join("dist");
    assert_eq!(
        fs::read_to_string(dist.join("index.html")).unwrap(),
        "<html><body></body></html>"
    );
    assert_eq!(fs::read_to_string(dist.join("app.js")).unwrap(), "console.log('app');");
    assert_eq!(fs::read_to_string(dist.join("assets/app.css")).unwrap(), "body {}");
    assert_eq!(fs::read_to_string(dist.join("robots.txt")).unwrap(), "User-agent: *");
    assert_eq!(
        fs::read_to_string(dist.join("assets/vendor.js")).unwrap(),
        ";(function() {\nvar lib;\n}());"
    );
}

#[test]
fn devel_build_injects_live_reload() {
    let dir = project();
    let root = dir.path();

    sprig_build(root)
        .arg("--devel")
        .arg("--output")
        .arg("out")
        .assert()
        .success();

    let html = fs::read_to_string(root.join("out/index.html")).unwrap();
    assert!(html.contains("livereload.js"));
    assert!(root.join("out/assets/vendor.js.map").exists());
}

#[test]
fn dry_run_writes_nothing() {
    let dir = project();
    let root = dir.path();

    sprig_build(root)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Preview"))
        .stdout(predicate::str::contains("robots.txt"));

    assert!(!root.join("dist").exists());
}

#[test]
fn clean_build_drops_stale_files() {
    let dir = project();
    let root = dir.path();
    write(root, "dist/stale.js", "old");

    sprig_build(root).arg("--clean").assert().success();

    assert!(!root.join("dist/stale.js").exists());
    assert!(root.join("dist/index.html").exists());
}

#[test]
fn missing_bower_packages_fail_the_build() {
    let dir = project();
    let root = dir.path();

    sprig_build(root)
        .arg("--set")
        .arg("vendor.bower=true")
        .assert()
        .failure()
        .stderr(predicate::str::contains("bower"));

    assert!(!root.join("dist").exists());
}

#[test]
fn clean_build_keeps_the_source_directory() {
    let dir = project();
    let root = dir.path();

    sprig_build(root)
        .arg("--clean")
        .arg("--output")
        .arg("app")
        .assert()
        .failure()
        .stderr(predicate::str::contains("sprig::output::clean_removes_project"));

    assert!(root.join("app/styles/app.css").exists());
    assert!(root.join("app/index.html").exists());
}

#[test]
fn unknown_transpiler_is_rejected() {
    let dir = project();

    sprig(dir.path())
        .arg("build")
        .arg("--transpiler")
        .arg("babel")
        .assert()
        .failure()
        .stderr(predicate::str::contains("babel"));
}
