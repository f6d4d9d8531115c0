use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn tree(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (rel, content) in files {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    dir
}

fn ref_fixer(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ref-fixer"))
        .args(args)
        .arg("--dir")
        .arg(dir)
        .arg("--case-sensitive")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn read(dir: &TempDir, rel: &str) -> String {
    std::fs::read_to_string(dir.path().join(rel)).unwrap()
}

#[test]
fn detect_json_lists_broken_reference_with_candidate() {
    let dir = tree(&[("a.js", "import './b';\n"), ("util/b.ts", "export {};\n")]);
    let output = ref_fixer(dir.path(), &["detect", "--json"]);
    assert!(
        output.status.success(),
        "detect failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let broken = json["broken"].as_array().unwrap();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0]["target"], "b");
    assert_eq!(broken[0]["candidates"][0]["path"], "util/b.ts");
    assert_eq!(json["diagnostics"]["auto_resolvable"], 1);
}

#[test]
fn apply_without_write_is_a_dry_run() {
    let dir = tree(&[("a.js", "import './b';\n"), ("util/b.ts", "")]);
    let output = ref_fixer(dir.path(), &["apply"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Would update:"), "unexpected output: {out}");
    assert!(out.contains("./util/b"), "unexpected output: {out}");
    assert_eq!(read(&dir, "a.js"), "import './b';\n");
}

#[test]
fn apply_write_fixes_auto_resolvable_references() {
    let dir = tree(&[("a.js", "import './b';\n"), ("util/b.ts", "")]);
    let output = ref_fixer(dir.path(), &["apply", "--write"]);
    assert!(output.status.success());
    assert_eq!(read(&dir, "a.js"), "import './util/b';\n");

    let again = ref_fixer(dir.path(), &["detect"]);
    assert!(stdout(&again).contains("No broken references found"));
}

#[test]
fn ambiguous_reference_is_skipped_without_a_decision() {
    let source = "import s from './shared.js';\n";
    let dir = tree(&[
        ("app.js", source),
        ("lib/shared.js", ""),
        ("legacy/shared.js", ""),
    ]);
    let output = ref_fixer(dir.path(), &["apply", "--write"]);
    assert!(output.status.success());
    assert_eq!(read(&dir, "app.js"), source);

    let output = ref_fixer(dir.path(), &["apply", "--write", "--prefer", "lib"]);
    assert!(output.status.success());
    assert_eq!(read(&dir, "app.js"), "import s from './lib/shared.js';\n");
}

#[test]
fn link_mode_leaves_unfixable_links_alone() {
    let html = "<a href=\"missing.html\">gone</a>\n";
    let dir = tree(&[("x.html", html), ("y.html", html)]);
    let output = ref_fixer(dir.path(), &["apply", "--mode", "html", "--write"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No changes to apply"));
    assert_eq!(read(&dir, "x.html"), html);
    assert_eq!(read(&dir, "y.html"), html);
}

#[test]
fn scan_lists_source_files_and_honors_excludes() {
    let dir = tree(&[
        ("src/a.js", ""),
        ("test/a.test.js", ""),
        ("node_modules/pkg/index.js", ""),
        ("README.md", ""),
    ]);
    let output = ref_fixer(dir.path(), &["scan", "--exclude", "test"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Would scan 1 of 2 files"), "unexpected output: {out}");
    assert!(out.contains("a.js"));
    assert!(!out.contains("index.js"));
}

#[test]
fn missing_working_directory_fails() {
    let dir = TempDir::new().unwrap();
    let output = ref_fixer(&dir.path().join("absent"), &["detect"]);
    assert!(!output.status.success());
}
