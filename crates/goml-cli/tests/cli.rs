use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;

const PAGE: &str = "package views\n\nfunc Title(e element, s string) {\n\t<h1(.title)> { ~ s }\n}\n";
const PAGE_GO: &str = "package views\n\nfunc Title(e element, s string) {\n\te.AppendElement(\"h1\", attributes{\".title\": true}, func(e element) { e.AppendTextNode(s) })\n}\n";
const BROKEN: &str = "package p\nfunc f() {\n\t<div\n}\n";

#[test]
fn fragment_from_stdin_to_stdout() {
    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg("--fragment").write_stdin("<br>\n~ name\n");
    cmd.assert()
        .success()
        .stdout("e.AppendElement(\"br\", nil, nil)\ne.AppendTextNode(name)\n");
}

#[test]
fn file_is_written_without_its_extension() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("title.go.goml");
    fs::write(&input, PAGE).unwrap();

    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg(&input);
    cmd.assert().success();

    let out = fs::read_to_string(dir.path().join("title.go")).unwrap();
    assert_eq!(out, PAGE_GO);
}

#[test]
fn directory_inputs_use_configured_extension() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.go.goml"), PAGE).unwrap();
    fs::write(dir.path().join("b.go.goml"), PAGE).unwrap();
    fs::write(dir.path().join("notes.txt"), "not markup").unwrap();
    let out_dir = dir.path().join("out");

    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg(dir.path()).arg("--output").arg(&out_dir);
    cmd.assert().success();

    assert_eq!(fs::read_to_string(out_dir.join("a.go")).unwrap(), PAGE_GO);
    assert_eq!(fs::read_to_string(out_dir.join("b.go")).unwrap(), PAGE_GO);
    assert!(!out_dir.join("notes").exists());
}

#[test]
fn syntax_errors_are_printed_and_stop_processing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.go.goml"), BROKEN).unwrap();
    fs::write(dir.path().join("b.go.goml"), PAGE).unwrap();

    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg(dir.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("a.go.goml:3:6: expected '>', found newline"));

    assert!(!dir.path().join("a.go").exists());
    assert!(!dir.path().join("b.go").exists());
}

#[test]
fn check_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("title.go.goml");
    fs::write(&input, PAGE).unwrap();

    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg("--check").arg(&input);
    cmd.assert().success().stdout("");
    assert!(!dir.path().join("title.go").exists());
}

#[test]
fn check_reports_errors_from_stdin() {
    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg("--check").write_stdin(BROKEN);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("<stdin>:3:6: expected '>', found newline"));
}

#[test]
fn input_without_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("title");
    fs::write(&input, PAGE).unwrap();

    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg(&input);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("input has no extension"));
}

#[test]
fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg(dir.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no .goml files found"));
}

#[test]
fn config_file_renames_builder_calls() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("goml.toml");
    fs::write(
        &config,
        "[parser]\nfragment = true\n\n[markup]\nbuilder = \"doc\"\nappend_text = \"Text\"\n",
    )
    .unwrap();

    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg("--config").arg(&config).write_stdin("~ \"hi\"\n");
    cmd.assert().success().stdout("doc.Text(\"hi\")\n");
}

#[test]
fn bad_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("goml.toml");
    fs::write(&config, "[printer]\nuse_spaces = 3\n").unwrap();

    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg("--config").arg(&config).write_stdin("");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("config"));
}

#[test]
fn explicit_inputs_run_in_the_order_given() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("b.goml");
    let second = dir.path().join("a.goml");
    fs::write(&first, BROKEN).unwrap();
    fs::write(&second, PAGE).unwrap();

    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg(&first).arg(&second);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("b.goml:3:6: expected '>', found newline"));

    assert!(!dir.path().join("b.go").exists());
    assert!(!dir.path().join("a.go").exists());
}

#[test]
fn goml_extension_becomes_go() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("title.goml");
    fs::write(&input, PAGE).unwrap();

    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg(&input);
    cmd.assert().success();

    assert_eq!(fs::read_to_string(dir.path().join("title.go")).unwrap(), PAGE_GO);
}

#[test]
fn missing_input_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = cargo_bin_cmd!("goml");
    cmd.arg(dir.path().join("absent.goml"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("absent.goml"));
}
