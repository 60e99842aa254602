//! CLI integration tests for cup run / repl / parse / tokens.
//!
//! These tests invoke the compiled binary to verify end-to-end behavior.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn cup_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cup"))
}

fn write_source(dir: &tempfile::TempDir, name: &str, src: &str) -> PathBuf {
    let file = dir.path().join(name);
    std::fs::write(&file, src).expect("write source");
    file
}

fn run(args: &[&str]) -> Output {
    cup_bin().args(args).output().expect("run binary")
}

fn repl(input: &str) -> Output {
    let mut child = cup_bin()
        .arg("repl")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn repl");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait for repl")
}

#[test]
fn cli_run_prints_program_value() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(&dir, "simple.cup", "1 + 2 * 3\n");

    let output = run(&["run", file.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "cup run should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout), "7\n");
}

#[test]
fn cli_run_null_prints_nothing() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(&dir, "say.u", "say('hi')\n");

    let output = run(&["run", file.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hi\n");
}

#[test]
fn cli_run_json_format() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(&dir, "list.cp", "[1, 'a', null]\n");

    let output = run(&["run", file.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), r#"[1,"a",null]"#);
}

#[test]
fn cli_run_rejects_unknown_extension() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(&dir, "prog.txt", "1\n");

    let output = run(&["run", file.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid file type"), "stderr: {stderr}");
}

#[test]
fn cli_run_renders_syntax_error_with_caret() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(&dir, "bad.cup", "x = (1 + 2\n");

    let output = run(&["run", file.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(
            "Syntax error: Expected RPAREN, got NEWLINE at line 1, column 11\nx = (1 + 2\n          ^"
        ),
        "stderr: {stderr}"
    );
}

#[test]
fn cli_run_reports_runtime_error() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(&dir, "err.cup", "x = 1\ny\n");

    let output = run(&["run", file.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("NameError: Name \"y\" is not defined"),
        "stderr: {stderr}"
    );
}

#[test]
fn cli_run_missing_file() {
    let output = run(&["run", "/definitely/not/here.cup"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read source file"), "stderr: {stderr}");
}

#[test]
fn cli_parse_json_dump() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(&dir, "fn.cup", "let f(a):\n  return a\n");

    let output = run(&["parse", file.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("parse output is JSON");
    assert!(json["body"][0].get("Function").is_some(), "json: {json}");
}

#[test]
fn cli_tokens_dump() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(&dir, "t.cup", "x = 1\n");

    let output = run(&["tokens", file.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let kinds: Vec<_> = stdout
        .lines()
        .filter_map(|l| l.split('\t').nth(1))
        .collect();
    assert_eq!(kinds, ["NAME", "ASSIGN", "NUMBER", "NEWLINE"]);
    assert!(stdout.starts_with("1:1\tNAME\tx\n1:3\tASSIGN\t=\n1:5\tNUMBER\t1\n"), "stdout: {stdout}");
}

#[test]
fn repl_keeps_bindings_and_survives_errors() {
    let output = repl("x = 2\nnope\nx * 21\nexit()\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("42"), "stdout: {stdout}");
    assert!(stderr.contains("NameError"), "stderr: {stderr}");
}

#[test]
fn repl_reads_blocks_until_empty_line() {
    let output = repl("let f():\n  return 7\n\nf()\nexit()\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[...] "), "stdout: {stdout}");
    assert!(stdout.contains("7\n"), "stdout: {stdout}");
}
