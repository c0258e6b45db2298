//! Integration tests for basic CLI behavior.
//!
//! Tests that the binary exists, accepts standard flags, and each subcommand
//! responds to `--help` and to small inputs with appropriate text.

#![allow(deprecated)] // cargo_bin deprecation, replacement not yet stable

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper: get a Command for the `readorder` binary.
fn readorder() -> Command {
    Command::cargo_bin("readorder").expect("binary 'readorder' should be built")
}

fn page(body: &str) -> String {
    format!("<html><head><title>t</title></head><body>{body}</body></html>")
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    readorder()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: readorder"))
        .stdout(predicate::str::contains("file"))
        .stdout(predicate::str::contains("folder"))
        .stdout(predicate::str::contains("text"));
}

#[test]
fn version_flag_shows_semver() {
    readorder()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^readorder \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_args_shows_error_and_usage() {
    readorder()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: readorder"));
}

#[test]
fn invalid_subcommand_fails() {
    readorder()
        .arg("this-is-not-a-real-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn file_help() {
    readorder()
        .args(["file", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--no-patch"));
}

#[test]
fn folder_help() {
    readorder()
        .args(["folder", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Input folder"));
}

#[test]
fn text_help() {
    readorder()
        .args(["text", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--markup"));
}

// ─── Running ─────────────────────────────────────────────────────────────────

#[test]
fn text_prints_linearized_page() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("page.xhtml");
    fs::write(&path, page("<p>1. Red</p><p>2. Green</p><p>Done. 12</p>")).unwrap();

    readorder()
        .arg("text")
        .arg(&path)
        .assert()
        .success()
        .stdout("1. Red\n2. Green\n\nDone.\n\nPage Number 12\n");
}

#[test]
fn text_markup_prints_footer_landmark() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("page.xhtml");
    fs::write(&path, page("<p>Done. 12</p>")).unwrap();

    readorder()
        .args(["text", "--markup"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"<footer role="contentinfo""#));
}

#[test]
fn text_missing_file_fails() {
    readorder()
        .args(["text", "/definitely/not/here.xhtml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn file_without_patch_reports_outputs() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let path = dir.path().join("page.xhtml");
    let source = page("<p>Hello there.</p>");
    fs::write(&path, &source).unwrap();

    readorder()
        .args(["file", "--no-patch", "-o"])
        .arg(&out)
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("patching disabled"))
        .stdout(predicate::str::contains("Page: (none)"));

    assert!(out.join("page-reading-order.html").exists());
    assert_eq!(
        fs::read_to_string(out.join("page-reading-order.txt")).unwrap(),
        "Hello there.\n"
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), source);
}

#[test]
fn folder_without_sources_says_so() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.txt"), "nothing").unwrap();

    readorder()
        .arg("folder")
        .arg(dir.path())
        .arg("-o")
        .arg(dir.path().join("out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No .html or .xhtml files"));
}
