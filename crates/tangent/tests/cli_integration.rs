//! CLI integration tests for the Tangent command-line interface.
//!
//! These tests verify help text, argument parsing, and the tools listing.
//! No provider credentials or network access are required.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a command for the tangent binary.
fn tangent() -> Command {
    Command::cargo_bin("tangent").unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    tangent()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tangent"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("tools"));
}

#[test]
fn test_version_displays() {
    tangent()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tangent"));
}

#[test]
fn test_chat_requires_message() {
    tangent()
        .arg("chat")
        .assert()
        .failure()
        .stderr(predicate::str::contains("MESSAGE"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    tangent()
        .arg("teleport")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools Listing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_tools_lists_builtins() {
    tangent()
        .arg("tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("builtin:calculator"))
        .stdout(predicate::str::contains("web_fetch"))
        .stdout(predicate::str::contains("standard profile"));
}

#[test]
fn test_tools_json_output() {
    tangent()
        .args(["tools", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"input_schema\""));
}

#[test]
fn test_chat_rejects_unknown_provider() {
    tangent()
        .args(["chat", "hello", "--provider", "mystery"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown provider"));
}
