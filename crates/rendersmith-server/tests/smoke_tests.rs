//! Smoke tests for the rendersmith binary
//!
//! None of these start a browser or the video toolchain.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn rendersmith() -> Command {
    let mut cmd = Command::cargo_bin("rendersmith").expect("rendersmith binary should exist");
    cmd.env_remove("RENDER_SERVICE_KEY")
        .env_remove("RENDERSMITH_PORT")
        .env_remove("RENDERSMITH_LOG_FORMAT");
    cmd
}

// ============================================================================
// Basic CLI
// ============================================================================

#[test]
fn test_version_flag() {
    rendersmith()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_lists_commands() {
    rendersmith()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("video"));
}

#[test]
fn test_no_args_fails() {
    rendersmith().assert().failure();
}

#[test]
fn test_serve_help_documents_env() {
    rendersmith()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RENDERSMITH_PORT"))
        .stdout(predicate::str::contains("RENDER_SERVICE_KEY"))
        .stdout(predicate::str::contains("--max-batch"));
}

#[test]
fn test_serve_help_explains_offline_runtime() {
    rendersmith()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--runtime-url"))
        .stdout(predicate::str::contains("RENDERSMITH_RUNTIME_URL"))
        .stdout(predicate::str::contains("cdn.jsdelivr.net"));
}

// ============================================================================
// Argument validation
// ============================================================================

#[test]
fn test_serve_rejects_bad_port() {
    rendersmith()
        .args(["serve", "--port", "not-a-port"])
        .assert()
        .failure();
}

#[test]
fn test_serve_rejects_zero_batch() {
    rendersmith()
        .args(["serve", "--max-batch", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max-batch"));
}

#[test]
fn test_video_rejects_unknown_codec() {
    rendersmith()
        .args(["video", "ServiceHero", "p.json", "o.mp4", "--codec", "av1"])
        .assert()
        .failure();
}

// ============================================================================
// Video command
// ============================================================================

#[test]
fn test_video_unknown_composition() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.mp4");

    rendersmith()
        .arg("video")
        .arg("../../etc/passwd")
        .arg(dir.path().join("props.json"))
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown composition"));

    assert!(!output.exists());
}

#[test]
fn test_video_missing_props_file() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.mp4");

    rendersmith()
        .arg("video")
        .arg("BrandedStatic")
        .arg(dir.path().join("missing.json"))
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read props file"));

    assert!(!output.exists());
}

#[test]
fn test_video_props_must_be_object() {
    let dir = TempDir::new().unwrap();
    let props = dir.path().join("props.json");
    fs::write(&props, "[1, 2, 3]").unwrap();

    rendersmith()
        .arg("video")
        .arg("ServiceHero")
        .arg(&props)
        .arg(dir.path().join("out.mp4"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("input_props"));
}
