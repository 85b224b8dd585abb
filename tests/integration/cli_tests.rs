//! Integration tests for the CLI binary.
//!
//! Drives the `skp` binary against a temporary data directory: authoring,
//! activity recording, credential listing and verification.
//!
//! This test is registered as a [[test]] in the skill-progression-cli crate
//! so that CARGO_BIN_EXE_skp is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `skp` binary.
fn skp_binary() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_skp"));
    cmd.env_remove("SKP_SERVICE_SECRET");
    cmd
}

/// Run `skp --data-dir DIR ARGS...`.
fn skp(dir: &Path, args: &[&str]) -> Output {
    skp_binary()
        .arg("--data-dir")
        .arg(dir)
        .args(args)
        .output()
        .expect("failed to execute skp")
}

fn assert_ok(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{what} should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Initialise a data dir with a two-node course, one badge, and one
/// certification requiring it.
fn seeded_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    assert_ok(&skp(path, &["init", "--secret", "cli-test-secret"]), "init");
    assert_ok(
        &skp(
            path,
            &[
                "course", "add-node", "--id", "intro", "--course", "rust", "--kind", "video",
                "--title", "Intro", "--order", "1",
            ],
        ),
        "add-node intro",
    );
    assert_ok(
        &skp(
            path,
            &[
                "course", "add-node", "--id", "exam", "--course", "rust", "--kind", "assessment",
                "--title", "Final", "--order", "2", "--threshold", "70", "--final-exam",
            ],
        ),
        "add-node exam",
    );
    assert_ok(
        &skp(
            path,
            &["course", "add-edge", "--from", "intro", "--to", "exam"],
        ),
        "add-edge",
    );

    let badge = path.join("badge.json");
    std::fs::write(
        &badge,
        r#"{
            "id": "rustacean",
            "name": "Rustacean",
            "criteria": { "kind": "AssessmentScore", "params": { "min_score": 70.0 } },
            "level": "Advanced"
        }"#,
    )
    .unwrap();
    assert_ok(
        &skp(path, &["badge", "define", badge.to_str().unwrap()]),
        "badge define",
    );

    let cert = path.join("cert.json");
    std::fs::write(
        &cert,
        r#"{
            "id": "rust-dev",
            "name": "Rust Developer",
            "course": "rust",
            "badges": [ { "badge": "rustacean" } ],
            "issuing_authority": "Crate Academy"
        }"#,
    )
    .unwrap();
    assert_ok(
        &skp(path, &["cert", "define", cert.to_str().unwrap()]),
        "cert define",
    );

    dir
}

fn verification_code(dir: &Path, learner: &str) -> String {
    let output = skp(dir, &["--json", "credentials", "--learner", learner]);
    assert_ok(&output, "credentials");
    let creds: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    creds["certifications"][0]["verification_code"]
        .as_str()
        .expect("a certification should be held")
        .to_string()
}

#[test]
fn cli_responds_to_help() {
    let output = skp_binary()
        .arg("--help")
        .output()
        .expect("failed to execute skp --help");

    assert!(
        output.status.success(),
        "skp --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("skp") || stdout.contains("SkillProgression") || stdout.contains("Usage"),
        "skp --help output should contain usage information, got: {stdout}"
    );
}

#[test]
fn cli_responds_to_version() {
    let output = skp_binary()
        .arg("--version")
        .output()
        .expect("failed to execute skp --version");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("0.3") || stdout.contains("skp"),
        "skp --version should contain version info, got: {stdout}"
    );
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = skp_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute skp");

    assert!(
        !output.status.success(),
        "skp with unknown flag should exit with error"
    );
}

#[test]
fn cli_requires_init() {
    let dir = tempfile::tempdir().unwrap();
    let output = skp(dir.path(), &["credentials", "--learner", "nobody"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"), "got: {stderr}");
}

#[test]
fn cli_rejects_locked_node() {
    let dir = seeded_dir();
    let output = skp(
        dir.path(),
        &["record", "--learner", "ana", "--node", "exam", "--score", "90"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("locked"), "got: {stderr}");
}

#[test]
fn cli_full_flow_issues_and_verifies_certificate() {
    let dir = seeded_dir();
    let path = dir.path();

    assert_ok(
        &skp(path, &["record", "--learner", "ana", "--node", "intro", "--percent", "90"]),
        "record intro",
    );
    let output = skp(path, &["record", "--learner", "ana", "--node", "exam", "--score", "85"]);
    assert_ok(&output, "record exam");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("completed"), "got: {stdout}");
    assert!(stdout.contains("Certification earned"), "got: {stdout}");

    let status = skp(path, &["--json", "status", "--learner", "ana", "--course", "rust"]);
    assert_ok(&status, "status");
    let status: serde_json::Value = serde_json::from_slice(&status.stdout).unwrap();
    assert_eq!(status["overall_progress"], 100);

    let code = verification_code(path, "ana");
    let verify = skp(path, &["--json", "verify", &code]);
    assert_ok(&verify, "verify");
    let result: serde_json::Value = serde_json::from_slice(&verify.stdout).unwrap();
    assert_eq!(result["valid"], true);
    assert_eq!(result["certification_name"], "Rust Developer");
    assert_eq!(result["holder"], "ana");

    let ledger = skp(path, &["--json", "ledger", "--learner", "ana"]);
    assert_ok(&ledger, "ledger");
    let events: serde_json::Value = serde_json::from_slice(&ledger.stdout).unwrap();
    assert_eq!(events.as_array().map(Vec::len), Some(4));
}

#[test]
fn cli_tampered_code_is_invalid() {
    let dir = seeded_dir();
    let path = dir.path();
    assert_ok(
        &skp(path, &["record", "--learner", "ben", "--node", "intro", "--percent", "100"]),
        "record intro",
    );
    assert_ok(
        &skp(path, &["record", "--learner", "ben", "--node", "exam", "--score", "99"]),
        "record exam",
    );

    let mut code = verification_code(path, "ben");
    let last = code.pop().unwrap();
    code.push(if last == 'z' { 'y' } else { 'z' });

    let output = skp(path, &["verify", &code]);
    assert_ok(&output, "verify");
    assert!(String::from_utf8_lossy(&output.stdout).contains("INVALID"));
}

#[test]
fn cli_revoke_certification() {
    let dir = seeded_dir();
    let path = dir.path();
    assert_ok(
        &skp(path, &["record", "--learner", "cy", "--node", "intro", "--percent", "100"]),
        "record intro",
    );
    assert_ok(
        &skp(path, &["record", "--learner", "cy", "--node", "exam", "--score", "99"]),
        "record exam",
    );

    let output = skp(path, &["--json", "credentials", "--learner", "cy"]);
    let creds: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = creds["certifications"][0]["id"].as_str().unwrap().to_string();
    let code = creds["certifications"][0]["verification_code"]
        .as_str()
        .unwrap()
        .to_string();

    assert_ok(
        &skp(path, &["revoke", "cert", &id, "--reason", "exam leak"]),
        "revoke",
    );
    let verify = skp(path, &["--json", "verify", &code]);
    let result: serde_json::Value = serde_json::from_slice(&verify.stdout).unwrap();
    assert_eq!(result["valid"], false);
    assert_eq!(result["status"], "Revoked");

    // A second revocation has nothing Active to act on.
    assert!(!skp(path, &["revoke", "cert", &id, "--reason", "again"])
        .status
        .success());
}

#[test]
fn cli_cycle_is_rejected() {
    let dir = seeded_dir();
    let output = skp(
        dir.path(),
        &["course", "add-edge", "--from", "exam", "--to", "intro"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cycle"), "got: {stderr}");
}
