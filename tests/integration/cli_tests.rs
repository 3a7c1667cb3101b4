//! Integration tests for the CLI binary.
//!
//! Runs `tcert` against a throwaway data directory. The passphrase comes
//! from TRAINCERT_PASSPHRASE so nothing prompts.
//!
//! This test is registered as a [[test]] in the traincert-cli crate so that
//! CARGO_BIN_EXE_tcert is available.

use std::path::Path;
use std::process::{Command, Output};

const PASSPHRASE: &str = "cli test passphrase";

/// Get a Command pointing to the `tcert` binary with a clean environment.
fn tcert(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tcert"));
    cmd.arg("--data-dir")
        .arg(dir)
        .env("TRAINCERT_PASSPHRASE", PASSPHRASE)
        .env_remove("TRAINCERT_HOME")
        .env_remove("TRAINCERT_USER")
        .env_remove("TRAINCERT_ROLE");
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    tcert(dir)
        .args(args)
        .output()
        .expect("failed to execute tcert")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn assert_ok(out: &Output, what: &str) {
    assert!(
        out.status.success(),
        "{what} should succeed, stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

#[test]
fn cli_responds_to_help() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["--help"]);
    assert_ok(&out, "tcert --help");
    let text = stdout(&out);
    assert!(
        text.contains("tcert") || text.contains("Usage"),
        "help output should contain usage information, got: {text}"
    );
}

#[test]
fn cli_responds_to_version() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["--version"]);
    assert_ok(&out, "tcert --version");
    assert!(stdout(&out).contains("0.3"));
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["--nonexistent-flag"]);
    assert!(!out.status.success());
}

#[test]
fn cli_init_then_pubkey() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("home");

    let out = run(&home, &["init"]);
    assert_ok(&out, "tcert init");
    assert!(stdout(&out).contains("ikey_"));
    assert!(home.join("issuer.key").exists());

    let out = run(&home, &["pubkey"]);
    assert_ok(&out, "tcert pubkey");
    assert!(stdout(&out).starts_with("ikey_"));

    // A second init must not replace the key.
    let out = run(&home, &["init"]);
    assert!(!out.status.success());
}

#[test]
fn cli_course_and_progress_flow() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path();
    assert_ok(&run(home, &["init"]), "init");

    assert_ok(
        &run(home, &["course", "create", "--slug", "forklift", "--title", "Forklift Safety"]),
        "course create",
    );
    for order in ["1", "2"] {
        let title = format!("Module {order}");
        assert_ok(
            &run(
                home,
                &[
                    "course", "add-module", "--course", "forklift", "--order", order, "--title",
                    &title, "--content-ref", "s3://content/m",
                ],
            ),
            "course add-module",
        );
    }

    let out = run(home, &["course", "modules", "--course", "forklift"]);
    assert_ok(&out, "course modules");
    let modules: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(modules.as_array().unwrap().len(), 2);

    let out = run(
        home,
        &[
            "--as", "alice", "--role", "learner", "step", "--course", "forklift", "--module", "1",
            "--step", "content_read",
        ],
    );
    assert_ok(&out, "step");
    assert!(stdout(&out).contains("Progress: 12%"));

    let out = run(
        home,
        &[
            "--as", "alice", "--role", "learner", "step", "--course", "forklift", "--module", "1",
            "--step", "napping",
        ],
    );
    assert!(!out.status.success());
}

#[test]
fn cli_learner_cannot_create_course() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path();
    assert_ok(&run(home, &["init"]), "init");

    let out = run(
        home,
        &["--as", "bob", "--role", "learner", "course", "create", "--slug", "x", "--title", "X"],
    );
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Forbidden"));
}

#[test]
fn cli_verify_unknown_code_fails() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path();
    assert_ok(&run(home, &["init"]), "init");

    let out = run(home, &["cert", "verify", "NOSUCHCODE000000"]);
    assert!(!out.status.success());
}

#[test]
fn cli_wrong_passphrase_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path();
    assert_ok(&run(home, &["init"]), "init");

    let out = tcert(home)
        .env("TRAINCERT_PASSPHRASE", "not the passphrase")
        .args(["course", "modules", "--course", "forklift"])
        .output()
        .expect("failed to execute tcert");
    assert!(!out.status.success());
}
