//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `ang` binary against temporary projects
//! scaffolded with `ang init`, and verifies exit codes, stdout and stderr.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn ang(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("ang");
    cmd.current_dir(cwd);
    cmd.env_remove("ANG_FRONTEND_TSC");
    cmd.env_remove("ANG_PY_SDK");
    cmd
}

/// A freshly initialized project in a temp dir.
fn scaffold() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    ang(dir.path())
        .args(["init", ".", "--name", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Project structure initialized successfully."));
    dir
}

// ──────────────────────────────────────────────
// 1. Version, explain, hash
// ──────────────────────────────────────────────

#[test]
fn version_reports_compiler_and_schema() {
    let dir = tempfile::tempdir().unwrap();
    ang(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ANG version ").and(predicate::str::contains("(Schema v1)")));
}

#[test]
fn explain_known_code() {
    let dir = tempfile::tempdir().unwrap();
    ang(dir.path())
        .args(["explain", "missing_output"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Missing output variable in repo.Find/repo.List"));
}

#[test]
fn explain_unknown_code_fails() {
    let dir = tempfile::tempdir().unwrap();
    ang(dir.path())
        .args(["explain", "no_such_thing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown code: NO_SUCH_THING"));
    ang(dir.path())
        .arg("explain")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: ang explain <CODE>"));
}

#[test]
fn hash_is_stable_hex() {
    let dir = scaffold();
    let first = ang(dir.path()).args(["hash", "."]).output().unwrap();
    let second = ang(dir.path()).args(["hash", "."]).output().unwrap();
    assert!(first.status.success());
    let hash = String::from_utf8(first.stdout.clone()).unwrap();
    assert_eq!(hash.trim().len(), 64);
    assert_eq!(first.stdout, second.stdout);
}

// ──────────────────────────────────────────────
// 2. Init and validate
// ──────────────────────────────────────────────

#[test]
fn init_refuses_non_empty_dir_without_force() {
    let dir = scaffold();
    ang(dir.path())
        .args(["init", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not empty (use --force to continue)"));
    ang(dir.path()).args(["init", ".", "--force"]).assert().success();
}

#[test]
fn scaffold_validates() {
    let dir = scaffold();
    ang(dir.path())
        .args(["validate", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation SUCCESSFUL."));
}

#[test]
fn broken_intent_fails_validation() {
    let dir = scaffold();
    fs::write(dir.path().join("cue/domain/order.json"), "{Order: {fields: ").unwrap();
    ang(dir.path())
        .args(["validate", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation FAILED"));
}

#[test]
fn lint_json_report() {
    let dir = scaffold();
    let out = ang(dir.path()).args(["lint", ".", "--json"]).output().unwrap();
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["ok"], true);
}

// ──────────────────────────────────────────────
// 3. Build
// ──────────────────────────────────────────────

#[test]
fn dry_run_prints_manifest_and_writes_nothing() {
    let dir = scaffold();
    ang(dir.path())
        .args(["build", ".", "--dry-run"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"status\": \"dry_run\"")
                .and(predicate::str::contains("mcp_generation"))
                .and(predicate::str::contains("Build DRY-RUN SUCCESSFUL.")),
        );
    assert!(!dir.path().join("cmd").exists());
    assert!(!dir.path().join(".ang/cache/manifest.json").exists());
}

#[test]
fn in_place_build_writes_code_and_manifest() {
    let dir = scaffold();
    ang(dir.path())
        .args(["build", "."])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Generating target api (go/chi/postgres)")
                .and(predicate::str::contains("Build SUCCESSFUL."))
                .and(predicate::str::contains("  - target=api mode=in_place")),
        );
    assert!(dir.path().join("cmd/server/main.go").is_file());
    assert!(dir.path().join(".ang/cache/manifest.json").is_file());
}

#[test]
fn json_build_log_is_one_event_per_line() {
    let dir = scaffold();
    let out = ang(dir.path())
        .args(["build", ".", "--log-format", "json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(events[0]["stage"], "build");
    assert_eq!(events[0]["status"], "start");
    assert!(events.iter().any(|e| e["stage"] == "step" && e["target"] == "api"));
    let last = events.last().unwrap();
    assert_eq!(last["status"], "ok");
    assert_eq!(last["message"], "Build successful");
    assert!(events.iter().all(|e| e["ts"].is_string()));
}

#[test]
fn failed_build_emits_error_event() {
    let dir = scaffold();
    fs::write(dir.path().join("cue/domain/order.json"), "{Order: [").unwrap();
    let out = ang(dir.path())
        .args(["build", ".", "--log-format", "json"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let last: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(last["status"], "error");
    assert_eq!(last["stage"], "CUE");
}

#[test]
fn unknown_build_mode_is_rejected() {
    let dir = scaffold();
    ang(dir.path())
        .args(["build", ".", "--mode", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Build FAILED: EMITTERS:EMITTER_OPTIONS_ERROR"));
}

// ──────────────────────────────────────────────
// 4. Audits and generators
// ──────────────────────────────────────────────

#[test]
fn vet_passes_on_scaffold() {
    let dir = scaffold();
    ang(dir.path())
        .args(["vet", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("All architectural laws are satisfied."));
}

#[test]
fn rbac_actions_lists_methods() {
    let dir = scaffold();
    ang(dir.path())
        .args(["rbac", "actions", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("orders.getorder"));
}

#[test]
fn events_map_without_events() {
    let dir = scaffold();
    ang(dir.path())
        .args(["events", "map", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("No event publishers or subscribers found"));
}

#[test]
fn draw_writes_mermaid() {
    let dir = scaffold();
    ang(dir.path())
        .args(["draw", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("Draw SUCCESSFUL."));
    assert!(dir.path().join("docs/architecture.mmd").is_file());
    assert!(dir.path().join("docs/erd.mmd").is_file());
}

#[test]
fn mcp_writes_tool_definitions() {
    let dir = scaffold();
    ang(dir.path()).args(["mcp", "."]).assert().success();
    let tools: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("mcp/tools.json")).unwrap()).unwrap();
    assert!(tools.is_object() || tools.is_array());
}

#[test]
fn test_gen_writes_flow_cases() {
    let dir = scaffold();
    ang(dir.path()).args(["test", "gen", "."]).assert().success();
    let doc: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("tests/generated/flow_cases.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(doc["manifest"]["generator"], "ang test gen");
    assert!(doc["cases"].is_array());
}

// ──────────────────────────────────────────────
// 5. Doctor, api-diff, lsp
// ──────────────────────────────────────────────

#[test]
fn doctor_analyzes_inline_log() {
    let dir = tempfile::tempdir().unwrap();
    let out = ang(dir.path())
        .args(["doctor", "--log", "Build FAILED: CUE:CUE_PIPELINE_ERROR:run pipeline: boom"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let resp: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(resp["status"], "Analyzed");
    assert_eq!(resp["detected_codes"][0], "CUE_PIPELINE_ERROR");
    assert!(dir.path().join(".ang/doctor_state.json").is_file());
}

#[test]
fn doctor_without_log_fails() {
    let dir = tempfile::tempdir().unwrap();
    ang(dir.path())
        .args(["doctor", "--stdin"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Doctor FAILED: cannot read ang-build.log"));
}

const BASE_API: &str = "openapi: 3.0.3
paths:
  /orders:
    get: {}
  /orders/{id}:
    get: {}
";

const CURRENT_API: &str = "openapi: 3.0.3
paths:
  /orders:
    get: {}
";

#[test]
fn api_diff_flags_removed_endpoint_as_major() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("api")).unwrap();
    fs::write(dir.path().join("api/openapi.base.yaml"), BASE_API).unwrap();
    fs::write(dir.path().join("api/openapi.yaml"), CURRENT_API).unwrap();
    ang(dir.path())
        .arg("api-diff")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Removed endpoint: get /orders/{id}")
                .and(predicate::str::contains("Recommended semver bump: major")),
        );

    ang(dir.path())
        .args(["api-diff", "--write-base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Baseline written to api/openapi.base.yaml"));
    assert_eq!(
        fs::read_to_string(dir.path().join("api/openapi.base.yaml")).unwrap(),
        CURRENT_API
    );
}

#[test]
fn lsp_requires_stdio() {
    let dir = tempfile::tempdir().unwrap();
    ang(dir.path())
        .arg("lsp")
        .assert()
        .failure()
        .stderr(predicate::str::contains("only --stdio mode is supported"));
}
