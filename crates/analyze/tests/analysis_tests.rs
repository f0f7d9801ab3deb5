//! Analyses run over a project compiled by the real pipeline.

use std::path::Path;

use ang_analyze::{
    event_findings, events_map, generate_flow_cases, inspect_rbac, vet, Doctor, FindingSeverity,
};
use ang_core::diagnostic::Warning;
use ang_core::pipeline::{Snippet, SnippetChecker};
use ang_core::{run_with_options, PipelineOptions, PipelineOutput};

struct NoSnippets;

impl SnippetChecker for NoSnippets {
    fn check(&self, _snippet: &Snippet<'_>) -> Vec<Warning> {
        Vec::new()
    }
}

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

fn shop(root: &Path) {
    write(
        root,
        "cue/domain/user.json",
        r#"{
  User: {fields: {id: "string", email: "string", status: "string"}},
  Session: {fields: {token: "string"}},
}"#,
    );
    write(
        root,
        "cue/architecture/auth.json",
        r#"{
  Auth: {
    methods: {
      Login: {
        input: {email: "string"},
        output: {token: "string"},
        flow: [
          {action: "repo.Find", source: "User", input: "req.Email", output: "user", error: "User not found"},
          {action: "logic.Check", condition: "user.Status == \"active\"", throw: "Access denied"},
          {action: "flow.If", condition: "user.Status == \"new\"", _then: [
            {action: "logic.Check", condition: "req.Email != \"\"", throw: "Email required"},
          ]},
          {action: "mapping.Assign", to: "resp.Token", value: "user.ID"},
          {action: "event.Publish", name: "UserLoggedIn"},
        ],
      },
    },
  },
  Audit: {
    subscribes: {UserLoggedIn: "OnLogin"},
    methods: {OnLogin: {}},
  },
}"#,
    );
    write(
        root,
        "cue/api/http.json",
        r#"{
  endpoints: [{method: "POST", path: "/auth/login", service: "Auth", rpc: "Login"}],
  events: {UserLoggedIn: {fields: {userId: "string"}}, PaymentSettled: {external: true}},
}"#,
    );
    write(
        root,
        "cue/rbac/policies.json",
        r#"{
  roles: {admin: ["auth.login"]},
  permissions: {"auth.login": "sign in", "billing.refund": "refund payments"},
  validation_errors: {admin_scope: "admin role grants no write permission"},
}"#,
    );
    write(
        root,
        "cue/project/project.json",
        r#"{project: {name: "shop"}, targets: [{lang: "go", framework: "chi", db: "postgres"}]}"#,
    );
}

fn compile(root: &Path) -> PipelineOutput {
    let opts = PipelineOptions {
        snippet_checker: Some(Box::new(NoSnippets)),
        ..PipelineOptions::default()
    };
    run_with_options(root, opts).unwrap_or_else(|e| panic!("pipeline failed: {}", e))
}

// ── Test generation ─────────────────────────────────────────────────────────

#[test]
fn flow_cases_cover_checks_branches_and_lookups() {
    let dir = tempfile::tempdir().unwrap();
    shop(dir.path());
    let out = compile(dir.path());

    let doc = generate_flow_cases(&out.schema, dir.path(), Path::new("tests/generated/flow_cases.json"));
    let ids: Vec<&str> = doc.cases.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "Auth.Login.flow_if_else.3",
            "Auth.Login.flow_if_then.3",
            "Auth.Login.logic_check.1",
            "Auth.Login.logic_check.2",
            "Auth.Login.repo_not_found.1",
        ]
    );
    let denied = doc.cases.iter().find(|c| c.id == "Auth.Login.logic_check.2").unwrap();
    assert_eq!(denied.expected_status, Some(403));
    assert_eq!(denied.endpoint_path, "/auth/login");
    assert_eq!(denied.step_file, "cue/architecture/auth.json");
    assert_eq!(doc.manifest.cases, 5);
    assert_eq!(doc.manifest.cases_by_kind["logic_check"], 2);

    let target = dir.path().join("tests/generated/flow_cases.json");
    doc.write(&target).unwrap();
    let back: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(target).unwrap()).unwrap();
    assert_eq!(back["manifest"]["generator"], "ang test gen");
}

// ── Audits ──────────────────────────────────────────────────────────────────

#[test]
fn vet_reports_policy_violations_and_missing_ids() {
    let dir = tempfile::tempdir().unwrap();
    shop(dir.path());
    let out = compile(dir.path());

    let findings = vet(&out);
    assert_eq!(findings[0].check, "policy");
    assert_eq!(findings[0].message, "admin_scope: admin role grants no write permission");
    assert!(findings
        .iter()
        .any(|f| f.message == "Entity 'Session' has no 'id' field."));
    assert!(findings.iter().all(|f| f.severity == FindingSeverity::Error));
}

#[test]
fn rbac_inspect_finds_unprotected_methods_and_zombies() {
    let dir = tempfile::tempdir().unwrap();
    shop(dir.path());
    let audit = inspect_rbac(&compile(dir.path()).schema);
    assert!(audit.has_policies);
    assert_eq!(audit.protected, vec!["auth.login"]);
    assert_eq!(audit.unprotected, vec!["audit.onlogin"]);
    assert_eq!(audit.zombies, vec!["billing.refund"]);
}

#[test]
fn events_map_joins_publish_steps_with_subscribers() {
    let dir = tempfile::tempdir().unwrap();
    shop(dir.path());
    let out = compile(dir.path());

    let flows = events_map(&out.schema);
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].event, "UserLoggedIn");
    assert_eq!(flows[0].producers, vec!["Auth.Login"]);
    assert_eq!(flows[0].consumers[0].service, "Audit");
    assert!(event_findings(&out.schema, &flows).is_empty());
}

// ── Doctor ──────────────────────────────────────────────────────────────────

#[test]
fn doctor_reads_a_failed_build_log() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "cue/architecture/a.json", "{}");
    let err = run_with_options(dir.path(), PipelineOptions::default()).unwrap_err();
    let log = err.header("Build");

    let resp = Doctor::new(dir.path()).analyze(&log);
    assert_eq!(resp.detected_codes, vec!["CUE_DOMAIN_LOAD_ERROR"]);
    assert_eq!(resp.suggestions[0].fix, "Fix CUE syntax or type conflicts in domain models.");
    assert_eq!(resp.iteration, 1);
}
