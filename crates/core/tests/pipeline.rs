//! End-to-end pipeline runs over temporary projects.

use std::cell::RefCell;
use std::path::Path;

use ang_core::diagnostic::Warning;
use ang_core::pipeline::{Snippet, SnippetChecker};
use ang_core::{run_with_options, ErrorCode, PipelineOptions};

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

fn minimal_project(root: &Path) {
    write(
        root,
        "cue/domain/user.json",
        r#"{
  // users of the shop
  User: {fields: {id: "string", email: "string"}},
}"#,
    );
    write(
        root,
        "cue/architecture/auth.json",
        r#"{
  Auth: {
    methods: {
      Login: {
        input: {email: "string", password: "string"},
        output: {token: "string"},
        flow: [
          {action: "repo.Find", source: "User", input: "req.Email", output: "user", error: "User not found"},
          {action: "mapping.Assign", to: "resp.Token", value: "user.ID"},
        ],
      },
    },
  },
}"#,
    );
    write(
        root,
        "cue/api/http.json",
        r#"{endpoints: [{method: "POST", path: "/auth/login", service: "Auth", rpc: "Login"}]}"#,
    );
    write(
        root,
        "cue/project/project.json",
        r#"{project: {name: "shop"}, targets: [{lang: "go", framework: "chi", db: "postgres"}]}"#,
    );
}

fn options<'a>() -> PipelineOptions<'a> {
    PipelineOptions {
        snippet_checker: Some(Box::new(NoSnippets)),
        ..PipelineOptions::default()
    }
}

#[test]
fn minimal_project_builds_ir() {
    let dir = tempfile::tempdir().unwrap();
    minimal_project(dir.path());

    let seen = RefCell::new(Vec::new());
    let opts = PipelineOptions {
        warning_sink: Some(Box::new(|w: &Warning| seen.borrow_mut().push(w.code.clone()))),
        ..options()
    };
    let out = run_with_options(dir.path(), opts).unwrap();

    let names: Vec<&str> = out.schema.entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["User", "LoginRequest", "LoginResponse"]);
    let login = out.schema.method("Auth", "Login").unwrap();
    assert_eq!(login.input.as_deref(), Some("LoginRequest"));
    assert_eq!(out.schema.endpoints[0].path, "/auth/login");
    assert!(out.schema.services[0].requires.sql);
    assert_eq!(out.schema.project.name, "shop");
    assert!(!ang_core::diagnostic::has_errors(&out.diagnostics));
    assert_eq!(seen.borrow().len(), out.diagnostics.len());
}

#[test]
fn missing_domain_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "cue/architecture/a.json", "{}");
    let err = run_with_options(dir.path(), options()).unwrap_err();
    assert_eq!(err.code, ErrorCode::CueDomainLoad);
    assert!(err.header("Build").starts_with("Build FAILED: CUE:CUE_DOMAIN_LOAD_ERROR:load cue/domain:"));
}

#[test]
fn endpoint_to_unknown_rpc_fails_semantic_validation() {
    let dir = tempfile::tempdir().unwrap();
    minimal_project(dir.path());
    write(
        dir.path(),
        "cue/api/http.json",
        r#"{endpoints: [{method: "POST", path: "/auth/logout", service: "Auth", rpc: "Logout"}]}"#,
    );
    let err = run_with_options(dir.path(), options()).unwrap_err();
    assert_eq!(err.code, ErrorCode::IrSemanticValidate);
    assert!(err.cause.contains("unknown rpc 'Auth.Logout'"), "{}", err.cause);
}

#[test]
fn service_cycles_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    minimal_project(dir.path());
    write(
        dir.path(),
        "cue/architecture/cycle.json",
        r#"{
  Billing: {uses: ["Ledger"], methods: {Charge: {}}},
  Ledger: {uses: ["Billing"], methods: {Post: {}}},
}"#,
    );
    let err = run_with_options(dir.path(), options()).unwrap_err();
    assert_eq!(err.code, ErrorCode::IrServiceDependencies);
    assert!(err.cause.contains("Billing -> Ledger -> Billing"), "{}", err.cause);
}

#[test]
fn policies_domain_is_used_when_rbac_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    minimal_project(dir.path());
    write(
        dir.path(),
        "cue/policies/rbac.json",
        r#"{roles: {admin: ["auth.login"]}, validation_errors: {"auth.logout": "unknown action"}}"#,
    );
    let out = run_with_options(dir.path(), options()).unwrap();
    assert_eq!(out.schema.rbac.unwrap().roles["admin"], vec!["auth.login"]);
    assert_eq!(out.normalized.policy_violations, vec!["auth.logout: unknown action"]);
}
