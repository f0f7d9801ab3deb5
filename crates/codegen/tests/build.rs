//! Full builds over temporary projects: in-place output, dry runs and
//! release mode.

use std::path::Path;

use ang_codegen::{
    BuildEvent, BuildOptions, BuiltinTemplates, ChangeAction, Generator, NoFormat, StepStatus,
    MANIFEST_PATH,
};
use ang_core::diagnostic::Warning;
use ang_core::pipeline::{Snippet, SnippetChecker};
use ang_core::{run_with_options, ErrorCode, PipelineOptions};
use ang_ir::Schema;

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

fn project(root: &Path, project_json: &str) {
    write(
        root,
        "cue/domain/order.json",
        r#"{Order: {fields: {id: "string", total: "int"}}}"#,
    );
    write(
        root,
        "cue/architecture/orders.json",
        r#"{
  Orders: {
    methods: {
      GetOrder: {
        input: {id: "string"},
        output: {order: "Order"},
        flow: [
          {action: "repo.Find", source: "Order", input: "req.ID", output: "order", error: "Order not found"},
          {action: "mapping.Assign", to: "resp.Order", value: "order"},
        ],
      },
    },
  },
}"#,
    );
    write(
        root,
        "cue/api/http.json",
        r#"{endpoints: [{method: "GET", path: "/orders/{id}", service: "Orders", rpc: "GetOrder"}]}"#,
    );
    write(root, "cue/project/project.json", project_json);
}

const SINGLE: &str = r#"{project: {name: "shop"}, targets: [{name: "api", lang: "go", framework: "chi", db: "postgres"}]}"#;

fn schema(root: &Path) -> Schema {
    let opts = PipelineOptions {
        snippet_checker: Some(Box::new(NoSnippets)),
        ..PipelineOptions::default()
    };
    run_with_options(root, opts).unwrap().schema
}

fn build(root: &Path, schema: &Schema, opts: &BuildOptions) -> (ang_codegen::BuildOutcome, Vec<BuildEvent>) {
    let mut events = Vec::new();
    let outcome = Generator::new(root, schema, &BuiltinTemplates, &NoFormat)
        .build(opts, &mut |ev| events.push(ev))
        .unwrap();
    (outcome, events)
}

#[test]
fn in_place_build_writes_backend_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root, SINGLE);
    let schema = schema(root);

    let (outcome, events) = build(root, &schema, &BuildOptions::default());
    assert!(root.join("cmd/server/main.go").is_file());
    assert!(root.join("internal/domain/order.go").is_file());
    assert!(root.join("api/openapi.yaml").is_file());

    let manifest_path = outcome.manifest_path.unwrap();
    assert_eq!(manifest_path, root.join(MANIFEST_PATH));
    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();
    let paths: Vec<&str> = doc["artifacts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"cmd/server/main.go"));
    assert!(!paths.iter().any(|p| p.starts_with("cue/")));
    assert!(doc["inputHash"].as_str().is_some_and(|h| h.len() == 64));

    let report = &outcome.reports[0];
    assert_eq!(report.target, "api");
    assert_eq!(report.plugins, "shared,go_legacy,python_fastapi");
    assert!(report.files_written > 0);

    assert!(matches!(&events[0], BuildEvent::TargetStarted { target, .. } if target == "api"));
    assert!(matches!(events.last(), Some(BuildEvent::TargetFinished { .. })));
    let errors = events
        .iter()
        .filter(|e| matches!(e, BuildEvent::Step(s) if s.status == StepStatus::Error))
        .count();
    assert_eq!(errors, 0);
}

#[test]
fn second_build_rewrites_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root, SINGLE);
    let schema = schema(root);

    build(root, &schema, &BuildOptions::default());
    let first = std::fs::read(root.join(MANIFEST_PATH)).unwrap();
    let (outcome, _) = build(root, &schema, &BuildOptions::default());
    assert_eq!(outcome.reports[0].files_written, 0);
    assert_eq!(std::fs::read(root.join(MANIFEST_PATH)).unwrap(), first);
}

#[test]
fn dry_run_writes_nothing_and_matches_a_real_build() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root, SINGLE);
    let schema = schema(root);
    let dry = BuildOptions {
        dry_run: true,
        ..BuildOptions::default()
    };

    let (outcome, _) = build(root, &schema, &dry);
    let manifest = outcome.dry_run.unwrap();
    assert!(outcome.manifest_path.is_none());
    assert!(!root.join("cmd").exists());
    assert!(!root.join(".ang/cache").exists());
    assert_eq!(manifest.status, "dry_run");
    assert_eq!(manifest.total_targets, 1);
    assert!(manifest.total_create > 0);
    assert_eq!(manifest.total_create, manifest.total_generated_files);

    build(root, &schema, &BuildOptions::default());
    let (outcome, _) = build(root, &schema, &dry);
    let manifest = outcome.dry_run.unwrap();
    assert_eq!(manifest.total_unchanged, manifest.total_generated_files);
    assert!(manifest.targets[0]
        .changes
        .iter()
        .all(|c| c.action == ChangeAction::Unchanged));
}

#[test]
fn release_build_writes_each_target_to_its_own_dir() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(
        root,
        r#"{
  project: {name: "shop", build: {mode: "release"}},
  targets: [
    {name: "api", lang: "go", framework: "chi", db: "postgres"},
    {name: "Edge API", lang: "go", framework: "chi", db: "postgres"},
  ],
}"#,
    );
    let schema = schema(root);

    let (outcome, _) = build(root, &schema, &BuildOptions::default());
    assert_eq!(outcome.reports.len(), 2);
    assert!(root.join("dist/release/api/cmd/server/main.go").is_file());
    assert!(root.join("dist/release/edge-api/cmd/server/main.go").is_file());
    assert!(!root.join("cmd").exists());
}

#[test]
fn release_rejects_partial_output_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(
        root,
        r#"{
  project: {name: "shop", build: {mode: "release"}},
  targets: [
    {name: "api", lang: "go", framework: "chi", db: "postgres", output_dir: "out/api"},
    {name: "edge", lang: "go", framework: "chi", db: "postgres"},
  ],
}"#,
    );
    let schema = schema(root);

    let err = Generator::new(root, &schema, &BuiltinTemplates, &NoFormat)
        .build(&BuildOptions::default(), &mut |_| {})
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::EmitterOptions);
    assert!(err.cause.contains("with and without output_dir"));
    assert!(!root.join("out").exists());
}

#[test]
fn unknown_target_selector_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root, SINGLE);
    let schema = schema(root);
    let opts = BuildOptions {
        target_selector: "worker".to_string(),
        ..BuildOptions::default()
    };

    let err = Generator::new(root, &schema, &BuiltinTemplates, &NoFormat)
        .build(&opts, &mut |_| {})
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::EmitterOptions);
    assert!(err.cause.contains("no targets matched"));
    assert!(!root.join("cmd").exists());
}

#[test]
fn release_output_outside_the_root_module_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(
        root,
        r#"{project: {name: "shop", build: {mode: "release"}}, targets: [{name: "api", lang: "go", framework: "chi", db: "postgres"}]}"#,
    );
    write(root, "go.mod", "module example.com/shop\n\ngo 1.22\n");
    let schema = schema(root);

    let (outcome, _) = build(root, &schema, &BuildOptions::default());
    assert!(root.join("dist/release/api/cmd/server/main.go").is_file());
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].starts_with(
        "Generated code is not used by runtime build: release mode Go target outputs to dist/release/api while root go.mod exists"
    ));

    let dry = BuildOptions {
        dry_run: true,
        ..BuildOptions::default()
    };
    let (outcome, _) = build(root, &schema, &dry);
    assert!(outcome.dry_run.unwrap().notes.iter().any(|n| n.starts_with("Generated code is not used")));

    std::fs::remove_file(root.join("go.mod")).unwrap();
    let (outcome, _) = build(root, &schema, &BuildOptions::default());
    assert!(outcome.warnings.is_empty());
}

fn auth_project(root: &Path) {
    write(
        root,
        "cue/domain/user.json",
        r#"{User: {fields: {id: "string", email: "string"}}}"#,
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
    write(root, "cue/project/project.json", SINGLE);
}

#[test]
fn minimal_auth_service_builds_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    auth_project(root);
    let schema = schema(root);

    let (_, events) = build(root, &schema, &BuildOptions::default());
    let read = |rel: &str| std::fs::read_to_string(root.join(rel)).unwrap();

    let port = read("internal/port/auth.go");
    assert!(port.contains("Login(ctx context.Context, req domain.LoginRequest) (domain.LoginResponse, error)"));

    let repo = read("internal/adapter/repository/postgres/user.go");
    assert!(repo.contains("type UserRepository struct {"));

    let handler = read("internal/transport/http/auth.go");
    assert!(handler.contains("// Login handles POST /auth/login."));

    let openapi: serde_yaml::Value = serde_yaml::from_str(&read("api/openapi.yaml")).unwrap();
    assert!(!openapi["paths"]["/auth/login"]["post"].is_null());
    let email = &openapi["components"]["schemas"]["User"]["properties"]["email"];
    assert_eq!(email["type"].as_str(), Some("string"));

    assert!(root.join("ang-manifest.json").is_file());

    let server_mains = events
        .iter()
        .filter(|e| matches!(e, BuildEvent::Step(s) if s.step == "Server Main" && s.status == StepStatus::Ok))
        .count();
    assert_eq!(server_mains, 1);
    assert!(!events
        .iter()
        .any(|e| matches!(e, BuildEvent::Step(s) if s.step == "Python FastAPI Backend" && s.status == StepStatus::Ok)));
}
