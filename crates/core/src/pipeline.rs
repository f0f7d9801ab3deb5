//! Pipeline orchestrator: project directory -> normalized set + IR.
//!
//! Stages run in order and fail fast:
//!
//! - `CUE`: load every domain through the [`DomainLoader`] and extract
//!   typed definitions (normalizer, infra registry, snippet checks)
//! - `IR`: build the schema and validate it
//!
//! The emitters stage is driven per target by the caller. Diagnostics
//! never abort a run; callers decide whether an error-severity diagnostic
//! fails their command.

use std::path::Path;
use std::sync::{Mutex, OnceLock};

use ang_ir::{Schema, SourceLoc};

use crate::convert::convert_and_transform;
use crate::defs::NormalizedSet;
use crate::diagnostic::{sort_diagnostics, Warning};
use crate::error::{ContractError, ErrorCode};
use crate::loader::{DomainLoader, JsonDirLoader, LoadError, Node};
use crate::normalize::{InfraRegistry, NormalizeError, Normalizer};
use crate::process::{ProcessError, ProcessRunner, ProcessSpec, SystemRunner};

// ── Snippet syntax checks ─────────────────────────────────────────────

/// An embedded implementation snippet (`impl.code`) of one method.
#[derive(Debug, Clone)]
pub struct Snippet<'a> {
    pub service: &'a str,
    pub method: &'a str,
    pub lang: &'a str,
    pub code: &'a str,
    /// Location of the `code` value.
    pub loc: &'a SourceLoc,
}

/// Language-native syntax check over embedded snippets.
pub trait SnippetChecker {
    fn check(&self, snippet: &Snippet<'_>) -> Vec<Warning>;
}

/// Wraps Go snippets in a function body and runs `gofmt -e`.
///
/// A missing `gofmt` binary disables the check silently.
pub struct GofmtChecker<R: ProcessRunner> {
    runner: R,
}

impl Default for GofmtChecker<SystemRunner> {
    fn default() -> Self {
        GofmtChecker { runner: SystemRunner }
    }
}

impl<R: ProcessRunner> GofmtChecker<R> {
    pub fn new(runner: R) -> Self {
        GofmtChecker { runner }
    }
}

/// Lines of wrapper emitted before the snippet body.
const GO_WRAPPER_LINES: u32 = 3;

impl<R: ProcessRunner> SnippetChecker for GofmtChecker<R> {
    fn check(&self, snippet: &Snippet<'_>) -> Vec<Warning> {
        if snippet.lang != "go" {
            return Vec::new();
        }
        let source = format!("package snippet\n\nfunc _() {{\n{}\n}}\n", snippet.code);
        let spec = ProcessSpec::new("gofmt").arg("-e").stdin(source.into_bytes());
        let output = match self.runner.run(&spec) {
            Ok(out) => out,
            Err(ProcessError::NotFound { .. }) => {
                tracing::debug!("gofmt not found; skipping snippet syntax check");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "snippet syntax check failed to run");
                return Vec::new();
            }
        };
        if output.success() {
            return Vec::new();
        }
        output
            .stderr_str()
            .lines()
            .filter_map(|line| parse_gofmt_line(line, snippet))
            .collect()
    }
}

/// `<standard input>:5:3: expected ...` -> diagnostic at the snippet's
/// position in the input file.
fn parse_gofmt_line(line: &str, snippet: &Snippet<'_>) -> Option<Warning> {
    let rest = line.strip_prefix("<standard input>:")?;
    let mut parts = rest.splitn(3, ':');
    let go_line: u32 = parts.next()?.trim().parse().ok()?;
    let column: u32 = parts.next()?.trim().parse().ok()?;
    let message = parts.next()?.trim();
    let offset = go_line.saturating_sub(GO_WRAPPER_LINES + 1);
    let mut loc = snippet.loc.clone();
    if loc.is_known() {
        loc.line += offset;
        loc.column = if offset == 0 { loc.column + column } else { column };
    }
    Some(
        Warning::error(
            "GO_SYNTAX_ERROR",
            format!("{}.{}: {}", snippet.service, snippet.method, message),
        )
        .with_hint("fix the Go code in impl.code; it must be a valid function body")
        .at(&loc),
    )
}

// ── Options and output ────────────────────────────────────────────────

/// Hooks for one pipeline run. Every field is optional.
#[derive(Default)]
pub struct PipelineOptions<'a> {
    /// Receives each diagnostic, in sorted order, after the CUE stage.
    pub warning_sink: Option<Box<dyn FnMut(&Warning) + 'a>>,
    /// Defaults to [`GofmtChecker`].
    pub snippet_checker: Option<Box<dyn SnippetChecker + 'a>>,
    /// Defaults to [`JsonDirLoader`].
    pub loader: Option<Box<dyn DomainLoader + 'a>>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub normalized: NormalizedSet,
    pub schema: Schema,
    pub diagnostics: Vec<Warning>,
}

static LATEST_DIAGNOSTICS: OnceLock<Mutex<Vec<Warning>>> = OnceLock::new();

/// Diagnostics of the most recent run in this process.
pub fn latest_diagnostics() -> Vec<Warning> {
    LATEST_DIAGNOSTICS
        .get()
        .and_then(|slot| slot.lock().ok().map(|d| d.clone()))
        .unwrap_or_default()
}

fn store_latest(diags: &[Warning]) {
    let slot = LATEST_DIAGNOSTICS.get_or_init(|| Mutex::new(Vec::new()));
    if let Ok(mut guard) = slot.lock() {
        *guard = diags.to_vec();
    }
}

// ── Entry points ──────────────────────────────────────────────────────

pub fn run(project: &Path) -> Result<PipelineOutput, ContractError> {
    run_with_options(project, PipelineOptions::default())
}

pub fn run_with_options(
    project: &Path,
    mut options: PipelineOptions<'_>,
) -> Result<PipelineOutput, ContractError> {
    let default_loader = JsonDirLoader;
    let loader: &dyn DomainLoader = match &options.loader {
        Some(l) => l.as_ref(),
        None => &default_loader,
    };

    // CUE stage
    let mut normalizer = Normalizer::new(project);
    let set = extract(project, loader, &mut normalizer)?;

    let mut diagnostics = normalizer.take_warnings();
    let default_checker = GofmtChecker::default();
    let checker: &dyn SnippetChecker = match &options.snippet_checker {
        Some(c) => c.as_ref(),
        None => &default_checker,
    };
    diagnostics.extend(check_snippets(&set, checker));
    sort_diagnostics(&mut diagnostics);

    store_latest(&diagnostics);
    if let Some(sink) = options.warning_sink.as_mut() {
        for d in &diagnostics {
            sink(d);
        }
    }
    tracing::debug!(
        entities = set.entities.len(),
        services = set.services.len(),
        diagnostics = diagnostics.len(),
        "cue stage complete"
    );

    // IR stage
    let schema = convert_and_transform(set.clone())?;
    Ok(PipelineOutput {
        normalized: set,
        schema,
        diagnostics,
    })
}

fn load(
    loader: &dyn DomainLoader,
    project: &Path,
    domain: &str,
    code: ErrorCode,
) -> Result<Option<Node>, ContractError> {
    loader
        .load_domain(project, domain)
        .map_err(|e: LoadError| ContractError::new(code, format!("load {}", domain), e))
}

fn require(
    loader: &dyn DomainLoader,
    project: &Path,
    domain: &str,
    code: ErrorCode,
) -> Result<Node, ContractError> {
    load(loader, project, domain, code)?.ok_or_else(|| {
        ContractError::new(
            code,
            format!("load {}", domain),
            format!("{} not found under {}", domain, project.display()),
        )
    })
}

fn wrap<T>(code: ErrorCode, op: &str, r: Result<T, NormalizeError>) -> Result<T, ContractError> {
    r.map_err(|e| ContractError::new(code, op, e))
}

fn extract(
    project: &Path,
    loader: &dyn DomainLoader,
    n: &mut Normalizer,
) -> Result<NormalizedSet, ContractError> {
    let domain = require(loader, project, "cue/domain", ErrorCode::CueDomainLoad)?;
    let architecture = require(loader, project, "cue/architecture", ErrorCode::CueArchLoad)?;
    let api = load(loader, project, "cue/api", ErrorCode::CueApiLoad)?;
    let repo = load(loader, project, "cue/repo", ErrorCode::CueRepoNormalize)?;
    let infra = load(loader, project, "cue/infra", ErrorCode::CueInfraLoad)?;
    let (policy, policy_parse) = match load(loader, project, "cue/rbac", ErrorCode::CueRbacLoad)? {
        Some(node) => (Some(node), ErrorCode::CueRbacParse),
        None => (
            load(loader, project, "cue/policies", ErrorCode::CuePoliciesLoad)?,
            ErrorCode::CuePoliciesParse,
        ),
    };
    let views = load(loader, project, "cue/views", ErrorCode::CueViewsLoad)?;
    let project_node = load(loader, project, "cue/project", ErrorCode::CueProjectLoad)?;
    let lint = load(loader, project, "cue/lint", ErrorCode::CueLintLoad)?;

    let mut set = NormalizedSet::default();
    set.entities = wrap(
        ErrorCode::CueEntityNormalize,
        "extract entities",
        n.extract_entities(&domain),
    )?;
    set.services = wrap(
        ErrorCode::CueServiceNormalize,
        "extract services",
        n.extract_services(&architecture, &mut set.entities),
    )?;

    if let Some(api) = &api {
        n.check_fields(api, crate::normalize::API_SECTIONS, "cue/api");
        set.endpoints = wrap(
            ErrorCode::CueEndpointNormalize,
            "extract endpoints",
            n.extract_endpoints(api),
        )?;
        set.events = wrap(ErrorCode::CueApiLoad, "extract events", n.extract_events(api))?;
        set.errors = wrap(ErrorCode::CueApiLoad, "extract errors", n.extract_errors(api))?;
        set.schedules = wrap(
            ErrorCode::CueScheduleNormalize,
            "extract schedules",
            n.extract_schedules(api),
        )?;
        set.scenarios = wrap(ErrorCode::CueApiLoad, "extract scenarios", n.extract_scenarios(api))?;
    }
    if let Some(repo) = &repo {
        set.repos = wrap(ErrorCode::CueRepoNormalize, "extract repos", n.extract_repos(repo))?;
    }

    let (sections, patch) = InfraRegistry::default().extract_all(n, infra.as_ref())?;
    set.config = sections.config;
    set.auth = sections.auth;
    set.notifications = sections.notifications;
    set.templates = sections.templates;
    set.context_patch = patch;

    if let Some(policy) = &policy {
        let (rbac, violations) = wrap(policy_parse, "extract rbac", n.extract_rbac(policy))?;
        set.rbac = Some(rbac);
        set.policy_violations = violations;
    }
    if let Some(views) = &views {
        set.views = wrap(ErrorCode::CueViewsParse, "extract views", n.extract_views(views))?;
    }
    set.project = wrap(
        ErrorCode::CueProjectParse,
        "extract project",
        n.extract_project(project_node.as_ref()),
    )?;
    set.targets = wrap(
        ErrorCode::CueTargetsParse,
        "extract targets",
        n.extract_targets(project_node.as_ref()),
    )?;
    if let Some(lint) = &lint {
        for line in n.extract_lint(lint) {
            n.push(Warning::warn("LINT_VIOLATION", line).at(&lint.loc));
        }
    }
    Ok(set)
}

fn check_snippets(set: &NormalizedSet, checker: &dyn SnippetChecker) -> Vec<Warning> {
    let mut out = Vec::new();
    for svc in &set.services {
        for m in &svc.methods {
            if let Some(imp) = &m.implementation {
                out.extend(checker.check(&Snippet {
                    service: &svc.name,
                    method: &m.name,
                    lang: &imp.lang,
                    code: &imp.code,
                    loc: &imp.source,
                }));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;

    struct FakeGofmt(&'static str);

    impl ProcessRunner for FakeGofmt {
        fn run(&self, _spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
            Ok(ProcessOutput {
                status: 2,
                stdout: Vec::new(),
                stderr: self.0.as_bytes().to_vec(),
            })
        }
    }

    #[test]
    fn gofmt_errors_map_to_input_positions() {
        let loc = SourceLoc {
            file: "cue/architecture/orders.json".into(),
            line: 10,
            column: 17,
            path: String::new(),
        };
        let snippet = Snippet {
            service: "Orders",
            method: "Create",
            lang: "go",
            code: "x := 1\nif x {",
            loc: &loc,
        };
        let checker = GofmtChecker::new(FakeGofmt("<standard input>:5:7: expected '}', found 'EOF'\n"));
        let warnings = checker.check(&snippet);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "GO_SYNTAX_ERROR");
        assert_eq!(warnings[0].line, 11);
        assert_eq!(warnings[0].column, 7);
        assert!(warnings[0].message.starts_with("Orders.Create: expected"));
    }

    #[test]
    fn non_go_snippets_are_not_checked() {
        let loc = SourceLoc::default();
        let snippet = Snippet {
            service: "S",
            method: "M",
            lang: "python",
            code: "def (",
            loc: &loc,
        };
        let checker = GofmtChecker::new(FakeGofmt("<standard input>:4:1: boom"));
        assert!(checker.check(&snippet).is_empty());
    }
}
