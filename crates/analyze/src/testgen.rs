//! Flow-derived test cases.
//!
//! Walks every method flow and derives the branches a behavioural test
//! suite should cover: guard failures (`logic.Check`), both arms of
//! `flow.If`, and the not-found arm of `repo.Find`/`repo.Get` steps that
//! declare an `error`. Step numbers are 1-based positions within the list
//! the step lives in, so nested lists restart at 1.

use std::collections::BTreeMap;
use std::path::Path;

use ang_ir::{Endpoint, FlowAction, FlowStep, Method, Schema};
use serde::Serialize;

use crate::error::AnalyzeError;

pub const DEFAULT_FLOW_CASES_PATH: &str = "tests/generated/flow_cases.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowTestCase {
    pub id: String,
    pub service: String,
    pub method: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub endpoint_method: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub endpoint_path: String,
    pub kind: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub condition: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub throw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<u16>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub step_file: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub step_line: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub step_column: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_path: String,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowTestManifest {
    pub status: String,
    pub project_path: String,
    pub output_path: String,
    pub services: usize,
    pub methods: usize,
    pub cases: usize,
    pub cases_by_kind: BTreeMap<String, usize>,
    pub generator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowCaseDocument {
    pub manifest: FlowTestManifest,
    pub cases: Vec<FlowTestCase>,
}

/// 403 for access-denied style messages, 400 otherwise.
pub fn infer_check_status(throw: &str) -> u16 {
    let m = throw.trim().to_lowercase();
    if m.contains("access denied") || m.contains("forbidden") {
        403
    } else {
        400
    }
}

/// Cases for one method. `endpoint` is the HTTP binding of the method, if any.
pub fn derive_flow_cases(service: &str, method: &Method, endpoint: Option<&Endpoint>) -> Vec<FlowTestCase> {
    let mut out = Vec::new();
    visit(service, method, endpoint, &method.flow, &mut out);
    out
}

fn visit(service: &str, method: &Method, ep: Option<&Endpoint>, steps: &[FlowStep], out: &mut Vec<FlowTestCase>) {
    for (idx, step) in steps.iter().enumerate() {
        let step_no = idx + 1;
        let case = |kind: &str, title: &str| FlowTestCase {
            id: format!("{}.{}.{}.{}", service, method.name, kind, step_no),
            service: service.to_string(),
            method: method.name.clone(),
            endpoint_method: ep.map(|e| e.method.clone()).unwrap_or_default(),
            endpoint_path: ep.map(|e| e.path.clone()).unwrap_or_default(),
            kind: kind.to_string(),
            title: title.to_string(),
            condition: String::new(),
            throw: String::new(),
            expected_status: None,
            step_file: step.source.file.clone(),
            step_line: step.source.line,
            step_column: step.source.column,
            source_path: step.source.path.clone(),
        };
        match step.action {
            FlowAction::LogicCheck => {
                let throw = step.arg_str("throw").unwrap_or_default().to_string();
                out.push(FlowTestCase {
                    condition: step.condition().unwrap_or_default().to_string(),
                    expected_status: Some(infer_check_status(&throw)),
                    throw,
                    ..case("logic_check", "logic.Check guard failure should return error")
                });
            }
            FlowAction::FlowIf => {
                let condition = step.condition().unwrap_or_default().to_string();
                out.push(FlowTestCase {
                    condition: condition.clone(),
                    ..case("flow_if_then", "flow.If then branch should be covered")
                });
                out.push(FlowTestCase {
                    condition,
                    ..case("flow_if_else", "flow.If else branch should be covered")
                });
            }
            FlowAction::RepoFind | FlowAction::RepoGet => {
                if let Some(err) = step.arg_str("error") {
                    out.push(FlowTestCase {
                        throw: err.to_string(),
                        expected_status: Some(404),
                        ..case("repo_not_found", "repo.Find/Get not-found branch should return 404")
                    });
                }
            }
            _ => {}
        }
        for (_, nested) in step.children() {
            visit(service, method, ep, nested, out);
        }
    }
}

/// Cases for every method of `schema`, sorted by service, method and id.
pub fn generate_flow_cases(schema: &Schema, project_path: &Path, output_path: &Path) -> FlowCaseDocument {
    let mut cases = Vec::new();
    let mut methods = 0;
    for svc in &schema.services {
        for m in &svc.methods {
            methods += 1;
            let ep = schema.endpoints.iter().find(|e| {
                e.service.eq_ignore_ascii_case(&svc.name) && e.rpc.eq_ignore_ascii_case(&m.name)
            });
            cases.extend(derive_flow_cases(&svc.name, m, ep));
        }
    }
    cases.sort_by(|a, b| {
        (&a.service, &a.method, &a.id).cmp(&(&b.service, &b.method, &b.id))
    });
    let mut cases_by_kind = BTreeMap::new();
    for c in &cases {
        *cases_by_kind.entry(c.kind.clone()).or_insert(0) += 1;
    }
    FlowCaseDocument {
        manifest: FlowTestManifest {
            status: "generated".to_string(),
            project_path: project_path.display().to_string(),
            output_path: output_path.to_string_lossy().replace('\\', "/"),
            services: schema.services.len(),
            methods,
            cases: cases.len(),
            cases_by_kind,
            generator: "ang test gen".to_string(),
        },
        cases,
    }
}

impl FlowCaseDocument {
    /// Pretty JSON at `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), AnalyzeError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AnalyzeError::io(parent, e))?;
        }
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        std::fs::write(path, text).map_err(|e| AnalyzeError::io(path, e))
    }
}
