//! Analyses over a compiled ANG project.
//!
//! Everything here consumes the IR [`ang_ir::Schema`] (or the pipeline
//! output that carries it) plus, for a few commands, files on disk: build
//! logs for the doctor, TypeScript tests for coverage, OpenAPI documents
//! for the API diff. None of the analyses write generated code.

#![allow(clippy::result_large_err)]

pub mod api_diff;
pub mod coverage;
pub mod doctor;
pub mod error;
pub mod events_map;
pub mod explain;
pub mod rbac_audit;
pub mod report;
pub mod testgen;
pub mod vet;

// ── Convenience re-exports ──────────────────────────────────────────────────

pub use api_diff::{diff_openapi, parse_openapi, read_openapi, ApiDiffReport, ApiDoc, SemverBump};
pub use coverage::{check_test_coverage, EndpointCoverage, TestCoverageReport};
pub use doctor::{detect_error_codes, Doctor, DoctorResponse, Suggestion};
pub use error::AnalyzeError;
pub use events_map::{event_findings, events_map, EventFlow};
pub use explain::{explain, Explanation};
pub use rbac_audit::{inspect_rbac, rbac_actions, RbacAudit};
pub use report::{has_errors, Finding, FindingSeverity};
pub use testgen::{generate_flow_cases, FlowCaseDocument, FlowTestCase, DEFAULT_FLOW_CASES_PATH};
pub use vet::{logic_errors, vet, vet_schema};
