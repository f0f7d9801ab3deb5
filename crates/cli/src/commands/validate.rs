//! `ang validate` and `ang lint`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process;

use ang_analyze::{check_test_coverage, EndpointCoverage, TestCoverageReport};
use ang_core::{ContractError, ErrorCode, Warning};
use clap::Args;
use serde::Serialize;

use super::{fail, print_diagnostics, print_json, run_pipeline};
use crate::{report_error, OutputFormat};

/// Diagnostic code carrying `cue/lint` violations.
const LINT_VIOLATION: &str = "LINT_VIOLATION";

#[derive(Args, Debug, Clone)]
pub(crate) struct LintArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project: PathBuf,
    /// Emit a structured JSON report
    #[arg(long)]
    pub json: bool,
    /// Check which endpoints are covered by TypeScript tests
    #[arg(long)]
    pub check_test_coverage: bool,
    /// Directory containing test files, relative to the project
    #[arg(long, default_value = "tests")]
    pub test_dir: PathBuf,
    /// Minimum required coverage percentage (0-100)
    #[arg(long, default_value_t = 0.0)]
    pub min_coverage: f64,
    /// Also list tested endpoints
    #[arg(long)]
    pub verbose: bool,
}

pub(crate) fn cmd_validate(project: &Path, output: OutputFormat, quiet: bool) {
    let text = output == OutputFormat::Text && !quiet;
    if text {
        println!("Validating architecture...");
    }
    let (result, diagnostics) = run_pipeline(project);
    let has_errors = print_diagnostics(&diagnostics, quiet);
    if let Err(e) = result {
        fail(&e, "Validation", output, quiet);
    }
    if has_errors {
        report_error("Validation FAILED due to diagnostic errors.", output, quiet);
        process::exit(1);
    }
    match output {
        OutputFormat::Text => {
            if !quiet {
                println!("Validation SUCCESSFUL.");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({"status": "ok", "diagnostics": diagnostics}));
        }
    }
}

#[derive(Debug, Serialize)]
struct LintReport {
    ok: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<LintError>,
}

#[derive(Debug, Serialize)]
struct LintError {
    message: String,
}

/// Failures of one lint run: pipeline error, `cue/lint` violations, then
/// error diagnostics.
fn lint_report(result: Result<(), ContractError>, diagnostics: Vec<Warning>) -> LintReport {
    let mut errors = Vec::new();
    if let Err(e) = result {
        errors.push(LintError {
            message: e.header("Lint"),
        });
    }
    for d in &diagnostics {
        if d.code == LINT_VIOLATION || d.is_error() {
            errors.push(LintError {
                message: d.message.clone(),
            });
        }
    }
    LintReport {
        ok: errors.is_empty(),
        warnings: diagnostics,
        errors,
    }
}

pub(crate) fn cmd_lint(args: &LintArgs, output: OutputFormat, quiet: bool) {
    if args.check_test_coverage {
        cmd_test_coverage(args, output, quiet);
        return;
    }
    let json = args.json || output == OutputFormat::Json;
    if !json && !quiet {
        println!("Linting intent...");
    }
    let (result, diagnostics) = run_pipeline(&args.project);
    let report = lint_report(result.map(|_| ()), diagnostics);

    if json {
        print_json(&report, output, quiet);
        if !report.ok {
            process::exit(1);
        }
        return;
    }
    if !report.ok {
        let mut msg = String::from("\nLint FAILED. Violations:");
        for e in &report.errors {
            let _ = write!(msg, "\n  - {}", e.message);
        }
        report_error(&msg, output, quiet);
        process::exit(1);
    }
    if !quiet {
        println!("\nLint SUCCESSFUL.");
    }
}

fn cmd_test_coverage(args: &LintArgs, output: OutputFormat, quiet: bool) {
    let json = args.json || output == OutputFormat::Json;
    if !json && !quiet {
        println!("Checking test coverage...");
    }
    let schema = match run_pipeline(&args.project).0 {
        Ok(out) => out.schema,
        Err(e) => {
            let err = ContractError::new(ErrorCode::CueTestCoveragePipeline, "run pipeline", &e.cause);
            fail(&err, "Test coverage check", output, quiet);
        }
    };
    let report = match check_test_coverage(&schema.endpoints, &args.project.join(&args.test_dir)) {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("Test coverage check FAILED: {}", e), output, quiet);
            process::exit(1);
        }
    };

    if json {
        print_json(&report, output, quiet);
    } else if !quiet {
        print!("{}", render_coverage(&report, args.verbose));
    }

    if args.min_coverage > 0.0 && report.coverage_percent < args.min_coverage {
        report_error(
            &format!(
                "\nTest coverage {:.1}% is below minimum required {:.1}%",
                report.coverage_percent, args.min_coverage
            ),
            output,
            quiet,
        );
        process::exit(1);
    }
    if !json && !quiet {
        if report.missing_tests.is_empty() {
            println!("\nAll endpoints have test coverage!");
        } else {
            println!("\n{} endpoints without test coverage", report.missing_tests.len());
        }
    }
}

pub(crate) fn render_coverage(report: &TestCoverageReport, verbose: bool) -> String {
    let rule = "-".repeat(54);
    let mut out = String::new();
    let _ = writeln!(out, "\nTest Coverage Report");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "  Total Endpoints:  {}", report.total_endpoints);
    let _ = writeln!(out, "  Tested:           {}", report.tested_endpoints);
    let _ = writeln!(out, "  Missing:          {}", report.missing_tests.len());
    let _ = writeln!(out, "  Coverage:         {:.1}%", report.coverage_percent);
    let _ = writeln!(out, "{}", rule);

    if !report.missing_tests.is_empty() {
        let _ = writeln!(out, "\nEndpoints without test coverage:\n");
        let mut by_service: BTreeMap<&str, Vec<&EndpointCoverage>> = BTreeMap::new();
        for ep in &report.missing_tests {
            by_service.entry(ep.service.as_str()).or_default().push(ep);
        }
        for (service, eps) in by_service {
            let _ = writeln!(out, "  [{}]", service);
            for ep in eps {
                let _ = writeln!(out, "    - {} {} ({})", ep.method, ep.path, ep.rpc);
            }
            out.push('\n');
        }
    }

    if verbose && !report.tested_by.is_empty() {
        let _ = writeln!(out, "\nTested endpoints:\n");
        for (endpoint, files) in &report.tested_by {
            let _ = writeln!(out, "  {}", endpoint);
            for f in files {
                let _ = writeln!(out, "    <- {}", f);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lint_violations_fail_the_report() {
        let diags = vec![
            Warning::warn("LINT_VIOLATION", "noEmptyServices: service Orders has no methods"),
            Warning::warn("DEPRECATED_FIELD", "field 'cond' is deprecated"),
        ];
        let report = lint_report(Ok(()), diags);
        assert!(!report.ok);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].message, "noEmptyServices: service Orders has no methods");
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn pipeline_error_leads_the_report() {
        let err = ContractError::new(ErrorCode::CueLintLoad, "load cue/lint", "bad json");
        let report = lint_report(Err(err), vec![Warning::error("E_PARSE", "broken")]);
        assert!(!report.ok);
        assert_eq!(report.errors[0].message, "Lint FAILED: CUE:CUE_LINT_LOAD_ERROR:load cue/lint: bad json");
        assert_eq!(report.errors[1].message, "broken");
    }

    #[test]
    fn warnings_alone_pass() {
        let report = lint_report(Ok(()), vec![Warning::warn("UNUSED_ENTITY", "Cart is never referenced")]);
        assert!(report.ok);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ok"], true);
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn coverage_report_groups_missing_endpoints_by_service() {
        let report = TestCoverageReport {
            total_endpoints: 3,
            tested_endpoints: 1,
            coverage_percent: 33.333,
            missing_tests: vec![
                EndpointCoverage {
                    method: "POST".into(),
                    path: "/orders".into(),
                    rpc: "CreateOrder".into(),
                    service: "Orders".into(),
                },
                EndpointCoverage {
                    method: "GET".into(),
                    path: "/carts/{id}".into(),
                    rpc: "GetCart".into(),
                    service: "Cart".into(),
                },
            ],
            tested_by: BTreeMap::new(),
        };
        let text = render_coverage(&report, false);
        assert!(text.contains("  Coverage:         33.3%"));
        let cart = text.find("[Cart]").unwrap();
        let orders = text.find("[Orders]").unwrap();
        assert!(cart < orders);
        assert!(text.contains("    - POST /orders (CreateOrder)"));
    }
}
