//! Subcommand implementations.
//!
//! Every command that compiles a project goes through [`run_pipeline`], which
//! collects the pipeline diagnostics even when a later stage fails.

pub(crate) mod audit;
pub(crate) mod build;
pub(crate) mod build_log;
pub(crate) mod doctor;
pub(crate) mod hooks;
pub(crate) mod init;
pub(crate) mod ops;
pub(crate) mod validate;

use std::path::Path;
use std::process;

use ang_core::{ContractError, PipelineOptions, PipelineOutput, Warning};

use crate::{report_error, OutputFormat};

/// Run the compiler pipeline, returning its result and every diagnostic it
/// produced before any failure.
pub(crate) fn run_pipeline(project: &Path) -> (Result<PipelineOutput, ContractError>, Vec<Warning>) {
    let mut diagnostics = Vec::new();
    let result = {
        let opts = PipelineOptions {
            warning_sink: Some(Box::new(|w: &Warning| diagnostics.push(w.clone()))),
            ..PipelineOptions::default()
        };
        ang_core::run_with_options(project, opts)
    };
    (result, diagnostics)
}

/// Pipeline output or a reported `<action> FAILED` header and exit 1.
pub(crate) fn compile_or_exit(project: &Path, action: &str, output: OutputFormat, quiet: bool) -> PipelineOutput {
    match run_pipeline(project).0 {
        Ok(out) => out,
        Err(e) => fail(&e, action, output, quiet),
    }
}

/// Report a stage failure and exit 1.
pub(crate) fn fail(err: &ContractError, action: &str, output: OutputFormat, quiet: bool) -> ! {
    match output {
        OutputFormat::Text => report_error(&err.header(action), output, quiet),
        OutputFormat::Json => {
            if !quiet {
                eprintln!("{}", serde_json::json!({ "error": err.to_json_value() }));
            }
        }
    }
    process::exit(1);
}

/// Print diagnostics to stderr; returns whether any is an error.
pub(crate) fn print_diagnostics(diagnostics: &[Warning], quiet: bool) -> bool {
    if !quiet {
        for d in diagnostics {
            eprintln!("{}", format_diagnostic(d));
        }
    }
    ang_core::diagnostic::has_errors(diagnostics)
}

pub(crate) fn format_diagnostic(d: &Warning) -> String {
    let mut out = format!("{} [{}]: {}", d.severity.as_str().to_uppercase(), d.code, d.message);
    if !d.file.is_empty() {
        out.push_str(&format!("\n   at {}:{}:{}", d.file, d.line, d.column));
    }
    if !d.hint.is_empty() {
        out.push_str(&format!("\n   Hint: {}", d.hint));
    }
    out
}

/// Pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T, output: OutputFormat, quiet: bool) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            report_error(&format!("serialize output: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ang_core::Severity;

    #[test]
    fn diagnostic_lines_carry_location_and_hint() {
        let mut w = Warning::new(Severity::Warn, "MISSING_OUTPUT", "repo.Find missing 'output'")
            .with_hint("add output: \"user\"");
        w.file = "cue/architecture/auth.json".into();
        w.line = 7;
        w.column = 11;
        assert_eq!(
            format_diagnostic(&w),
            "WARN [MISSING_OUTPUT]: repo.Find missing 'output'\n   at cue/architecture/auth.json:7:11\n   Hint: add output: \"user\""
        );
    }

    #[test]
    fn bare_diagnostic_is_one_line() {
        let w = Warning::error("E_X", "broken");
        assert_eq!(format_diagnostic(&w), "ERROR [E_X]: broken");
    }
}
