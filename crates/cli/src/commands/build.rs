//! `ang build`: compile intent into code for every selected target.

use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::Duration;

use ang_codegen::{BuildEvent, BuildOptions, BuildOutcome, Generator, Gofmt, ProjectTemplates, StepStatus};
use ang_core::{ContractError, ErrorCode, SystemRunner};

use super::build_log::{BuildLog, LogEvent};
use super::hooks::{run_mcp_script, TscGate};
use super::{format_diagnostic, run_pipeline};
use crate::{BuildArgs, LogFormat, OutputFormat};

/// Optional steps a dry run never performs.
const DRY_RUN_SKIPPED: [&str; 2] = ["mcp_generation", "frontend_typecheck"];

#[derive(Debug)]
pub(crate) enum BuildFailure {
    /// The pipeline produced error diagnostics.
    Diagnostics,
    Contract(ContractError),
}

impl From<ContractError> for BuildFailure {
    fn from(e: ContractError) -> Self {
        BuildFailure::Contract(e)
    }
}

pub(crate) fn build_options(args: &BuildArgs) -> BuildOptions {
    BuildOptions {
        mode: args.mode.clone(),
        backend_dir: args.backend_dir.clone(),
        frontend_dir: args.frontend_dir.clone(),
        frontend_app_dir: args.frontend_app_dir.clone(),
        frontend_admin_dir: args.frontend_admin_dir.clone(),
        frontend_admin_app_dir: args.frontend_admin_app_dir.clone(),
        frontend_env_path: args.frontend_env_path.clone(),
        target_selector: args.target.clone(),
        test_stubs: args.test_stubs,
        dry_run: args.dry_run,
        python_sdk: std::env::var("ANG_PY_SDK").is_ok_and(|v| v.trim() == "1"),
    }
}

/// Text line for a build event, if it deserves one.
pub(crate) fn describe_event(ev: &BuildEvent) -> Option<String> {
    match ev {
        BuildEvent::TargetStarted {
            target,
            triple,
            backend_dir,
        } => Some(format!("Generating target {} ({}) -> {}", target, triple, backend_dir.display())),
        BuildEvent::Step(s) if s.status == StepStatus::Skipped && !s.missing_caps.is_empty() => {
            let caps: Vec<String> = s.missing_caps.iter().map(|c| c.to_string()).collect();
            Some(format!("  - skipped {} (missing capabilities: {})", s.step, caps.join(", ")))
        }
        BuildEvent::Step(s) if s.status == StepStatus::Error => Some(format!(
            "  - step {} failed: {}",
            s.step,
            s.error.as_deref().unwrap_or("unknown error")
        )),
        _ => None,
    }
}

/// One full build. Returns `Ok` after printing the success report.
pub(crate) fn build_once(project: &Path, args: &BuildArgs, log: &BuildLog, quiet: bool) -> Result<(), BuildFailure> {
    log.text("Compiling intent to Go...");
    log.event(&LogEvent::new("build", "start").message("Build started"));

    let (result, diagnostics) = run_pipeline(project);
    if !quiet {
        for d in &diagnostics {
            eprintln!("{}", format_diagnostic(d));
        }
    }
    let output = result?;
    if ang_core::diagnostic::has_errors(&diagnostics) {
        return Err(BuildFailure::Diagnostics);
    }

    let opts = build_options(args);
    let resolver = ProjectTemplates::new(project);
    let formatter = Gofmt::default();
    let generator = Generator::new(project, &output.schema, &resolver, &formatter);
    let mut outcome = generator.build(&opts, &mut |ev| {
        if let Some(line) = describe_event(&ev) {
            log.text(&line);
        }
        if let BuildEvent::Step(step) = &ev {
            if step.status != StepStatus::Start {
                log.event(&LogEvent::from_step(step));
            }
        }
    })?;

    for w in &outcome.warnings {
        if !quiet && !log.is_json() {
            eprintln!("Warning: {}", w);
        }
        log.event(&LogEvent::new("build", "warn").message(w));
    }

    for report in &outcome.reports {
        let blind = report.missing.report();
        if !blind.is_empty() {
            log.text(&format!("\n[{}] {}", report.target, blind.trim_end()));
        }
    }

    if let Some(manifest) = outcome.dry_run.as_mut() {
        manifest.optional_steps_skipped = DRY_RUN_SKIPPED.iter().map(|s| s.to_string()).collect();
        let text = if log.is_json() {
            serde_json::to_string(manifest)
        } else {
            serde_json::to_string_pretty(manifest)
        }
        .map_err(|e| ContractError::new(ErrorCode::EmitterStep, "render dry-run manifest", e))?;
        println!("{}", text);
        log.text("\nBuild DRY-RUN SUCCESSFUL.");
        log.event(&LogEvent::new("build", "ok").message("Dry-run build successful"));
        return Ok(());
    }

    run_hooks(project, &outcome, log)?;

    log.text("\nBuild SUCCESSFUL.");
    log.text("Build Report:");
    for r in &outcome.reports {
        log.text(&format!(
            "  - target={} mode={} backend={} plugins={} files={}",
            r.target,
            r.mode.as_str(),
            r.backend_dir.display(),
            r.plugins,
            r.files_generated
        ));
    }
    log.event(&LogEvent::new("build", "ok").message("Build successful"));
    Ok(())
}

fn run_hooks(project: &Path, outcome: &BuildOutcome, log: &BuildLog) -> Result<(), ContractError> {
    let runner = SystemRunner;
    if run_mcp_script(&runner, project)
        .map_err(|e| ContractError::new(ErrorCode::EmitterMcpGen, "run optional MCP generation", e))?
    {
        log.text("MCP server generated.");
    }
    let notes = TscGate::from_env()
        .run(&runner, &outcome.frontend_dirs())
        .map_err(|e| ContractError::new(ErrorCode::EmitterStep, "frontend typecheck gate", e))?;
    for note in notes {
        log.text(&note);
    }
    Ok(())
}

/// Report a failed build in the selected format.
fn report_failure(failure: &BuildFailure, log: &BuildLog, output: OutputFormat, quiet: bool) {
    match failure {
        BuildFailure::Diagnostics => {
            log.event(&LogEvent::new("CUE", "error").message("diagnostic errors"));
            crate::report_error("Build FAILED due to diagnostic errors.", output, quiet);
        }
        BuildFailure::Contract(e) => {
            log.event(&LogEvent::failure(e));
            crate::report_error(&e.header("Build"), output, quiet);
        }
    }
}

/// Detects changes of the project hash between polls.
pub(crate) struct Watcher {
    project: PathBuf,
    last: Option<String>,
}

impl Watcher {
    pub fn new(project: &Path) -> Self {
        Watcher {
            project: project.to_path_buf(),
            last: ang_core::compute_project_hash(project).ok(),
        }
    }

    /// True when the hash differs from the previous poll.
    pub fn poll(&mut self) -> bool {
        let current = ang_core::compute_project_hash(&self.project).ok();
        if current != self.last {
            self.last = current;
            return true;
        }
        false
    }
}

pub(crate) fn cmd_build(args: &BuildArgs, output: OutputFormat, quiet: bool) {
    let format = if output == OutputFormat::Json {
        LogFormat::Json
    } else {
        args.log_format
    };
    let log = BuildLog::new(format, quiet);
    let project = args.project.as_path();

    if !args.watch {
        if let Err(failure) = build_once(project, args, &log, quiet) {
            report_failure(&failure, &log, output, quiet);
            process::exit(1);
        }
        return;
    }

    log.text("Live Mode: Watching for changes in cue/...");
    let interval = Duration::from_millis(args.watch_interval);
    let mut watcher = Watcher::new(project);
    if let Err(failure) = build_once(project, args, &log, quiet) {
        report_failure(&failure, &log, output, quiet);
    }
    loop {
        thread::sleep(interval);
        if watcher.poll() {
            tracing::info!(project = %project.display(), "change detected, rebuilding");
            if let Err(failure) = build_once(project, args, &log, quiet) {
                report_failure(&failure, &log, output, quiet);
            }
        }
    }
}
