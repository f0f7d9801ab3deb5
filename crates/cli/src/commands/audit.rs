//! Read-only audits over a compiled project (`vet`, `rbac`, `events`) and
//! the single-artifact generators (`draw`, `mcp`, `test gen`).

use std::fmt::Write as _;
use std::path::Path;
use std::process;

use ang_analyze::{
    event_findings, events_map, generate_flow_cases, has_errors, inspect_rbac, logic_errors, rbac_actions, vet,
    EventFlow, Finding, RbacAudit,
};
use ang_codegen::{resolve_target_capabilities, Emitter, Gofmt, MainContext, OutputRoots, ProjectTemplates};
use ang_core::{ContractError, ErrorCode, Warning};
use ang_ir::Schema;
use serde_json::json;

use super::{compile_or_exit, fail, print_json, run_pipeline};
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_vet(project: &Path, output: OutputFormat, quiet: bool) {
    let out = compile_or_exit(project, "Vet", output, quiet);
    let findings = vet(&out);
    match output {
        OutputFormat::Json => print_json(&json!({"ok": !has_errors(&findings), "findings": findings}), output, quiet),
        OutputFormat::Text => {
            if !quiet {
                println!("Checking architectural invariants...");
                for f in &findings {
                    println!("Violation: {}", f.message);
                }
            }
        }
    }
    if has_errors(&findings) {
        report_error("\nInvariants check FAILED.", output, quiet);
        process::exit(1);
    }
    if output == OutputFormat::Text && !quiet {
        println!("All architectural laws are satisfied.");
    }
}

pub(crate) fn render_logic_errors(errors: &[&Warning]) -> String {
    let mut out = String::new();
    for d in errors {
        let _ = writeln!(out, "\nLogic Error at {}:{}:{}", d.file, d.line, d.column);
        let _ = writeln!(out, "   {}", d.message);
    }
    out
}

pub(crate) fn cmd_vet_logic(project: &Path, output: OutputFormat, quiet: bool) {
    if output == OutputFormat::Text && !quiet {
        println!("Auditing embedded Go logic in CUE files...");
    }
    // Snippet errors are diagnostics of the CUE stage; a later failure
    // does not hide them.
    let (_, diagnostics) = run_pipeline(project);
    let errors = logic_errors(&diagnostics);
    match output {
        OutputFormat::Json => print_json(&json!({"ok": errors.is_empty(), "errors": errors}), output, quiet),
        OutputFormat::Text => {
            if !quiet {
                print!("{}", render_logic_errors(&errors));
            }
        }
    }
    if !errors.is_empty() {
        process::exit(1);
    }
    if output == OutputFormat::Text && !quiet {
        println!("No Go syntax errors in embedded logic.");
    }
}

pub(crate) fn cmd_rbac_actions(project: &Path, output: OutputFormat, quiet: bool) {
    let out = compile_or_exit(project, "RBAC", output, quiet);
    let actions = rbac_actions(&out.schema);
    match output {
        OutputFormat::Json => print_json(&actions, output, quiet),
        OutputFormat::Text => {
            println!("Registered RBAC Actions (Service.Method):");
            println!("----------------------------------------");
            for a in &actions {
                println!("{}", a);
            }
        }
    }
}

pub(crate) fn render_rbac_audit(audit: &RbacAudit) -> String {
    let mut out = String::from("RBAC Security Audit:\n--------------------\n");
    if !audit.has_policies {
        out.push_str("No RBAC policies found in CUE (cue/policies or cue/rbac).\n");
    }
    out.push_str("\nUNPROTECTED METHODS (Missing from policies):\n");
    for a in &audit.unprotected {
        let _ = writeln!(out, "   - {}", a);
    }
    if !audit.zombies.is_empty() {
        out.push_str("\nZOMBIE POLICIES (References non-existent methods):\n");
        for z in &audit.zombies {
            let _ = writeln!(out, "   - {}", z);
        }
    }
    let _ = writeln!(out, "\nPROTECTED: {} methods", audit.protected.len());
    out
}

pub(crate) fn cmd_rbac_inspect(project: &Path, output: OutputFormat, quiet: bool) {
    let out = compile_or_exit(project, "RBAC", output, quiet);
    let audit = inspect_rbac(&out.schema);
    match output {
        OutputFormat::Json => print_json(&audit, output, quiet),
        OutputFormat::Text => print!("{}", render_rbac_audit(&audit)),
    }
}

pub(crate) fn render_events_map(flows: &[EventFlow]) -> String {
    let mut out = String::from(
        "Event Flow Map (Event-Driven Architecture Audit):\n--------------------------------------------------\n",
    );
    if flows.is_empty() {
        out.push_str("No event publishers or subscribers found in current architecture.\n");
        return out;
    }
    for f in flows {
        let _ = writeln!(out, "\nEvent: {}", f.event);
        if f.producers.is_empty() {
            out.push_str("   PRODUCER MISSING (External or manual)\n");
        } else {
            out.push_str("   Produced by:\n");
            for p in &f.producers {
                let _ = writeln!(out, "     - {}", p);
            }
        }
        if f.consumers.is_empty() {
            out.push_str("   DEAD END (No subscribers found)\n");
        } else {
            out.push_str("   Consumed by:\n");
            for c in &f.consumers {
                let _ = writeln!(out, "     - {} (Handler: {})", c.service, c.handler);
            }
        }
    }
    out
}

pub(crate) fn cmd_events_map(project: &Path, output: OutputFormat, quiet: bool) {
    let out = compile_or_exit(project, "Events", output, quiet);
    let flows = events_map(&out.schema);
    let findings: Vec<Finding> = event_findings(&out.schema, &flows);
    match output {
        OutputFormat::Json => print_json(&json!({"events": flows, "findings": findings}), output, quiet),
        OutputFormat::Text => print!("{}", render_events_map(&flows)),
    }
}

/// Emitter over the first target, rooted at the project.
fn project_emitter<'a>(
    project: &Path,
    schema: &'a Schema,
    resolver: &'a ProjectTemplates,
    formatter: &'a Gofmt,
) -> Result<Emitter<'a>, ContractError> {
    let target = schema.targets.first().ok_or_else(|| {
        ContractError::new(ErrorCode::EmitterOptions, "select target", "project declares no targets")
    })?;
    let caps = resolve_target_capabilities(target)?;
    let main = MainContext::new(schema, &target.name, &target.framework, &caps);
    let roots = OutputRoots {
        backend: project.to_path_buf(),
        frontend: project.join("sdk"),
        frontend_admin: project.join("frontend-admin"),
    };
    Ok(Emitter::new(schema, main, roots, resolver, formatter))
}

pub(crate) fn cmd_draw(project: &Path, output: OutputFormat, quiet: bool) {
    if output == OutputFormat::Text && !quiet {
        println!("Drawing architecture...");
    }
    let out = compile_or_exit(project, "Draw", output, quiet);
    let resolver = ProjectTemplates::new(project);
    let formatter = Gofmt::default();
    let mut em = match project_emitter(project, &out.schema, &resolver, &formatter) {
        Ok(em) => em,
        Err(e) => fail(&e, "Draw", output, quiet),
    };
    if let Err(e) = em.emit_mermaid() {
        fail(
            &ContractError::new(ErrorCode::EmitterStep, "emit mermaid", e),
            "Draw",
            output,
            quiet,
        );
    }
    match output {
        OutputFormat::Json => print_json(&json!({"status": "ok", "files": em.generated()}), output, quiet),
        OutputFormat::Text => {
            if !quiet {
                println!("Draw SUCCESSFUL.");
            }
        }
    }
}

pub(crate) fn cmd_mcp(project: &Path, output: OutputFormat, quiet: bool) {
    let out = compile_or_exit(project, "MCP", output, quiet);
    let resolver = ProjectTemplates::new(project);
    let formatter = Gofmt::default();
    let mut em = match project_emitter(project, &out.schema, &resolver, &formatter) {
        Ok(em) => em,
        Err(e) => fail(&e, "MCP", output, quiet),
    };
    if let Err(e) = em.emit_mcp_tools() {
        fail(
            &ContractError::new(ErrorCode::EmitterMcpGen, "emit mcp tools", e),
            "MCP",
            output,
            quiet,
        );
    }
    match output {
        OutputFormat::Json => print_json(&json!({"status": "ok", "files": em.generated()}), output, quiet),
        OutputFormat::Text => {
            if !quiet {
                println!("MCP tools written to {}", project.join("mcp/tools.json").display());
            }
        }
    }
}

pub(crate) fn cmd_test_gen(project: &Path, out_rel: &Path, output: OutputFormat, quiet: bool) {
    let out = compile_or_exit(project, "Test generation", output, quiet);
    let out_path = project.join(out_rel);
    let doc = generate_flow_cases(&out.schema, project, out_rel);
    if let Err(e) = doc.write(&out_path) {
        report_error(&format!("Test generation FAILED: {}", e), output, quiet);
        process::exit(1);
    }
    match output {
        OutputFormat::Json => print_json(&doc.manifest, output, quiet),
        OutputFormat::Text => {
            if !quiet {
                println!(
                    "Generated {} flow test cases across {} methods -> {}",
                    doc.manifest.cases,
                    doc.manifest.methods,
                    out_path.display()
                );
            }
        }
    }
}
