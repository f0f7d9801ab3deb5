//! Pipeline-to-diagnostic conversion.
//!
//! The workspace's `cue/` tree (and `cue.mod`, when present) is copied to a
//! scratch directory, open documents are written over their on-disk
//! versions, and the full pipeline runs there. Every located warning
//! becomes an LSP diagnostic on the workspace file it points at. A run that
//! fails before producing any diagnostic is mapped through the
//! `cue/<file>:<line>:<col>` reference in its error message, if it has one.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use ang_core::{run_with_options, PipelineOptions, Severity, Warning};
use lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range};
use regex::Regex;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::uri::{path_to_uri, uri_to_path};

pub type DiagnosticsByUri = BTreeMap<String, Vec<Diagnostic>>;

/// Produces the diagnostics of a workspace with `docs` (URI → text)
/// overlaid on it.
pub trait DiagnosticsProvider {
    fn collect(&self, root: &Path, docs: &BTreeMap<String, String>) -> io::Result<DiagnosticsByUri>;
}

/// Runs the compiler pipeline over a scratch copy of the workspace.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineDiagnostics;

impl DiagnosticsProvider for PipelineDiagnostics {
    fn collect(&self, root: &Path, docs: &BTreeMap<String, String>) -> io::Result<DiagnosticsByUri> {
        let scratch = tempfile::Builder::new().prefix("ang-lsp-").tempdir()?;
        let proj = scratch.path().join("proj");
        std::fs::create_dir_all(&proj)?;
        for dir in ["cue", "cue.mod"] {
            let src = root.join(dir);
            if src.is_dir() {
                copy_dir(&src, &proj.join(dir))?;
            }
        }
        for (uri, text) in docs {
            let Some(path) = uri_to_path(uri) else {
                continue;
            };
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let dest = proj.join(rel);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&dest, text)?;
        }

        let seen = RefCell::new(Vec::new());
        let opts = PipelineOptions {
            warning_sink: Some(Box::new(|w: &Warning| seen.borrow_mut().push(w.clone()))),
            ..PipelineOptions::default()
        };
        let result = run_with_options(&proj, opts);
        let diags = seen.into_inner();
        tracing::debug!(diagnostics = diags.len(), ok = result.is_ok(), "workspace analyzed");

        let mut out = DiagnosticsByUri::new();
        for d in diags.iter().filter(|d| !d.file.is_empty()) {
            out.entry(path_to_uri(&root.join(&d.file)))
                .or_default()
                .push(to_lsp_diagnostic(d));
        }
        if let Err(e) = result {
            if diags.is_empty() {
                if let Some((uri, diag)) = fallback_diagnostic(&e.to_string(), root) {
                    out.entry(uri).or_default().push(diag);
                }
            }
        }
        Ok(out)
    }
}

fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::from)?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn severity(s: Severity) -> DiagnosticSeverity {
    match s {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warn => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

/// One-character range at the warning's (1-based) position.
pub fn to_lsp_diagnostic(w: &Warning) -> Diagnostic {
    let line = w.line.saturating_sub(1);
    let col = w.column.saturating_sub(1);
    let mut message = w.message.trim().to_string();
    if !w.hint.is_empty() {
        message.push_str("\nHint: ");
        message.push_str(w.hint.trim());
    }
    Diagnostic {
        range: Range::new(Position::new(line, col), Position::new(line, col + 1)),
        severity: Some(severity(w.severity)),
        code: (!w.code.is_empty()).then(|| NumberOrString::String(w.code.clone())),
        source: Some("ang".to_string()),
        message,
        ..Default::default()
    }
}

/// Error diagnostic at the first `cue/<file>:<line>:<col>` reference of
/// `message`.
pub fn fallback_diagnostic(message: &str, root: &Path) -> Option<(String, Diagnostic)> {
    let re = Regex::new(r"(cue/[^:\s]+):(\d+):(\d+)").ok()?;
    let caps = re.captures(message)?;
    let line: u32 = caps[2].parse().ok()?;
    let col: u32 = caps[3].parse().ok()?;
    let line = line.saturating_sub(1);
    let diag = Diagnostic {
        range: Range::new(
            Position::new(line, col.saturating_sub(1)),
            Position::new(line, col.max(1)),
        ),
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some("ang".to_string()),
        message: message.to_string(),
        ..Default::default()
    };
    Some((path_to_uri(&root.join(&caps[1])), diag))
}

/// SHA-256 of the canonical JSON of `diags`.
pub fn diagnostics_hash(diags: &[Diagnostic]) -> String {
    let bytes = serde_json::to_vec(diags).unwrap_or_default();
    format!("{:x}", Sha256::digest(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_map_to_zero_based_ranges_with_hints() {
        let mut w = Warning::error("MISSING_OUTPUT", "Auth.Login: repo.Find missing 'output'")
            .with_hint("add output");
        w.file = "cue/architecture/auth.json".into();
        w.line = 7;
        w.column = 9;
        let d = to_lsp_diagnostic(&w);
        assert_eq!(d.range.start, Position::new(6, 8));
        assert_eq!(d.range.end, Position::new(6, 9));
        assert_eq!(d.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(d.code, Some(NumberOrString::String("MISSING_OUTPUT".into())));
        assert_eq!(d.message, "Auth.Login: repo.Find missing 'output'\nHint: add output");

        let info = to_lsp_diagnostic(&Warning::info("X", "m"));
        assert_eq!(info.severity, Some(DiagnosticSeverity::INFORMATION));
        assert_eq!(info.range.start, Position::new(0, 0));
    }

    #[cfg(not(windows))]
    #[test]
    fn fallback_uses_the_first_cue_location() {
        let msg = "CUE:CUE_DOMAIN_LOAD_ERROR:load cue/domain: cue/domain/user.json:3:14: expected ','";
        let (uri, d) = fallback_diagnostic(msg, Path::new("/w")).unwrap();
        assert_eq!(uri, "file:///w/cue/domain/user.json");
        assert_eq!(d.range.start, Position::new(2, 13));
        assert_eq!(d.range.end, Position::new(2, 14));
        assert!(fallback_diagnostic("no location", Path::new("/w")).is_none());
    }

    #[test]
    fn hash_is_stable() {
        let d = to_lsp_diagnostic(&Warning::warn("X", "m"));
        assert_eq!(diagnostics_hash(&[d.clone()]), diagnostics_hash(&[d]));
        assert_ne!(diagnostics_hash(&[]), diagnostics_hash(&[to_lsp_diagnostic(&Warning::warn("Y", "m"))]));
    }
}
