//! Findings shared by the audit commands.
//!
//! `vet`, `rbac inspect` and `events map` each produce a list of
//! [`Finding`]s; the CLI prints them and fails when any is an error.

use serde::Serialize;

/// Severity level for a finding.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Error,
    Warning,
    Info,
}

/// A notable finding from an audit.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Finding {
    /// Audit that produced the finding (`vet`, `rbac`, `events`).
    pub check: String,
    pub severity: FindingSeverity,
    pub message: String,
    /// Entity, service, action or event the finding is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Finding {
    pub fn new(check: &str, severity: FindingSeverity, message: impl Into<String>) -> Self {
        Finding {
            check: check.to_string(),
            severity,
            message: message.into(),
            subject: None,
        }
    }

    pub fn about(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// True when any finding is an error.
pub fn has_errors(findings: &[Finding]) -> bool {
    findings.iter().any(|f| f.severity == FindingSeverity::Error)
}
