//! Structured diagnostics produced by the normalizer and snippet checks.

use serde::{Deserialize, Serialize};
use std::fmt;

use ang_ir::SourceLoc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warn,
    Info,
    Hint,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Hint => "hint",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single location-bearing diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hint: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl Warning {
    pub fn new(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Warning {
            severity,
            code: code.to_string(),
            message: message.into(),
            hint: String::new(),
            file: String::new(),
            line: 0,
            column: 0,
            path: String::new(),
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Warning::new(Severity::Error, code, message)
    }

    pub fn warn(code: &str, message: impl Into<String>) -> Self {
        Warning::new(Severity::Warn, code, message)
    }

    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Warning::new(Severity::Info, code, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    pub fn at(mut self, loc: &SourceLoc) -> Self {
        self.file = loc.file.clone();
        self.line = loc.line;
        self.column = loc.column;
        self.path = loc.path.clone();
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.file.is_empty() {
            write!(f, "{}:{}:{}: ", self.file, self.line, self.column)?;
        }
        write!(f, "{} [{}] {}", self.severity, self.code, self.message)?;
        if !self.hint.is_empty() {
            write!(f, " (hint: {})", self.hint)?;
        }
        Ok(())
    }
}

/// True if any diagnostic has error severity.
pub fn has_errors(diags: &[Warning]) -> bool {
    diags.iter().any(Warning::is_error)
}

/// Order by file, position, then code, so reports are stable.
pub fn sort_diagnostics(diags: &mut [Warning]) {
    diags.sort_by(|a, b| {
        (&a.file, a.line, a.column, &a.code, &a.message).cmp(&(
            &b.file, b.line, b.column, &b.code, &b.message,
        ))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_hint() {
        let loc = SourceLoc {
            file: "cue/architecture/orders.json".into(),
            line: 12,
            column: 5,
            path: "Orders.methods.Create.flow[0]".into(),
        };
        let w = Warning::warn("MISSING_OUTPUT", "repo.Find has no output")
            .with_hint("add \"output\": \"order\"")
            .at(&loc);
        assert_eq!(
            w.to_string(),
            "cue/architecture/orders.json:12:5: warn [MISSING_OUTPUT] repo.Find has no output (hint: add \"output\": \"order\")"
        );
        assert!(!has_errors(&[w.clone()]));
        assert!(has_errors(&[w, Warning::error("X", "boom")]));
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Severity::Warn).unwrap(), "warn");
    }
}
