//! Build progress reporting: human-readable lines or one JSON event per line.

use ang_codegen::{StepEvent, StepStatus};
use ang_core::ContractError;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::LogFormat;

/// One line of `--log-format json` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct LogEvent {
    pub ts: String,
    pub stage: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub step: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_generated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_caps: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

fn now() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

impl LogEvent {
    pub fn new(stage: &str, status: &str) -> Self {
        LogEvent {
            ts: now(),
            stage: stage.to_string(),
            status: status.to_string(),
            ..LogEvent::default()
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn from_step(ev: &StepEvent) -> Self {
        let status = match ev.status {
            StepStatus::Start => "start",
            StepStatus::Ok => "ok",
            StepStatus::Skipped => "skipped",
            StepStatus::Error => "error",
        };
        LogEvent {
            target: ev.target.clone(),
            step: ev.step.clone(),
            duration_ms: ev.duration_ms,
            files_generated: ev.files_generated,
            warnings: (!ev.warnings.is_empty()).then_some(ev.warnings.len()),
            missing_caps: ev.missing_caps.iter().map(|c| c.to_string()).collect(),
            error: ev.error.clone().unwrap_or_default(),
            ..LogEvent::new("step", status)
        }
    }

    /// Final event of a failed build.
    pub fn failure(err: &ContractError) -> Self {
        LogEvent {
            error: format!("{}: {}: {}", err.code, err.op, err.cause),
            ..LogEvent::new(err.stage.as_str(), "error")
        }
    }
}

/// Writes build progress to stdout in the selected format. Text lines are
/// dropped in JSON mode and events are dropped in text mode, so stdout in
/// JSON mode is always one event per line.
pub(crate) struct BuildLog {
    format: LogFormat,
    quiet: bool,
}

impl BuildLog {
    pub fn new(format: LogFormat, quiet: bool) -> Self {
        BuildLog { format, quiet }
    }

    pub fn is_json(&self) -> bool {
        self.format == LogFormat::Json
    }

    pub fn text(&self, line: &str) {
        if self.format == LogFormat::Text && !self.quiet {
            println!("{}", line);
        }
    }

    pub fn event(&self, ev: &LogEvent) {
        if self.format == LogFormat::Json {
            if let Ok(line) = serde_json::to_string(ev) {
                println!("{}", line);
            }
        }
    }
}
