//! Build steps and the registry that runs them.
//!
//! A step renders one artifact family. Plugins register steps in the order
//! they should run; [`StepRegistry::execute`] walks that order, skipping
//! steps whose capabilities the target lacks and reporting every transition
//! to a [`StepEvent`] sink.

use std::collections::HashSet;
use std::time::Instant;

use ang_core::{ContractError, ErrorCode};
use serde::Serialize;

use crate::capability::{Capability, CapabilitySet, Profile};
use crate::emitter::Emitter;
use crate::error::CodegenError;

/// Artifact keys that may be produced by at most one step per language.
pub const CRITICAL_ARTIFACT_KEYS: &[&str] = &[
    "di_container",
    "http_handlers",
    "frontend_sdk",
    "service_impl",
    "server_main",
];

type RunFn = Box<dyn Fn(&mut Emitter<'_>) -> Result<(), CodegenError>>;
type SkipFn = Box<dyn Fn(&Emitter<'_>) -> bool>;

pub struct Step {
    pub name: String,
    pub artifact_key: String,
    pub requires: Vec<Capability>,
    /// Only run for targets resolved to this profile.
    pub profile: Option<Profile>,
    run: RunFn,
    skip: Option<SkipFn>,
}

impl Step {
    pub fn new(
        name: impl Into<String>,
        artifact_key: impl Into<String>,
        run: impl Fn(&mut Emitter<'_>) -> Result<(), CodegenError> + 'static,
    ) -> Self {
        Step {
            name: name.into(),
            artifact_key: artifact_key.into(),
            requires: Vec::new(),
            profile: None,
            run: Box::new(run),
            skip: None,
        }
    }

    pub fn requires(mut self, caps: &[Capability]) -> Self {
        self.requires.extend_from_slice(caps);
        self
    }

    /// Restrict the step to `profile`. A bare artifact key gets the
    /// profile's language scope, `server_main` becoming `go:server_main`.
    pub fn for_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        if !self.artifact_key.is_empty() && !self.artifact_key.contains(':') {
            self.artifact_key = format!("{}:{}", profile.lang(), self.artifact_key);
        }
        self
    }

    /// Skip the step when `pred` holds for the emitter about to run it.
    pub fn skip_when(mut self, pred: impl Fn(&Emitter<'_>) -> bool + 'static) -> Self {
        self.skip = Some(Box::new(pred));
        self
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("artifact_key", &self.artifact_key)
            .field("requires", &self.requires)
            .field("profile", &self.profile)
            .finish()
    }
}

// ── Events ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Start,
    Ok,
    Skipped,
    Error,
}

/// One step transition, as reported to the build log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepEvent {
    pub target: String,
    pub step: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_generated: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_caps: Vec<Capability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepEvent {
    fn new(target: &str, step: &str, status: StepStatus) -> Self {
        StepEvent {
            target: target.to_string(),
            step: step.to_string(),
            status,
            duration_ms: None,
            files_generated: None,
            warnings: Vec::new(),
            missing_caps: Vec::new(),
            error: None,
        }
    }
}

// ── Registry ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct StepRegistry {
    steps: Vec<Step>,
    names: HashSet<String>,
    keys: HashSet<String>,
    error: Option<ContractError>,
}

fn registration_error(cause: String) -> ContractError {
    ContractError::new(ErrorCode::EmitterStep, "register step", cause)
}

impl StepRegistry {
    pub fn new() -> Self {
        StepRegistry::default()
    }

    /// Add `step`. Invalid registrations are dropped; the first such error
    /// is kept and returned by [`StepRegistry::execute`].
    pub fn register(&mut self, step: Step) {
        let problem = if step.name.trim().is_empty() {
            Some("step name must not be empty".to_string())
        } else if self.names.contains(&step.name) {
            Some(format!("duplicate step name \"{}\"", step.name))
        } else if !step.artifact_key.is_empty() && self.keys.contains(&step.artifact_key) {
            Some(format!(
                "duplicate artifact key \"{}\" (step \"{}\")",
                step.artifact_key, step.name
            ))
        } else {
            None
        };
        if let Some(cause) = problem {
            tracing::debug!(step = %step.name, %cause, "step rejected");
            if self.error.is_none() {
                self.error = Some(registration_error(cause));
            }
            return;
        }
        self.names.insert(step.name.clone());
        if !step.artifact_key.is_empty() {
            self.keys.insert(step.artifact_key.clone());
        }
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn registration_error(&self) -> Option<&ContractError> {
        self.error.as_ref()
    }

    /// Run every registered step in order against `em`.
    ///
    /// Stops at the first failing step; its error is wrapped as
    /// `EMITTER_STEP_ERROR` naming target and step.
    pub fn execute(
        &self,
        target: &str,
        caps: &CapabilitySet,
        em: &mut Emitter<'_>,
        sink: &mut dyn FnMut(StepEvent),
    ) -> Result<(), ContractError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        for step in &self.steps {
            if step.profile.is_some_and(|p| p != caps.profile) {
                continue;
            }
            let missing = caps.missing(&step.requires);
            if !missing.is_empty() {
                tracing::debug!(target_name = target, step = %step.name, ?missing, "step skipped");
                let mut ev = StepEvent::new(target, &step.name, StepStatus::Skipped);
                ev.missing_caps = missing;
                sink(ev);
                continue;
            }
            if step.skip.as_ref().is_some_and(|skip| skip(em)) {
                sink(StepEvent::new(target, &step.name, StepStatus::Skipped));
                continue;
            }

            sink(StepEvent::new(target, &step.name, StepStatus::Start));
            let files_before = em.generated().len();
            let warnings_before = em.warnings().len();
            let started = Instant::now();
            let result = (step.run)(em);
            let elapsed = started.elapsed().as_millis() as u64;
            match result {
                Ok(()) => {
                    let mut ev = StepEvent::new(target, &step.name, StepStatus::Ok);
                    ev.duration_ms = Some(elapsed);
                    ev.files_generated = Some(em.generated().len() - files_before);
                    ev.warnings = em.warnings()[warnings_before..].to_vec();
                    sink(ev);
                }
                Err(err) => {
                    let mut ev = StepEvent::new(target, &step.name, StepStatus::Error);
                    ev.duration_ms = Some(elapsed);
                    ev.error = Some(err.to_string());
                    sink(ev);
                    return Err(ContractError::new(
                        ErrorCode::EmitterStep,
                        step.name.clone(),
                        format!("target={} step={}: {}", target, step.name, err),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// `true` when `key` is a critical key, bare or language-prefixed.
pub fn is_critical_key(key: &str) -> bool {
    let bare = key.rsplit(':').next().unwrap_or(key);
    CRITICAL_ARTIFACT_KEYS.contains(&bare)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::test_support::*;
    use crate::emitter::Root;
    use ang_ir::Schema;

    fn write_step(name: &str, key: &str, rel: &'static str) -> Step {
        Step::new(name, key, move |em| em.write(Root::Backend, rel, b"x"))
    }

    #[test]
    fn registration_keeps_first_error() {
        let mut reg = StepRegistry::new();
        reg.register(write_step("A", "a", "a.txt"));
        reg.register(write_step("A", "b", "b.txt"));
        reg.register(write_step("", "c", "c.txt"));
        reg.register(write_step("C", "a", "c.txt"));
        assert_eq!(reg.len(), 1);
        let err = reg.registration_error().unwrap();
        assert_eq!(err.code, ErrorCode::EmitterStep);
        assert!(err.cause.contains("duplicate step name \"A\""));
    }

    #[test]
    fn execute_reports_skips_and_successes() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Schema::default();
        let mut em = emitter(&schema, dir.path());
        let mut reg = StepRegistry::new();
        reg.register(write_step("Plain", "plain", "plain.txt"));
        reg.register(write_step("Needs Mongo", "mongo", "mongo.txt").requires(&[Capability::Mongo]));
        reg.register(write_step("Python Only", "py", "py.txt").for_profile(Profile::PythonFastapi));
        reg.register(write_step("Skipped", "skip", "skip.txt").skip_when(|_| true));
        let mut events = Vec::new();
        reg.execute("api", &go_caps(), &mut em, &mut |ev| events.push(ev))
            .unwrap();
        let summary: Vec<(&str, StepStatus)> = events.iter().map(|e| (e.step.as_str(), e.status)).collect();
        assert_eq!(
            summary,
            vec![
                ("Plain", StepStatus::Start),
                ("Plain", StepStatus::Ok),
                ("Needs Mongo", StepStatus::Skipped),
                ("Skipped", StepStatus::Skipped),
            ]
        );
        assert_eq!(events[1].files_generated, Some(1));
        assert_eq!(events[2].missing_caps, vec![Capability::Mongo]);
        assert!(!dir.path().join("backend/mongo.txt").exists());
    }

    #[test]
    fn failures_name_target_and_step() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Schema::default();
        let mut em = emitter(&schema, dir.path());
        let mut reg = StepRegistry::new();
        reg.register(write_step("Escape", "escape", "../oops.txt"));
        let err = reg
            .execute("api", &go_caps(), &mut em, &mut |_| {})
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmitterStep);
        assert_eq!(err.op, "Escape");
        assert!(err.cause.starts_with("target=api step=Escape: "));
    }

    #[test]
    fn critical_keys_match_with_language_prefix() {
        assert!(is_critical_key("go:server_main"));
        assert!(is_critical_key("frontend_sdk"));
        assert!(!is_critical_key("go:logger"));
    }

    #[test]
    fn profile_scopes_bare_keys() {
        let step = write_step("Main", "server_main", "main.go").for_profile(Profile::GoLegacy);
        assert_eq!(step.artifact_key, "go:server_main");
        let step = write_step("Main", "python:server_main", "main.py").for_profile(Profile::PythonFastapi);
        assert_eq!(step.artifact_key, "python:server_main");
        assert!(is_critical_key(&step.artifact_key));
    }
}
