//! Build-log doctor.
//!
//! Detects catalogued error codes in a build log, suggests a fix and a
//! patch template for each, and tracks fix progress across runs in
//! `.ang/doctor_state.json`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ang_core::{ErrorCode, STABLE_ERROR_CODES};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// FSM diagnostics are not pipeline errors but the doctor knows how to fix them.
pub const FSM_UNDEFINED_STATE: &str = "E_FSM_UNDEFINED_STATE";

pub const STATE_PATH: &str = ".ang/doctor_state.json";

const LEGACY_CALL_ARGS: &str = "range can't iterate over";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub path: String,
    pub selector: String,
    pub forced_merge: bool,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoFix {
    pub code: String,
    pub fix: String,
    pub patch: Patch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub code: String,
    pub fix: String,
    pub patch: Patch,
    pub can_auto_apply: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorState {
    pub iteration: u32,
    #[serde(default)]
    pub open_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorResponse {
    pub status: String,
    pub iteration: u32,
    pub errors_fixed: usize,
    pub errors_remaining: usize,
    pub detected_codes: Vec<String>,
    pub known_codes_total: usize,
    pub auto_fixable: Vec<AutoFix>,
    pub suggestions: Vec<Suggestion>,
    pub catalog_total: usize,
    pub catalog: Vec<Suggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_hint: Option<String>,
}

fn code_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(E_[A-Z0-9_]+|[A-Z]+_[A-Z0-9_]*_ERROR)\b").ok())
        .as_ref()
}

/// Every code the doctor has a suggestion for, sorted.
pub fn known_codes() -> BTreeSet<&'static str> {
    std::iter::once(FSM_UNDEFINED_STATE)
        .chain(STABLE_ERROR_CODES.iter().map(|c| c.as_str()))
        .collect()
}

/// Known codes mentioned in `log`, unique and sorted.
pub fn detect_error_codes(log: &str) -> Vec<String> {
    let known = known_codes();
    let Some(re) = code_pattern() else {
        return Vec::new();
    };
    re.find_iter(log)
        .map(|m| m.as_str())
        .filter(|c| known.contains(c))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn unique_sorted(codes: &[String]) -> Vec<String> {
    codes
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// The first run with open codes is iteration 1; afterwards the counter
/// moves only when the set of open codes changes.
pub fn next_state(prev: &DoctorState, current: &[String]) -> DoctorState {
    let current = unique_sorted(current);
    let prev_codes = unique_sorted(&prev.open_codes);
    let iteration = if prev.iteration == 0 && !current.is_empty() {
        1
    } else if current != prev_codes {
        prev.iteration + 1
    } else {
        prev.iteration
    };
    DoctorState {
        iteration,
        open_codes: current,
    }
}

fn count_fixed(prev: &[String], current: &[String]) -> usize {
    unique_sorted(prev).iter().filter(|p| !current.contains(p)).count()
}

struct FsmLocation {
    path: String,
    entity: String,
    state: String,
}

fn capture(pattern: &str, log: &str) -> Option<Vec<String>> {
    let re = Regex::new(pattern).ok()?;
    let caps = re.captures(log)?;
    Some(caps.iter().skip(1).map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default()).collect())
}

fn parse_fsm_location(log: &str) -> FsmLocation {
    let mut entity = None;
    let mut state = None;
    if let Some(c) = capture(r"Entity '([^']+)' FSM transition '[^']*' references undefined state '([^']+)'", log) {
        entity = Some(c[0].clone());
        state = Some(c[1].clone());
    }
    if state.is_none() {
        state = capture(r"undefined state '([^']+)'", log).map(|c| c[0].clone());
    }
    let path = capture(r"at (cue/[^:\s]+):(\d+):\d+", log).map(|c| c[0].clone());
    FsmLocation {
        path: path.unwrap_or_else(|| "cue/domain/order.json".to_string()),
        entity: entity.unwrap_or_else(|| "Order".to_string()),
        state: state.unwrap_or_else(|| "paid".to_string()),
    }
}

fn patch_template(code: ErrorCode) -> Patch {
    let path = match code {
        ErrorCode::CueArchLoad => "cue/architecture/services.json",
        ErrorCode::CueApiLoad => "cue/api/http.json",
        ErrorCode::CueRepoNormalize => "cue/repo/repositories.json",
        ErrorCode::CueScheduleNormalize => "cue/api/schedules.json",
        ErrorCode::CueViewsLoad => "cue/views/views.json",
        ErrorCode::CueProjectLoad => "cue/project/project.json",
        _ => "cue/domain/entities.json",
    };
    Patch {
        path: path.to_string(),
        selector: String::new(),
        forced_merge: false,
        content: format!("// fix {} in this file and re-run build.\n", code.as_str()),
    }
}

/// One-line remedy for a stable error code.
pub fn fix_hint(code: ErrorCode) -> &'static str {
    use ErrorCode::*;
    match code {
        CueDomainLoad => "Fix CUE syntax or type conflicts in domain models.",
        CueArchLoad => "Fix CUE syntax in architecture definitions.",
        CueApiLoad => "Fix CUE syntax in API operations/endpoints.",
        CueRepoNormalize => "Fix repository schema: finder fields, returns/select compatibility.",
        CueTargetsParse | CueProjectParse | CueProjectLoad => "Fix target/project schema in cue/project.",
        CueViewsLoad | CueViewsParse => "Fix view definitions and referenced entities/fields.",
        CuePolicyLoad | CuePolicyValidate => "Fix policy file syntax/constraints under cue/policies.",
        EmitterCapabilityResolve => "Adjust target capabilities (lang/framework/db) in cue/project.",
        EmitterStep => {
            "Inspect failing emitter step and fix upstream CUE intent causing invalid generation context."
        }
        _ => "Inspect error details and patch related CUE source; then re-run build.",
    }
}

pub fn suggestion_for(code: &str, log: &str) -> Suggestion {
    if code == FSM_UNDEFINED_STATE {
        let loc = parse_fsm_location(log);
        return Suggestion {
            code: code.to_string(),
            fix: format!("Add '{}' to {}.fsm.states.", loc.state, loc.entity),
            patch: Patch {
                path: loc.path,
                selector: String::new(),
                forced_merge: false,
                content: format!("// Add state '{}' to fsm.states for entity {}.\n", loc.state, loc.entity),
            },
            can_auto_apply: true,
        };
    }
    let parsed = ErrorCode::parse(code);
    let patch = match parsed {
        Some(ErrorCode::EmitterCapabilityResolve | ErrorCode::EmitterStep) => patch_template(ErrorCode::CueProjectLoad),
        Some(c) => patch_template(c),
        None => patch_template(ErrorCode::CueDomainLoad),
    };
    Suggestion {
        code: code.to_string(),
        fix: parsed
            .map(fix_hint)
            .unwrap_or("Inspect error details and patch related CUE source; then re-run build.")
            .to_string(),
        patch,
        can_auto_apply: false,
    }
}

/// Suggestions for every known code.
pub fn suggestion_catalog(log: &str) -> Vec<Suggestion> {
    known_codes().into_iter().map(|c| suggestion_for(c, log)).collect()
}

pub struct Doctor {
    state_path: PathBuf,
}

impl Doctor {
    pub fn new(project_root: &Path) -> Self {
        Doctor {
            state_path: project_root.join(STATE_PATH),
        }
    }

    fn load_state(&self) -> DoctorState {
        let Ok(bytes) = std::fs::read(&self.state_path) else {
            return DoctorState::default();
        };
        match serde_json::from_slice::<DoctorState>(&bytes) {
            Ok(mut st) => {
                st.open_codes = unique_sorted(&st.open_codes);
                st
            }
            Err(e) => {
                tracing::debug!(path = %self.state_path.display(), error = %e, "ignoring corrupt doctor state");
                DoctorState::default()
            }
        }
    }

    fn save_state(&self, state: &DoctorState) {
        let result = self
            .state_path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| {
                let body = serde_json::to_vec_pretty(state).map_err(std::io::Error::other)?;
                std::fs::write(&self.state_path, body)
            });
        if let Err(e) = result {
            tracing::warn!(path = %self.state_path.display(), error = %e, "could not persist doctor state");
        }
    }

    pub fn analyze(&self, log: &str) -> DoctorResponse {
        let codes = detect_error_codes(log);
        let catalog = suggestion_catalog(log);

        let prev = self.load_state();
        let next = next_state(&prev, &codes);
        let errors_fixed = count_fixed(&prev.open_codes, &codes);
        self.save_state(&next);

        let suggestions: Vec<Suggestion> = codes.iter().map(|c| suggestion_for(c, log)).collect();
        let auto_fixable = suggestions
            .iter()
            .filter(|s| s.can_auto_apply)
            .map(|s| AutoFix {
                code: s.code.clone(),
                fix: s.fix.clone(),
                patch: s.patch.clone(),
            })
            .collect();

        DoctorResponse {
            status: "Analyzed".to_string(),
            iteration: next.iteration,
            errors_fixed,
            errors_remaining: codes.len(),
            detected_codes: codes,
            known_codes_total: catalog.len(),
            auto_fixable,
            suggestions,
            catalog_total: catalog.len(),
            catalog,
            legacy_hint: log
                .contains(LEGACY_CALL_ARGS)
                .then(|| "logic.Call args must be a list".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_keeps_catalogued_codes_only() {
        let log = "CUE_DOMAIN_LOAD_ERROR: bad\nE_FSM_UNDEFINED_STATE x\nE_SOMETHING_ELSE\nCUE_DOMAIN_LOAD_ERROR again";
        assert_eq!(detect_error_codes(log), vec!["CUE_DOMAIN_LOAD_ERROR", "E_FSM_UNDEFINED_STATE"]);
        assert!(detect_error_codes("all good").is_empty());
    }

    #[test]
    fn iteration_advances_only_on_change() {
        let a = vec!["CUE_API_LOAD_ERROR".to_string()];
        let s1 = next_state(&DoctorState::default(), &a);
        assert_eq!(s1.iteration, 1);
        assert_eq!(next_state(&s1, &a).iteration, 1);
        let s2 = next_state(&s1, &[]);
        assert_eq!(s2.iteration, 2);
        assert!(s2.open_codes.is_empty());
        assert_eq!(next_state(&DoctorState::default(), &[]).iteration, 0);
    }

    #[test]
    fn fsm_suggestion_is_auto_applicable() {
        let log = "E_FSM_UNDEFINED_STATE: Entity 'Invoice' FSM transition 'pay' references undefined state 'settled' at cue/domain/invoice.json:12:4";
        let s = suggestion_for(FSM_UNDEFINED_STATE, log);
        assert!(s.can_auto_apply);
        assert_eq!(s.fix, "Add 'settled' to Invoice.fsm.states.");
        assert_eq!(s.patch.path, "cue/domain/invoice.json");
    }

    #[test]
    fn analyze_tracks_progress_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let doctor = Doctor::new(dir.path());

        let first = doctor.analyze("CUE_API_LOAD_ERROR and CUE_VIEWS_LOAD_ERROR\nrange can't iterate over x");
        assert_eq!(first.iteration, 1);
        assert_eq!(first.errors_remaining, 2);
        assert_eq!(first.errors_fixed, 0);
        assert_eq!(first.legacy_hint.as_deref(), Some("logic.Call args must be a list"));
        assert_eq!(first.suggestions[0].patch.path, "cue/api/http.json");
        assert!(first.auto_fixable.is_empty());
        assert_eq!(first.catalog_total, STABLE_ERROR_CODES.len() + 1);
        assert!(dir.path().join(STATE_PATH).exists());

        let second = doctor.analyze("CUE_VIEWS_LOAD_ERROR");
        assert_eq!(second.iteration, 2);
        assert_eq!(second.errors_fixed, 1);
        assert_eq!(second.errors_remaining, 1);
        assert!(second.legacy_hint.is_none());
    }
}
