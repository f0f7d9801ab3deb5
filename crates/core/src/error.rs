//! Pipeline error taxonomy.
//!
//! Every failure that leaves a pipeline stage is a [`ContractError`]: the
//! stage it came from, a stable [`ErrorCode`], the operation that failed and
//! a human-readable cause. Codes are part of the public contract (doctor,
//! `explain`, JSON build logs) and never change spelling.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    #[serde(rename = "CUE")]
    Cue,
    #[serde(rename = "IR")]
    Ir,
    #[serde(rename = "EMITTERS")]
    Emitters,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Cue => "CUE",
            Stage::Ir => "IR",
            Stage::Emitters => "EMITTERS",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! error_codes {
    ($($variant:ident => $text:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ErrorCode {
            $($variant,)*
        }

        impl ErrorCode {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ErrorCode::$variant => $text,)*
                }
            }

            pub fn parse(s: &str) -> Option<ErrorCode> {
                match s {
                    $($text => Some(ErrorCode::$variant),)*
                    _ => None,
                }
            }
        }

        /// Canonical registry of stage error codes, in declaration order.
        pub const STABLE_ERROR_CODES: &[ErrorCode] = &[$(ErrorCode::$variant,)*];
    };
}

error_codes! {
    // CUE stage
    CueDomainLoad => "CUE_DOMAIN_LOAD_ERROR",
    CueArchLoad => "CUE_ARCH_LOAD_ERROR",
    CueApiLoad => "CUE_API_LOAD_ERROR",
    CueEntityNormalize => "CUE_ENTITY_NORMALIZE_ERROR",
    CueServiceNormalize => "CUE_SERVICE_NORMALIZE_ERROR",
    CueEndpointNormalize => "CUE_ENDPOINT_NORMALIZE_ERROR",
    CueRepoNormalize => "CUE_REPO_NORMALIZE_ERROR",
    CueScheduleNormalize => "CUE_SCHEDULE_NORMALIZE_ERROR",
    CuePipeline => "CUE_PIPELINE_ERROR",
    CueInfraLoad => "CUE_INFRA_LOAD_ERROR",
    CueInfraConfigParse => "CUE_INFRA_CONFIG_PARSE_ERROR",
    CueInfraAuthParse => "CUE_INFRA_AUTH_PARSE_ERROR",
    CueRbacLoad => "CUE_RBAC_LOAD_ERROR",
    CueRbacParse => "CUE_RBAC_PARSE_ERROR",
    CuePoliciesLoad => "CUE_POLICIES_LOAD_ERROR",
    CuePoliciesParse => "CUE_POLICIES_PARSE_ERROR",
    CueViewsLoad => "CUE_VIEWS_LOAD_ERROR",
    CueViewsParse => "CUE_VIEWS_PARSE_ERROR",
    CueProjectLoad => "CUE_PROJECT_LOAD_ERROR",
    CueProjectParse => "CUE_PROJECT_PARSE_ERROR",
    CueTargetsParse => "CUE_TARGETS_PARSE_ERROR",
    CueLintLoad => "CUE_LINT_LOAD_ERROR",
    CuePolicyValidate => "CUE_POLICY_VALIDATE_ERROR",
    CuePolicyLoad => "CUE_POLICY_LOAD_ERROR",
    CueTestCoveragePipeline => "CUE_TEST_COVERAGE_PIPELINE_ERROR",
    // IR stage
    IrConvertTransform => "IR_CONVERT_TRANSFORM_ERROR",
    IrServiceDependencies => "IR_SERVICE_DEPENDENCY_ERROR",
    IrSemanticValidate => "IR_SEMANTIC_VALIDATE_ERROR",
    // Emitters stage
    EmitterOptions => "EMITTER_OPTIONS_ERROR",
    EmitterStep => "EMITTER_STEP_ERROR",
    EmitterMcpGen => "EMITTER_MCP_GENERATION_ERROR",
    EmitterCapabilityResolve => "EMITTER_CAPABILITY_RESOLVE_ERROR",
}

impl ErrorCode {
    /// The stage a code belongs to.
    pub fn stage(&self) -> Stage {
        let s = self.as_str();
        if s.starts_with("CUE_") {
            Stage::Cue
        } else if s.starts_with("IR_") {
            Stage::Ir
        } else {
            Stage::Emitters
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A typed pipeline failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractError {
    pub stage: Stage,
    pub code: ErrorCode,
    pub op: String,
    pub cause: String,
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op.is_empty() {
            write!(f, "[{}:{}] {}", self.stage, self.code, self.cause)
        } else {
            write!(f, "[{}:{}] {}: {}", self.stage, self.code, self.op, self.cause)
        }
    }
}

impl std::error::Error for ContractError {}

impl ContractError {
    /// Wrap a cause under `code`; the stage is derived from the code.
    pub fn new(code: ErrorCode, op: impl Into<String>, cause: impl fmt::Display) -> Self {
        ContractError {
            stage: code.stage(),
            code,
            op: op.into(),
            cause: cause.to_string(),
        }
    }

    /// One-line CLI header: `<action> FAILED: <stage>:<code>:<op>: <cause>`.
    pub fn header(&self, action: &str) -> String {
        format!(
            "{} FAILED: {}:{}:{}: {}",
            action, self.stage, self.code, self.op, self.cause
        )
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "stage": self.stage.as_str(),
            "code":  self.code.as_str(),
            "op":    self.op,
            "cause": self.cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_stage_code_and_op() {
        let err = ContractError::new(ErrorCode::IrServiceDependencies, "sort services", "cycle A -> B -> A");
        assert_eq!(
            err.to_string(),
            "[IR:IR_SERVICE_DEPENDENCY_ERROR] sort services: cycle A -> B -> A"
        );
        assert_eq!(
            err.header("Build"),
            "Build FAILED: IR:IR_SERVICE_DEPENDENCY_ERROR:sort services: cycle A -> B -> A"
        );
    }

    #[test]
    fn every_code_round_trips_and_is_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in STABLE_ERROR_CODES {
            assert!(seen.insert(code.as_str()), "duplicate {}", code);
            assert_eq!(ErrorCode::parse(code.as_str()), Some(*code));
        }
        assert_eq!(ErrorCode::EmitterStep.stage(), Stage::Emitters);
        assert_eq!(ErrorCode::CueLintLoad.stage(), Stage::Cue);
    }
}
