#![allow(clippy::result_large_err)]
//! ang-core: ANG compiler core library.
//!
//! Turns a project directory into a validated IR:
//!
//! - [`loader`] -- `DomainLoader` and the bundled relaxed-JSON loader
//! - [`normalize`] -- extractors producing [`defs::NormalizedSet`]
//! - [`convert`] -- IR builder (types, endpoints, predicates, ordering)
//! - [`validate`] -- IR semantic invariants
//! - [`pipeline`] -- the orchestrator tying the stages together
//!
//! Errors leaving a stage are [`ContractError`]s; non-fatal findings are
//! [`Warning`]s.

pub mod convert;
pub mod defs;
pub mod depsort;
pub mod diagnostic;
pub mod error;
pub mod flowsem;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod process;
pub mod project_hash;
pub mod validate;

// ── Convenience re-exports ───────────────────────────────────────────

pub use ang_ir as ir;
pub use convert::convert_and_transform;
pub use defs::NormalizedSet;
pub use diagnostic::{Severity, Warning};
pub use error::{ContractError, ErrorCode, Stage, STABLE_ERROR_CODES};
pub use pipeline::{
    latest_diagnostics, run, run_with_options, PipelineOptions, PipelineOutput, SnippetChecker,
};
pub use process::{ProcessRunner, SystemRunner};
pub use project_hash::compute_project_hash;

/// Compiler version reported by `ang version` and the artifact manifest.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");
