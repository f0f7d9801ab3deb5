#![allow(clippy::result_large_err)]
//! ang-codegen: turns a validated [`ang_ir::Schema`] into source trees.
//!
//! - [`capability`] -- what a target can generate
//! - [`step`] -- named generation steps and their registry
//! - [`plugin`] -- target plugins registering steps
//! - [`emitter`] -- the per-target emitter engine and its families
//! - [`options`] -- build modes, target selection, output directories
//! - [`generate`] -- the build driver
//! - [`dryrun`] / [`hashmanifest`] -- dry-run diffs and the artifact manifest

pub mod capability;
pub mod context;
pub mod dryrun;
pub mod emitter;
pub mod error;
pub mod generate;
pub mod hashmanifest;
pub mod missing;
pub mod options;
pub mod plugin;
pub mod step;
pub mod template;

// ── Convenience re-exports ───────────────────────────────────────────

pub use capability::{resolve_target_capabilities, Capability, CapabilitySet, Profile};
pub use context::MainContext;
pub use dryrun::{ChangeAction, DryRunManifest, DryRunTarget, FileChange};
pub use emitter::{
    asyncapi_document, mcp_tools, openapi_document, system_manifest, Emitter, Gofmt, NoFormat,
    OutputRoots, Root, SourceFormatter,
};
pub use error::{CodegenError, ManifestError, TemplateError};
pub use generate::{read_go_module, BuildEvent, BuildOutcome, Generator, TargetReport};
pub use hashmanifest::{write_artifact_hash_manifest, ManifestTarget, MANIFEST_PATH};
pub use missing::{MissingImpl, MissingImpls};
pub use options::{filter_targets, safe_target_dir_name, BuildOptions, BuildPlan};
pub use plugin::{resolve_plugins, TargetPlugin, DEFAULT_PLUGINS};
pub use step::{StepEvent, StepRegistry, StepStatus};
pub use template::{templates_hash, BuiltinTemplates, ProjectTemplates, TemplateResolver};
