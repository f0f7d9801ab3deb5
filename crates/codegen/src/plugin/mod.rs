//! Target plugins.
//!
//! A plugin contributes steps to a target's [`StepRegistry`]. Plugins are
//! plain values looked up by name; the project may select a subset and an
//! order, otherwise every built-in plugin runs in its default order.

mod go;
mod python;
mod shared;

use std::path::PathBuf;

use ang_core::{ContractError, ErrorCode};
use ang_ir::{Schema, Target};

use crate::step::StepRegistry;

pub use go::GoLegacyPlugin;
pub use python::PythonFastapiPlugin;
pub use shared::SharedPlugin;

/// Everything a plugin may consult while registering steps.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    pub schema: &'a Schema,
    pub target: &'a Target,
    /// `ANG_PY_SDK=1`.
    pub python_sdk: bool,
    pub test_stubs: bool,
    pub frontend_app_dir: Option<PathBuf>,
    pub frontend_admin_app_dir: Option<PathBuf>,
    pub frontend_env_path: Option<PathBuf>,
}

impl<'a> BuildContext<'a> {
    pub fn new(schema: &'a Schema, target: &'a Target) -> Self {
        BuildContext {
            schema,
            target,
            python_sdk: false,
            test_stubs: false,
            frontend_app_dir: None,
            frontend_admin_app_dir: None,
            frontend_env_path: None,
        }
    }
}

pub trait TargetPlugin {
    fn name(&self) -> &'static str;

    fn register_steps(&self, registry: &mut StepRegistry, ctx: &BuildContext<'_>);
}

/// Built-in plugin names in default execution order.
pub const DEFAULT_PLUGINS: &[&str] = &["shared", "go_legacy", "python_fastapi"];

fn builtin(name: &str) -> Option<Box<dyn TargetPlugin>> {
    match name {
        "shared" => Some(Box::new(SharedPlugin)),
        "go_legacy" => Some(Box::new(GoLegacyPlugin)),
        "python_fastapi" => Some(Box::new(PythonFastapiPlugin)),
        _ => None,
    }
}

/// Resolve plugin names to plugin values. An empty selection means all
/// built-ins; duplicates keep their first position.
pub fn resolve_plugins(names: &[String]) -> Result<Vec<Box<dyn TargetPlugin>>, ContractError> {
    let wanted: Vec<String> = if names.iter().all(|n| n.trim().is_empty()) {
        DEFAULT_PLUGINS.iter().map(|s| s.to_string()).collect()
    } else {
        names
            .iter()
            .map(|n| n.trim().to_ascii_lowercase())
            .filter(|n| !n.is_empty())
            .collect()
    };
    let mut seen: Vec<&str> = Vec::new();
    let mut out = Vec::new();
    for name in &wanted {
        if seen.contains(&name.as_str()) {
            continue;
        }
        let plugin = builtin(name).ok_or_else(|| {
            ContractError::new(
                ErrorCode::EmitterStep,
                "resolve target plugins",
                format!(
                    "unknown plugin \"{}\" (available: {})",
                    name,
                    DEFAULT_PLUGINS.join(", ")
                ),
            )
        })?;
        seen.push(name);
        out.push(plugin);
    }
    Ok(out)
}

/// Build the step registry for one target. Registration errors are kept in
/// the registry and surface when it executes.
pub fn build_step_registry(plugins: &[Box<dyn TargetPlugin>], ctx: &BuildContext<'_>) -> StepRegistry {
    let mut registry = StepRegistry::new();
    for plugin in plugins {
        tracing::debug!(plugin = plugin.name(), target_name = %ctx.target.name, "registering steps");
        plugin.register_steps(&mut registry, ctx);
    }
    registry
}

/// Comma-joined plugin names for the build report.
pub fn plugin_names(plugins: &[Box<dyn TargetPlugin>]) -> String {
    plugins.iter().map(|p| p.name()).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::is_critical_key;
    use std::collections::HashSet;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_plugin_order() {
        let plugins = resolve_plugins(&[]).unwrap();
        assert_eq!(plugin_names(&plugins), "shared,go_legacy,python_fastapi");
    }

    #[test]
    fn duplicates_keep_first_position() {
        let plugins = resolve_plugins(&names(&["go_legacy", "shared", "GO_LEGACY"])).unwrap();
        assert_eq!(plugin_names(&plugins), "go_legacy,shared");
    }

    #[test]
    fn unknown_plugin_lists_available() {
        let err = resolve_plugins(&names(&["shared", "rust_axum"])).err().unwrap();
        assert_eq!(err.code, ErrorCode::EmitterStep);
        assert_eq!(
            err.cause,
            "unknown plugin \"rust_axum\" (available: shared, go_legacy, python_fastapi)"
        );
    }

    #[test]
    fn critical_keys_are_registered_once() {
        let mut schema = Schema::default();
        schema.auth = Some(ang_ir::Auth::default());
        let target = Target {
            name: "api".into(),
            lang: "go".into(),
            framework: "chi".into(),
            db: "postgres".into(),
            ..Target::default()
        };
        let mut ctx = BuildContext::new(&schema, &target);
        ctx.python_sdk = true;
        ctx.test_stubs = true;
        ctx.frontend_app_dir = Some(PathBuf::from("web"));
        let plugins = resolve_plugins(&[]).unwrap();
        let registry = build_step_registry(&plugins, &ctx);
        assert!(registry.registration_error().is_none());
        let mut critical = HashSet::new();
        for step in registry.steps() {
            if is_critical_key(&step.artifact_key) {
                assert!(critical.insert(step.artifact_key.clone()), "{}", step.artifact_key);
            }
        }
        for key in ["go:di_container", "go:http_handlers", "go:frontend_sdk", "go:service_impl", "go:server_main"] {
            assert!(critical.contains(key), "missing {}", key);
        }
    }
}
