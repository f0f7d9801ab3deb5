//! Language-neutral steps: API documents, the Python client and the
//! system manifest.

use crate::capability::Capability;
use crate::step::{Step, StepRegistry};

use super::{BuildContext, TargetPlugin};

pub struct SharedPlugin;

impl TargetPlugin for SharedPlugin {
    fn name(&self) -> &'static str {
        "shared"
    }

    fn register_steps(&self, r: &mut StepRegistry, ctx: &BuildContext<'_>) {
        r.register(
            Step::new("OpenAPI", "shared:openapi", |em| em.emit_openapi())
                .requires(&[Capability::Http, Capability::Openapi]),
        );
        r.register(
            Step::new("AsyncAPI", "shared:asyncapi", |em| em.emit_asyncapi())
                .requires(&[Capability::Events, Capability::Asyncapi]),
        );
        if ctx.python_sdk {
            r.register(
                Step::new("Python SDK", "shared:python_sdk", |em| em.emit_python_sdk())
                    .requires(&[Capability::Http, Capability::PythonSdk]),
            );
        }
        r.register(
            Step::new("System Manifest", "shared:system_manifest", |em| em.emit_system_manifest())
                .requires(&[Capability::Manifest]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ang_ir::{Schema, Target};

    #[test]
    fn python_sdk_is_opt_in() {
        let schema = Schema::default();
        let target = Target::default();
        let mut ctx = BuildContext::new(&schema, &target);
        let mut reg = StepRegistry::new();
        SharedPlugin.register_steps(&mut reg, &ctx);
        assert!(reg.steps().iter().all(|s| s.name != "Python SDK"));

        ctx.python_sdk = true;
        let mut reg = StepRegistry::new();
        SharedPlugin.register_steps(&mut reg, &ctx);
        assert!(reg.steps().iter().any(|s| s.name == "Python SDK"));
    }
}
