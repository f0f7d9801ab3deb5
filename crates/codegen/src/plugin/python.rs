//! Steps for Python FastAPI targets.

use crate::capability::{Capability, Profile};
use crate::step::{Step, StepRegistry};

use super::{BuildContext, TargetPlugin};

pub struct PythonFastapiPlugin;

impl TargetPlugin for PythonFastapiPlugin {
    fn name(&self) -> &'static str {
        "python_fastapi"
    }

    fn register_steps(&self, r: &mut StepRegistry, _ctx: &BuildContext<'_>) {
        r.register(
            Step::new("Python Config", "config", |em| em.emit_python_config())
                .for_profile(Profile::PythonFastapi),
        );
        r.register(
            Step::new("Python RBAC", "rbac", |em| em.emit_python_rbac())
                .requires(&[Capability::Rbac])
                .for_profile(Profile::PythonFastapi),
        );
        r.register(
            Step::new("Python FastAPI Backend", "server_main", |em| em.emit_python_backend())
                .requires(&[Capability::Http])
                .for_profile(Profile::PythonFastapi),
        );
    }
}
