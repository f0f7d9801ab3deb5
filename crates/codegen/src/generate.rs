//! Build driver: plan targets, run each target's steps, then either write
//! the artifact manifest or compare the scratch output for a dry run.

use std::path::{Path, PathBuf};

use ang_core::{ContractError, ErrorCode};
use ang_ir::{BuildMode, Schema};

use crate::capability::resolve_target_capabilities;
use crate::context::MainContext;
use crate::dryrun::{diff_tree, slash_path, DryRunManifest, DryRunTarget};
use crate::emitter::{Emitter, OutputRoots, SourceFormatter};
use crate::hashmanifest::{write_artifact_hash_manifest, ManifestTarget};
use crate::missing::MissingImpls;
use crate::options::{plan_build, safe_target_dir_name, BuildOptions, TargetBuild};
use crate::plugin::{build_step_registry, plugin_names, resolve_plugins, BuildContext};
use crate::step::StepEvent;
use crate::template::{templates_hash, TemplateResolver};

/// Progress reported while building.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    TargetStarted {
        target: String,
        triple: String,
        backend_dir: PathBuf,
    },
    Step(StepEvent),
    TargetFinished {
        target: String,
    },
}

/// Summary of one built target.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: String,
    pub mode: BuildMode,
    pub backend_dir: PathBuf,
    pub frontend_dir: PathBuf,
    pub plugins: String,
    pub files_generated: usize,
    pub files_written: usize,
    pub warnings: Vec<String>,
    pub missing: MissingImpls,
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub mode: BuildMode,
    pub reports: Vec<TargetReport>,
    /// Set for dry runs.
    pub dry_run: Option<DryRunManifest>,
    /// Set for real builds.
    pub manifest_path: Option<PathBuf>,
    /// Plan-level warnings, such as release output the root module ignores.
    pub warnings: Vec<String>,
}

impl BuildOutcome {
    pub fn frontend_dirs(&self) -> Vec<PathBuf> {
        self.reports.iter().map(|r| r.frontend_dir.clone()).collect()
    }
}

/// `module` line of `<project>/go.mod`, if any.
pub fn read_go_module(project: &Path) -> Option<String> {
    let text = std::fs::read_to_string(project.join("go.mod")).ok()?;
    text.lines()
        .find_map(|l| l.trim().strip_prefix("module "))
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

pub struct Generator<'a> {
    project: &'a Path,
    schema: &'a Schema,
    resolver: &'a dyn TemplateResolver,
    formatter: &'a dyn SourceFormatter,
}

fn step_error(op: &str, err: impl std::fmt::Display) -> ContractError {
    ContractError::new(ErrorCode::EmitterStep, op, err.to_string())
}

/// Scratch roots standing in for a target's real output directories.
struct Scratch {
    roots: OutputRoots,
    /// Admin root when it lies outside the frontend root.
    separate_admin: bool,
}

fn scratch_roots(base: &Path, tb: &TargetBuild) -> Scratch {
    let safe = safe_target_dir_name(&tb.target.name);
    let backend = base.join("backend").join(&safe);
    let frontend = base.join("frontend").join(&safe);
    match tb.frontend_admin_dir.strip_prefix(&tb.frontend_dir) {
        Ok(rel) => Scratch {
            roots: OutputRoots {
                frontend_admin: frontend.join(rel),
                backend,
                frontend,
            },
            separate_admin: false,
        },
        Err(_) => Scratch {
            roots: OutputRoots {
                backend,
                frontend,
                frontend_admin: base.join("frontend-admin").join(&safe),
            },
            separate_admin: true,
        },
    }
}

impl<'a> Generator<'a> {
    pub fn new(
        project: &'a Path,
        schema: &'a Schema,
        resolver: &'a dyn TemplateResolver,
        formatter: &'a dyn SourceFormatter,
    ) -> Self {
        Generator {
            project,
            schema,
            resolver,
            formatter,
        }
    }

    pub fn build(
        &self,
        opts: &BuildOptions,
        sink: &mut dyn FnMut(BuildEvent),
    ) -> Result<BuildOutcome, ContractError> {
        let plugins = resolve_plugins(&self.schema.project.plugins)?;
        let plan = plan_build(self.project, &self.schema.targets, self.schema.project.build_mode, opts)?;
        let scratch_dir = if opts.dry_run {
            let dir = tempfile::Builder::new()
                .prefix("ang-dry-run-")
                .tempdir()
                .map_err(|e| ContractError::new(ErrorCode::EmitterOptions, "create dry-run temp dir", e.to_string()))?;
            Some(dir)
        } else {
            None
        };
        let go_module = if self.schema.project.module.is_empty() {
            read_go_module(self.project)
        } else {
            None
        };

        let mut reports = Vec::with_capacity(plan.targets.len());
        let mut dry = scratch_dir.as_ref().map(|_| DryRunManifest::default());
        for tb in &plan.targets {
            let target = &tb.target;
            let caps = resolve_target_capabilities(target)?;
            let (roots, separate_admin) = match &scratch_dir {
                Some(dir) => {
                    let s = scratch_roots(dir.path(), tb);
                    (s.roots, s.separate_admin)
                }
                None => (
                    OutputRoots {
                        backend: tb.backend_dir.clone(),
                        frontend: tb.frontend_dir.clone(),
                        frontend_admin: tb.frontend_admin_dir.clone(),
                    },
                    false,
                ),
            };
            sink(BuildEvent::TargetStarted {
                target: target.name.clone(),
                triple: target.triple(),
                backend_dir: roots.backend.clone(),
            });
            tracing::info!(target_name = %target.name, backend = %roots.backend.display(), "generating target");

            let mut main = MainContext::new(self.schema, &target.name, &target.framework, &caps);
            if let Some(module) = &go_module {
                main.module = module.clone();
            }
            let mut em = Emitter::new(self.schema, main, roots.clone(), self.resolver, self.formatter)
                .with_dry_run(opts.dry_run);
            let ctx = BuildContext {
                schema: self.schema,
                target,
                python_sdk: opts.python_sdk,
                test_stubs: opts.test_stubs,
                frontend_app_dir: tb.frontend_app_dir.clone(),
                frontend_admin_app_dir: tb.frontend_admin_app_dir.clone(),
                frontend_env_path: tb.frontend_env_path.clone(),
            };
            let registry = build_step_registry(&plugins, &ctx);
            registry.execute(&target.name, &caps, &mut em, &mut |ev| sink(BuildEvent::Step(ev)))?;
            sink(BuildEvent::TargetFinished {
                target: target.name.clone(),
            });

            if let Some(manifest) = dry.as_mut() {
                let mut changes = diff_tree(&roots.backend, &tb.backend_dir)
                    .map_err(|e| step_error("collect dry-run backend changes", e))?;
                changes.extend(
                    diff_tree(&roots.frontend, &tb.frontend_dir)
                        .map_err(|e| step_error("collect dry-run frontend changes", e))?,
                );
                if separate_admin {
                    changes.extend(
                        diff_tree(&roots.frontend_admin, &tb.frontend_admin_dir)
                            .map_err(|e| step_error("collect dry-run admin changes", e))?,
                    );
                }
                manifest.targets.push(DryRunTarget {
                    target: target.name.clone(),
                    lang: target.lang.clone(),
                    backend_dir: slash_path(&tb.backend_dir),
                    frontend_dir: slash_path(&tb.frontend_dir),
                    changes,
                });
            }

            reports.push(TargetReport {
                target: target.name.clone(),
                mode: plan.mode,
                backend_dir: tb.backend_dir.clone(),
                frontend_dir: tb.frontend_dir.clone(),
                plugins: plugin_names(&plugins),
                files_generated: em.generated().len(),
                files_written: em.written(),
                warnings: em.warnings().to_vec(),
                missing: em.take_missing(),
            });
        }

        if let Some(mut manifest) = dry {
            manifest.summarize();
            manifest.notes.extend(plan.warnings.iter().cloned());
            return Ok(BuildOutcome {
                mode: plan.mode,
                reports,
                dry_run: Some(manifest),
                manifest_path: None,
                warnings: plan.warnings,
            });
        }

        let targets: Vec<ManifestTarget> = plan
            .targets
            .iter()
            .map(|tb| ManifestTarget {
                mode: plan.mode,
                backend: tb.backend_dir.clone(),
                frontend: tb.frontend_dir.clone(),
            })
            .collect();
        let input_hash = ang_core::compute_project_hash(self.project).ok();
        let template_hash = templates_hash(self.project);
        let path = write_artifact_hash_manifest(
            self.project,
            &targets,
            &self.schema.ir_version,
            input_hash.as_deref(),
            Some(template_hash.as_str()),
        )
        .map_err(|e| step_error("write artifact manifest", e))?;
        Ok(BuildOutcome {
            mode: plan.mode,
            reports,
            dry_run: None,
            manifest_path: Some(path),
            warnings: plan.warnings,
        })
    }
}
