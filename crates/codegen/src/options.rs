//! Build mode and per-target output directories.
//!
//! Mode precedence: `--mode` > explicit `--backend-dir` (forces in-place) >
//! `project.build.mode` > in-place. Release targets write to their own
//! `output_dir` (or `dist/release/<safe-name>`); in-place targets share the
//! backend directory, with non-Go targets namespaced when several targets
//! are built together.

use std::path::{Path, PathBuf};

use ang_core::{ContractError, ErrorCode};
use ang_ir::{BuildMode, Target};

/// Options gathered from the command line and environment.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Raw `--mode` value.
    pub mode: Option<String>,
    /// `--backend-dir`; `Some` means it was given explicitly.
    pub backend_dir: Option<PathBuf>,
    pub frontend_dir: Option<PathBuf>,
    pub frontend_app_dir: Option<PathBuf>,
    pub frontend_admin_dir: Option<PathBuf>,
    pub frontend_admin_app_dir: Option<PathBuf>,
    pub frontend_env_path: Option<PathBuf>,
    pub target_selector: String,
    pub test_stubs: bool,
    pub dry_run: bool,
    pub python_sdk: bool,
}

impl BuildOptions {
    pub fn backend_dir_explicit(&self) -> bool {
        self.backend_dir.is_some()
    }
}

fn options_error(op: &str, cause: impl Into<String>) -> ContractError {
    ContractError::new(ErrorCode::EmitterOptions, op, cause)
}

/// Lowercased, separator-free directory name for a target. Blank names map
/// to `target`.
pub fn safe_target_dir_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let replaced: String = lowered
        .chars()
        .map(|c| match c {
            '/' | '\\' | ' ' | ':' | '.' => '-',
            other => other,
        })
        .collect();
    let trimmed = replaced.trim_matches('-');
    if trimmed.is_empty() {
        "target".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn resolve_build_mode(
    cli_mode: Option<&str>,
    backend_dir_explicit: bool,
    project_mode: Option<BuildMode>,
) -> Result<BuildMode, ContractError> {
    if let Some(raw) = cli_mode.map(str::trim).filter(|m| !m.is_empty()) {
        return match raw.to_ascii_lowercase().as_str() {
            "in_place" => Ok(BuildMode::InPlace),
            "release" => Ok(BuildMode::Release),
            _ => Err(options_error(
                "parse output options",
                format!("invalid --mode \"{}\" (expected in_place|release)", raw),
            )),
        };
    }
    if backend_dir_explicit {
        return Ok(BuildMode::InPlace);
    }
    Ok(project_mode.unwrap_or_default())
}

/// Release mode may not mix targets with and without `output_dir`, nor be
/// combined with an explicit backend directory.
pub fn validate_build_mode(
    mode: BuildMode,
    opts: &BuildOptions,
    targets: &[&Target],
) -> Result<(), ContractError> {
    if mode == BuildMode::InPlace {
        return Ok(());
    }
    if let Some(dir) = &opts.backend_dir {
        return Err(options_error(
            "validate output mode",
            format!(
                "invalid mixed mode: mode=release backend_dir=\"{}\" target=\"{}\". Fix: remove --backend-dir or switch to --mode=in_place",
                dir.display(),
                opts.target_selector
            ),
        ));
    }
    let with = targets.iter().filter(|t| has_output_dir(t)).count();
    if with > 0 && with < targets.len() {
        return Err(options_error(
            "validate output mode",
            "invalid mixed mode: mode=release has targets with and without output_dir. Fix: set output_dir for all targets or switch to mode=in_place",
        ));
    }
    Ok(())
}

fn has_output_dir(t: &Target) -> bool {
    t.output_dir.as_deref().is_some_and(|d| !d.trim().is_empty())
}

/// Targets matching a comma-separated selector of names, languages or
/// `lang/framework/db` triples. A blank selector keeps every target.
pub fn filter_targets<'a>(targets: &'a [Target], selector: &str) -> Vec<&'a Target> {
    let tokens: Vec<String> = selector
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return targets.iter().collect();
    }
    targets
        .iter()
        .filter(|t| tokens.iter().any(|tok| matches_selector(t, tok)))
        .collect()
}

fn matches_selector(t: &Target, token: &str) -> bool {
    let lang = t.lang.trim().to_lowercase();
    let stack = format!(
        "{}/{}/{}",
        lang,
        t.framework.trim().to_lowercase(),
        t.db.trim().to_lowercase()
    );
    token == t.name.trim().to_lowercase() || token == lang || token == stack.trim_matches('/')
}

/// Backend directory for `target`, relative to the project unless absolute.
pub fn resolve_backend_dir_for_target(
    mode: BuildMode,
    base_backend_dir: &Path,
    target: &Target,
    multi_target: bool,
) -> PathBuf {
    match mode {
        BuildMode::Release => match target.output_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => Path::new("dist/release").join(safe_target_dir_name(&target.name)),
        },
        BuildMode::InPlace => {
            if multi_target && !target.lang.trim().eq_ignore_ascii_case("go") {
                base_backend_dir.join(safe_target_dir_name(&target.name))
            } else {
                base_backend_dir.to_path_buf()
            }
        }
    }
}

/// Frontend directory: `--frontend-dir` (namespaced per target when several
/// are built) or `<backend>/sdk/frontend`.
pub fn resolve_frontend_dir_for_target(
    base_frontend_dir: Option<&Path>,
    backend_dir: &Path,
    target: &Target,
    multi_target: bool,
) -> PathBuf {
    match base_frontend_dir {
        Some(dir) if multi_target => dir.join(safe_target_dir_name(&target.name)),
        Some(dir) => dir.to_path_buf(),
        None => backend_dir.join("sdk").join("frontend"),
    }
}

fn under(project: &Path, dir: &Path) -> PathBuf {
    if dir.as_os_str().is_empty() || dir == Path::new(".") {
        project.to_path_buf()
    } else if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        project.join(dir)
    }
}

/// Fully resolved directories for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetBuild {
    pub target: Target,
    pub backend_dir: PathBuf,
    pub frontend_dir: PathBuf,
    pub frontend_admin_dir: PathBuf,
    pub frontend_app_dir: Option<PathBuf>,
    pub frontend_admin_app_dir: Option<PathBuf>,
    pub frontend_env_path: Option<PathBuf>,
}

/// Build mode plus the resolved per-target directories for the selected
/// targets.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub mode: BuildMode,
    pub targets: Vec<TargetBuild>,
    /// Non-fatal problems with the plan, shown to the user.
    pub warnings: Vec<String>,
}

/// A release-mode Go target writing under `dist/` while the project root
/// carries its own `go.mod` produces code the root module never compiles.
pub fn release_root_module_mismatch(project: &Path, mode: BuildMode, target: &Target, backend: &Path) -> Option<String> {
    if mode != BuildMode::Release || !target.lang.trim().eq_ignore_ascii_case("go") {
        return None;
    }
    if !project.join("go.mod").is_file() {
        return None;
    }
    let out = backend.to_string_lossy().replace('\\', "/");
    let out = out.strip_prefix("./").unwrap_or(&out);
    if !out.starts_with("dist/") {
        return None;
    }
    Some(format!(
        "Generated code is not used by runtime build: release mode Go target outputs to {out} while root go.mod exists; \
         fix by using --mode=in_place, or keep --mode=release and run build/compile from {out} module"
    ))
}

pub fn plan_build(
    project: &Path,
    targets: &[Target],
    project_mode: Option<BuildMode>,
    opts: &BuildOptions,
) -> Result<BuildPlan, ContractError> {
    let selected = filter_targets(targets, &opts.target_selector);
    if selected.is_empty() {
        let available: Vec<String> = targets
            .iter()
            .map(|t| format!("{} ({})", t.name, t.triple()))
            .collect();
        return Err(options_error(
            "select targets",
            format!(
                "no targets matched --target=\"{}\" (available: {})",
                opts.target_selector,
                available.join(", ")
            ),
        ));
    }
    let mode = resolve_build_mode(opts.mode.as_deref(), opts.backend_dir_explicit(), project_mode)?;
    validate_build_mode(mode, opts, &selected)?;
    if opts.mode.is_none() && project_mode.is_none() && selected.iter().any(|t| has_output_dir(t)) {
        tracing::warn!("targets[].output_dir without an explicit build mode is deprecated; set build.mode");
    }

    let multi = selected.len() > 1;
    let base_backend = opts.backend_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let namespaced = |dir: &Option<PathBuf>, t: &Target| -> Option<PathBuf> {
        let dir = dir.as_ref()?;
        if multi && !opts.dry_run {
            Some(dir.join(safe_target_dir_name(&t.name)))
        } else {
            Some(dir.clone())
        }
    };

    let mut out = Vec::with_capacity(selected.len());
    let mut warnings = Vec::new();
    for t in selected {
        let backend = resolve_backend_dir_for_target(mode, &base_backend, t, multi);
        if let Some(w) = release_root_module_mismatch(project, mode, t, &backend) {
            tracing::warn!(target_name = %t.name, "{}", w);
            warnings.push(w);
        }
        let frontend = resolve_frontend_dir_for_target(opts.frontend_dir.as_deref(), &backend, t, multi);
        let admin = opts
            .frontend_admin_dir
            .as_ref()
            .map(|d| under(project, d))
            .unwrap_or_else(|| under(project, &frontend).join("admin"));
        let (app, admin_app, env) = if opts.dry_run {
            (None, None, None)
        } else {
            (
                namespaced(&opts.frontend_app_dir, t).map(|d| under(project, &d)),
                namespaced(&opts.frontend_admin_app_dir, t).map(|d| under(project, &d)),
                opts.frontend_env_path.as_ref().map(|p| {
                    if multi {
                        under(project, &p.join(safe_target_dir_name(&t.name)).join(".env.example"))
                    } else {
                        under(project, p)
                    }
                }),
            )
        };
        out.push(TargetBuild {
            target: t.clone(),
            backend_dir: under(project, &backend),
            frontend_dir: under(project, &frontend),
            frontend_admin_dir: admin,
            frontend_app_dir: app,
            frontend_admin_app_dir: admin_app,
            frontend_env_path: env,
        });
    }
    Ok(BuildPlan {
        mode,
        targets: out,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str, lang: &str, output_dir: Option<&str>) -> Target {
        Target {
            name: name.into(),
            lang: lang.into(),
            framework: if lang == "go" { "chi".into() } else { "fastapi".into() },
            db: "postgres".into(),
            output_dir: output_dir.map(String::from),
            ..Target::default()
        }
    }

    #[test]
    fn safe_names() {
        assert_eq!(safe_target_dir_name(" My/Target.x "), "my-target-x");
        assert_eq!(safe_target_dir_name(""), "target");
        assert_eq!(safe_target_dir_name(" /. "), "target");
        assert_eq!(safe_target_dir_name("a:b\\c"), "a-b-c");
    }

    #[test]
    fn mode_precedence() {
        assert_eq!(
            resolve_build_mode(Some("RELEASE"), true, Some(BuildMode::InPlace)).unwrap(),
            BuildMode::Release
        );
        assert_eq!(
            resolve_build_mode(None, true, Some(BuildMode::Release)).unwrap(),
            BuildMode::InPlace
        );
        assert_eq!(
            resolve_build_mode(None, false, Some(BuildMode::Release)).unwrap(),
            BuildMode::Release
        );
        assert_eq!(resolve_build_mode(Some(" "), false, None).unwrap(), BuildMode::InPlace);
        let err = resolve_build_mode(Some("debug"), false, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmitterOptions);
    }

    #[test]
    fn blank_selector_keeps_all_targets() {
        let targets = vec![target("api", "go", None), target("py", "python", None)];
        assert_eq!(filter_targets(&targets, " , ").len(), 2);
        assert_eq!(filter_targets(&targets, "").len(), 2);
    }

    #[test]
    fn selector_matches_name_lang_or_stack() {
        let targets = vec![target("api", "go", None), target("py", "python", None)];
        let names = |sel: &str| -> Vec<String> {
            filter_targets(&targets, sel).iter().map(|t| t.name.clone()).collect()
        };
        assert_eq!(names("API"), vec!["api"]);
        assert_eq!(names("python"), vec!["py"]);
        assert_eq!(names("go/chi/postgres"), vec!["api"]);
        assert_eq!(names("api, python/fastapi/postgres"), vec!["api", "py"]);
        assert!(names("rust").is_empty());
    }

    #[test]
    fn backend_dir_per_mode() {
        let base = Path::new("out");
        let go = target("Main API", "go", None);
        let py = target("Py Svc", "python", Some("build/py"));
        assert_eq!(
            resolve_backend_dir_for_target(BuildMode::Release, base, &go, true),
            PathBuf::from("dist/release/main-api")
        );
        assert_eq!(
            resolve_backend_dir_for_target(BuildMode::Release, base, &py, true),
            PathBuf::from("build/py")
        );
        assert_eq!(
            resolve_backend_dir_for_target(BuildMode::InPlace, base, &go, true),
            PathBuf::from("out")
        );
        assert_eq!(
            resolve_backend_dir_for_target(BuildMode::InPlace, base, &py, true),
            PathBuf::from("out/py-svc")
        );
        assert_eq!(
            resolve_backend_dir_for_target(BuildMode::InPlace, base, &py, false),
            PathBuf::from("out")
        );
    }

    #[test]
    fn release_rejects_mixed_output_dirs() {
        let a = target("a", "go", Some("dist/a"));
        let b = target("b", "go", None);
        let err = validate_build_mode(BuildMode::Release, &BuildOptions::default(), &[&a, &b]).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmitterOptions);
        assert!(err.cause.contains("with and without output_dir"));
        validate_build_mode(BuildMode::Release, &BuildOptions::default(), &[&a]).unwrap();
        validate_build_mode(BuildMode::InPlace, &BuildOptions::default(), &[&a, &b]).unwrap();
    }

    #[test]
    fn release_rejects_explicit_backend_dir() {
        let opts = BuildOptions {
            backend_dir: Some(PathBuf::from("gen")),
            ..BuildOptions::default()
        };
        let a = target("a", "go", None);
        let err = validate_build_mode(BuildMode::Release, &opts, &[&a]).unwrap_err();
        assert!(err.cause.starts_with("invalid mixed mode: mode=release backend_dir=\"gen\""));
    }

    #[test]
    fn plan_namespaces_app_dirs_for_multiple_targets() {
        let targets = vec![target("api", "go", None), target("py", "python", None)];
        let opts = BuildOptions {
            frontend_app_dir: Some(PathBuf::from("web")),
            ..BuildOptions::default()
        };
        let plan = plan_build(Path::new("/p"), &targets, None, &opts).unwrap();
        assert_eq!(plan.mode, BuildMode::InPlace);
        assert_eq!(plan.targets[0].backend_dir, PathBuf::from("/p"));
        assert_eq!(plan.targets[1].backend_dir, PathBuf::from("/p/py"));
        assert_eq!(plan.targets[0].frontend_app_dir, Some(PathBuf::from("/p/web/api")));
        assert_eq!(plan.targets[0].frontend_dir, PathBuf::from("/p/sdk/frontend"));

        let dry = BuildOptions {
            dry_run: true,
            ..opts
        };
        let plan = plan_build(Path::new("/p"), &targets, None, &dry).unwrap();
        assert!(plan.targets.iter().all(|t| t.frontend_app_dir.is_none()));
    }

    #[test]
    fn plan_reports_unmatched_selector() {
        let targets = vec![target("api", "go", None)];
        let opts = BuildOptions {
            target_selector: "web".into(),
            ..BuildOptions::default()
        };
        let err = plan_build(Path::new("."), &targets, None, &opts).unwrap_err();
        assert!(err.cause.contains("available: api (go/chi/postgres)"));
    }

    #[test]
    fn release_go_target_under_dist_with_root_go_mod_is_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let go = target("Main API", "go", None);
        let backend = PathBuf::from("dist/release/main-api");
        assert!(release_root_module_mismatch(dir.path(), BuildMode::Release, &go, &backend).is_none());

        std::fs::write(dir.path().join("go.mod"), "module example.com/shop\n").unwrap();
        let w = release_root_module_mismatch(dir.path(), BuildMode::Release, &go, &backend).unwrap();
        assert!(w.starts_with("Generated code is not used by runtime build: release mode Go target outputs to dist/release/main-api"));
        assert!(release_root_module_mismatch(dir.path(), BuildMode::InPlace, &go, &backend).is_none());
        assert!(release_root_module_mismatch(dir.path(), BuildMode::Release, &go, Path::new("build/api")).is_none());
        assert!(release_root_module_mismatch(dir.path(), BuildMode::Release, &go, Path::new("./dist/api")).is_some());
        let py = target("py", "python", None);
        assert!(release_root_module_mismatch(dir.path(), BuildMode::Release, &py, &backend).is_none());
    }
}
