//! Post-build hooks: the optional MCP generation script and the frontend
//! typecheck gate.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ang_core::process::{ProcessError, ProcessSpec};
use ang_core::ProcessRunner;

pub(crate) const MCP_SCRIPT: &str = "scripts/gen_mcp_server.sh";

/// Run `scripts/gen_mcp_server.sh` with bash when the project has one.
/// Returns whether the script ran.
pub(crate) fn run_mcp_script(runner: &dyn ProcessRunner, project: &Path) -> Result<bool, String> {
    let script = project.join(MCP_SCRIPT);
    if !script.is_file() {
        return Ok(false);
    }
    let spec = ProcessSpec::new("bash").arg(MCP_SCRIPT).cwd(project);
    let out = runner.run(&spec).map_err(|e| format!("mcp generation failed: {}", e))?;
    if !out.success() {
        return Err(format!(
            "mcp generation failed: exit status {}\n{}",
            out.status,
            out.stderr_str().trim_end()
        ));
    }
    Ok(true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TscMode {
    Off,
    On,
    Strict,
}

impl TscMode {
    /// `ANG_FRONTEND_TSC`: empty, `0` or `false` disable the gate, `strict`
    /// requires a checkable frontend, anything else enables it.
    pub fn parse(raw: Option<&str>) -> Self {
        let mode = raw.map(|v| v.trim().to_lowercase()).unwrap_or_default();
        match mode.as_str() {
            "" | "0" | "false" => TscMode::Off,
            "strict" => TscMode::Strict,
            _ => TscMode::On,
        }
    }
}

/// Frontend typecheck settings, normally read from the environment.
#[derive(Debug, Clone)]
pub(crate) struct TscGate {
    pub mode: TscMode,
    /// Explicit `tsc` binary (`ANG_TSC_BIN`).
    pub bin: Option<String>,
}

impl TscGate {
    pub fn from_env() -> Self {
        TscGate {
            mode: TscMode::parse(std::env::var("ANG_FRONTEND_TSC").ok().as_deref()),
            bin: std::env::var("ANG_TSC_BIN").ok().filter(|v| !v.trim().is_empty()),
        }
    }

    /// Typecheck every frontend dir that has `tsconfig.json`, `package.json`
    /// and `node_modules`. Returns the progress notes on success.
    pub fn run(&self, runner: &dyn ProcessRunner, frontend_dirs: &[PathBuf]) -> Result<Vec<String>, String> {
        let mut notes = Vec::new();
        if self.mode == TscMode::Off {
            return Ok(notes);
        }
        let strict = self.mode == TscMode::Strict;

        let mut seen = BTreeSet::new();
        let dirs: Vec<PathBuf> = frontend_dirs
            .iter()
            .filter(|d| !d.as_os_str().is_empty())
            .map(|d| std::path::absolute(d).unwrap_or_else(|_| d.clone()))
            .filter(|d| seen.insert(d.clone()))
            .collect();
        if dirs.is_empty() {
            if strict {
                return Err("ANG_FRONTEND_TSC=strict but no frontend directories were produced".into());
            }
            return Ok(notes);
        }

        let mut checkable = Vec::new();
        for dir in dirs {
            if !dir.join("tsconfig.json").is_file() {
                continue;
            }
            if !dir.join("package.json").is_file() {
                notes.push(format!("Frontend typecheck skipped (missing package.json): {}", dir.display()));
                continue;
            }
            if !dir.join("node_modules").is_dir() {
                notes.push(format!("Frontend typecheck skipped (missing node_modules): {}", dir.display()));
                continue;
            }
            checkable.push(dir);
        }
        if checkable.is_empty() {
            if strict {
                return Err("ANG_FRONTEND_TSC=strict but no frontend directories with tsconfig.json + package.json + node_modules were found".into());
            }
            return Ok(notes);
        }

        let bin = self.bin.clone().unwrap_or_else(|| "tsc".to_string());
        for dir in checkable {
            let spec = ProcessSpec::new(&bin).args(["--noEmit", "--pretty", "false"]).cwd(&dir);
            let out = match runner.run(&spec) {
                Ok(out) => out,
                Err(ProcessError::NotFound { .. }) => {
                    return Err("ANG_FRONTEND_TSC enabled but `tsc` binary is not available (install TypeScript or set ANG_TSC_BIN)".into());
                }
                Err(e) => return Err(format!("frontend typecheck failed in {}: {}", dir.display(), e)),
            };
            if !out.success() {
                return Err(format!(
                    "frontend typecheck failed in {}: exit status {}\n{}{}",
                    dir.display(),
                    out.status,
                    out.stdout_str(),
                    out.stderr_str()
                ));
            }
            notes.push(format!("Frontend typecheck passed: {}", dir.display()));
        }
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ang_core::process::ProcessOutput;
    use std::cell::RefCell;

    /// Records every spec and answers with a fixed exit status.
    struct Scripted {
        status: i32,
        missing: bool,
        calls: RefCell<Vec<ProcessSpec>>,
    }

    impl Scripted {
        fn exiting(status: i32) -> Self {
            Scripted {
                status,
                missing: false,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ProcessRunner for Scripted {
        fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
            self.calls.borrow_mut().push(spec.clone());
            if self.missing {
                return Err(ProcessError::NotFound {
                    program: spec.program.clone(),
                });
            }
            Ok(ProcessOutput {
                status: self.status,
                stdout: b"src/app.ts(1,1): error TS2304".to_vec(),
                stderr: Vec::new(),
            })
        }
    }

    fn frontend(root: &Path, with_modules: bool) -> PathBuf {
        let dir = root.join("sdk");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tsconfig.json"), "{}").unwrap();
        std::fs::write(dir.join("package.json"), "{}").unwrap();
        if with_modules {
            std::fs::create_dir_all(dir.join("node_modules")).unwrap();
        }
        dir
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(TscMode::parse(None), TscMode::Off);
        assert_eq!(TscMode::parse(Some(" FALSE ")), TscMode::Off);
        assert_eq!(TscMode::parse(Some("0")), TscMode::Off);
        assert_eq!(TscMode::parse(Some("1")), TscMode::On);
        assert_eq!(TscMode::parse(Some("true")), TscMode::On);
        assert_eq!(TscMode::parse(Some("Strict")), TscMode::Strict);
    }

    #[test]
    fn mcp_script_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Scripted::exiting(0);
        assert_eq!(run_mcp_script(&runner, dir.path()), Ok(false));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn mcp_script_runs_in_project_and_fails_on_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("scripts")).unwrap();
        std::fs::write(dir.path().join(MCP_SCRIPT), "exit 0").unwrap();

        let ok = Scripted::exiting(0);
        assert_eq!(run_mcp_script(&ok, dir.path()), Ok(true));
        let call = ok.calls.borrow()[0].clone();
        assert_eq!(call.program, "bash");
        assert_eq!(call.args, vec![MCP_SCRIPT.to_string()]);
        assert_eq!(call.cwd.as_deref(), Some(dir.path()));

        let bad = Scripted::exiting(2);
        let err = run_mcp_script(&bad, dir.path()).unwrap_err();
        assert!(err.starts_with("mcp generation failed: exit status 2"));
    }

    #[test]
    fn gate_off_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let fe = frontend(dir.path(), true);
        let runner = Scripted::exiting(1);
        let gate = TscGate {
            mode: TscMode::Off,
            bin: None,
        };
        assert_eq!(gate.run(&runner, &[fe]), Ok(Vec::new()));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn gate_skips_dirs_without_node_modules_unless_strict() {
        let dir = tempfile::tempdir().unwrap();
        let fe = frontend(dir.path(), false);
        let runner = Scripted::exiting(0);
        let on = TscGate {
            mode: TscMode::On,
            bin: None,
        };
        let notes = on.run(&runner, &[fe.clone()]).unwrap();
        assert!(notes[0].starts_with("Frontend typecheck skipped (missing node_modules)"));

        let strict = TscGate {
            mode: TscMode::Strict,
            bin: None,
        };
        let err = strict.run(&runner, &[fe]).unwrap_err();
        assert!(err.contains("tsconfig.json + package.json + node_modules"));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn gate_reports_tsc_failures_and_dedups_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let fe = frontend(dir.path(), true);
        let runner = Scripted::exiting(2);
        let gate = TscGate {
            mode: TscMode::On,
            bin: Some("/opt/ts/bin/tsc".into()),
        };
        let err = gate.run(&runner, &[fe.clone(), fe.clone()]).unwrap_err();
        assert!(err.starts_with("frontend typecheck failed in"));
        assert!(err.contains("TS2304"));
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "/opt/ts/bin/tsc");
        assert_eq!(calls[0].args, vec!["--noEmit", "--pretty", "false"]);
    }

    #[test]
    fn missing_tsc_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let fe = frontend(dir.path(), true);
        let runner = Scripted {
            status: 0,
            missing: true,
            calls: RefCell::new(Vec::new()),
        };
        let gate = TscGate {
            mode: TscMode::On,
            bin: None,
        };
        let err = gate.run(&runner, &[fe]).unwrap_err();
        assert!(err.contains("`tsc` binary is not available"));
    }

    #[test]
    fn strict_without_frontends_fails() {
        let runner = Scripted::exiting(0);
        let gate = TscGate {
            mode: TscMode::Strict,
            bin: None,
        };
        let err = gate.run(&runner, &[]).unwrap_err();
        assert_eq!(err, "ANG_FRONTEND_TSC=strict but no frontend directories were produced");
    }
}
