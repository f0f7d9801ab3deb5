//! Database and contract operations delegated to external tools: `ang
//! migrate`, `ang db` and `ang contract-test`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::SystemTime;

use ang_core::process::{ProcessOutput, ProcessSpec};
use ang_core::{ProcessRunner, SystemRunner};

use crate::{report_error, OutputFormat};

const SCHEMA_URL: &str = "file://db/schema/schema.sql";
const MIGRATIONS_DIR: &str = "db/migrations";
const DEV_URL: &str = "docker://postgres/15/dev";

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `DATABASE_URL`, falling back to `DB_URL`.
fn database_url() -> Option<String> {
    env_nonempty("DATABASE_URL").or_else(|| env_nonempty("DB_URL"))
}

/// Echo captured process output so the user sees the tool's own report.
fn echo(out: &ProcessOutput) {
    print!("{}", out.stdout_str());
    eprint!("{}", out.stderr_str());
}

fn run_checked(runner: &dyn ProcessRunner, spec: &ProcessSpec) -> Result<ProcessOutput, String> {
    let out = runner.run(spec).map_err(|e| e.to_string())?;
    echo(&out);
    if !out.success() {
        return Err(format!("{} exited with status {}", spec.display(), out.status));
    }
    Ok(out)
}

/// Most recently modified `.sql` file directly under `dir`.
pub(crate) fn latest_migration(dir: &Path) -> io::Result<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if latest.as_ref().map_or(true, |(t, _)| modified > *t) {
            latest = Some((modified, path));
        }
    }
    Ok(latest.map(|(_, p)| p))
}

/// Reject `DROP TABLE` / `DROP COLUMN` in the newest migration unless
/// `allow_drop` is set.
pub(crate) fn check_destructive(dir: &Path, allow_drop: bool) -> Result<(), String> {
    let Some(latest) = latest_migration(dir).map_err(|e| e.to_string())? else {
        return Ok(());
    };
    let sql = fs::read_to_string(&latest).map_err(|e| format!("read {}: {}", latest.display(), e))?;
    let upper = sql.to_uppercase();
    if (upper.contains("DROP TABLE") || upper.contains("DROP COLUMN")) && !allow_drop {
        return Err(format!(
            "destructive statements detected in {} (set ALLOW_DROP=1 to accept)",
            latest.display()
        ));
    }
    Ok(())
}

pub(crate) fn migrate_diff(runner: &dyn ProcessRunner, name: &str, allow_drop: bool) -> Result<(), String> {
    let spec = ProcessSpec::new("atlas").args([
        "migrate",
        "diff",
        name,
        "--env",
        "local",
        "--to",
        SCHEMA_URL,
        "--dir",
        "file://db/migrations",
    ]);
    run_checked(runner, &spec)?;
    check_destructive(Path::new(MIGRATIONS_DIR), allow_drop)
}

pub(crate) fn migrate_apply(runner: &dyn ProcessRunner, db_url: Option<&str>) -> Result<(), String> {
    let url = db_url.ok_or("DB_URL is required")?;
    let spec = ProcessSpec::new("atlas").args(["migrate", "apply", "--dir", "file://db/migrations", "--url", url]);
    run_checked(runner, &spec).map(|_| ())
}

pub(crate) fn cmd_migrate_diff(name: &str, output: OutputFormat, quiet: bool) {
    let allow_drop = std::env::var("ALLOW_DROP").is_ok_and(|v| v == "1");
    if let Err(e) = migrate_diff(&SystemRunner, name, allow_drop) {
        report_error(&format!("Migrate diff FAILED: {}", e), output, quiet);
        process::exit(1);
    }
}

pub(crate) fn cmd_migrate_apply(output: OutputFormat, quiet: bool) {
    if let Err(e) = migrate_apply(&SystemRunner, env_nonempty("DB_URL").as_deref()) {
        report_error(&format!("Migrate apply FAILED: {}", e), output, quiet);
        process::exit(1);
    }
}

/// Outcome of `atlas schema diff` between the database and the generated
/// schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DriftStatus {
    InSync,
    Pending(String),
    Drift(String),
}

pub(crate) fn db_status(runner: &dyn ProcessRunner, url: &str) -> Result<DriftStatus, String> {
    let spec = ProcessSpec::new("atlas").args(["schema", "diff", "--from", url, "--to", SCHEMA_URL, "--dev-url", DEV_URL]);
    let out = runner.run(&spec).map_err(|e| e.to_string())?;
    let combined = format!("{}{}", out.stdout_str(), out.stderr_str());
    if !out.success() {
        return Ok(DriftStatus::Drift(combined));
    }
    if combined.trim().is_empty() || combined.contains("Schemas are in sync") {
        Ok(DriftStatus::InSync)
    } else {
        Ok(DriftStatus::Pending(combined))
    }
}

fn require_db_url(output: OutputFormat, quiet: bool) -> String {
    match database_url() {
        Some(url) => url,
        None => {
            report_error("Error: DATABASE_URL is not set.", output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn cmd_db_status(output: OutputFormat, quiet: bool) {
    let url = require_db_url(output, quiet);
    if !quiet {
        println!("Checking database schema drift...");
    }
    match db_status(&SystemRunner, &url) {
        Ok(DriftStatus::InSync) => {
            if !quiet {
                println!("Database schema is in sync with CUE.");
            }
        }
        Ok(DriftStatus::Pending(changes)) => println!("\nPending changes:\n{}", changes),
        Ok(DriftStatus::Drift(report)) => {
            report_error(&format!("\nDRIFT DETECTED:\n{}", report), output, quiet);
            report_error("Hint: Run 'ang db sync' to apply these changes.", output, quiet);
            process::exit(1);
        }
        Err(e) => {
            report_error(&format!("DB Status FAILED: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn cmd_db_sync(output: OutputFormat, quiet: bool) {
    let url = require_db_url(output, quiet);
    if !quiet {
        println!("Synchronizing database schema with CUE...");
    }
    let spec = ProcessSpec::new("atlas").args([
        "schema",
        "apply",
        "--url",
        url.as_str(),
        "--to",
        SCHEMA_URL,
        "--dev-url",
        DEV_URL,
        "--auto-approve",
    ]);
    if let Err(e) = run_checked(&SystemRunner, &spec) {
        report_error(&format!("\nDB Sync FAILED: {}", e), output, quiet);
        process::exit(1);
    }
    if !quiet {
        println!("\nDatabase schema is now in sync with CUE.");
    }
}

pub(crate) fn cmd_contract_test(output: OutputFormat, quiet: bool) {
    if !quiet {
        println!("Running contract tests...");
    }
    let spec = ProcessSpec::new("go").args(["test", "-tags=contract", "./tests/contract/..."]);
    if let Err(e) = run_checked(&SystemRunner, &spec) {
        report_error(&format!("Contract tests FAILED: {}", e), output, quiet);
        process::exit(1);
    }
    if !quiet {
        println!("Contract tests PASSED.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ang_core::process::ProcessError;
    use std::cell::RefCell;

    struct Fixed {
        status: i32,
        stdout: &'static str,
        calls: RefCell<Vec<ProcessSpec>>,
    }

    impl Fixed {
        fn new(status: i32, stdout: &'static str) -> Self {
            Fixed {
                status,
                stdout,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ProcessRunner for Fixed {
        fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
            self.calls.borrow_mut().push(spec.clone());
            Ok(ProcessOutput {
                status: self.status,
                stdout: self.stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
            })
        }
    }

    #[test]
    fn missing_migrations_dir_is_not_destructive() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(check_destructive(&dir.path().join("nope"), false), Ok(()));
    }

    #[test]
    fn drop_statements_need_allow_drop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("20240101_init.sql"), "CREATE TABLE orders (id text);").unwrap();
        fs::write(dir.path().join("notes.txt"), "drop table orders").unwrap();
        assert_eq!(check_destructive(dir.path(), false), Ok(()));

        let newest = dir.path().join("20240102_cleanup.sql");
        fs::write(&newest, "alter table orders drop column total;").unwrap();
        let later = SystemTime::now() + std::time::Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&newest)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert_eq!(latest_migration(dir.path()).unwrap(), Some(newest));
        let err = check_destructive(dir.path(), false).unwrap_err();
        assert!(err.ends_with("(set ALLOW_DROP=1 to accept)"));
        assert_eq!(check_destructive(dir.path(), true), Ok(()));
    }

    #[test]
    fn apply_requires_url_before_spawning() {
        let runner = Fixed::new(0, "");
        assert_eq!(migrate_apply(&runner, None), Err("DB_URL is required".to_string()));
        assert!(runner.calls.borrow().is_empty());

        migrate_apply(&runner, Some("postgres://localhost/app")).unwrap();
        let call = runner.calls.borrow()[0].clone();
        assert_eq!(call.program, "atlas");
        assert_eq!(call.args.last().map(String::as_str), Some("postgres://localhost/app"));
    }

    #[test]
    fn drift_status_classification() {
        assert_eq!(db_status(&Fixed::new(0, ""), "pg://x").unwrap(), DriftStatus::InSync);
        assert_eq!(
            db_status(&Fixed::new(0, "Schemas are in sync, no changes to be made.\n"), "pg://x").unwrap(),
            DriftStatus::InSync
        );
        assert!(matches!(
            db_status(&Fixed::new(0, "ALTER TABLE orders ADD COLUMN note text;"), "pg://x").unwrap(),
            DriftStatus::Pending(p) if p.contains("ADD COLUMN")
        ));
        assert!(matches!(
            db_status(&Fixed::new(1, "connection refused"), "pg://x").unwrap(),
            DriftStatus::Drift(_)
        ));
    }

    #[test]
    fn failed_diff_skips_the_drop_check() {
        let runner = Fixed::new(1, "");
        let err = migrate_diff(&runner, "add_orders", false).unwrap_err();
        assert!(err.contains("exited with status 1"));
        assert_eq!(runner.calls.borrow()[0].args[2], "add_orders");
    }
}
