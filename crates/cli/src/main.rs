mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use commands::audit::{cmd_draw, cmd_events_map, cmd_mcp, cmd_rbac_actions, cmd_rbac_inspect, cmd_test_gen, cmd_vet, cmd_vet_logic};
use commands::build::cmd_build;
use commands::doctor::{cmd_api_diff, cmd_doctor, cmd_explain};
use commands::init::cmd_init;
use commands::ops::{cmd_contract_test, cmd_db_status, cmd_db_sync, cmd_migrate_apply, cmd_migrate_diff};
use commands::validate::{cmd_lint, cmd_validate, LintArgs};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Format of the build progress stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum LogFormat {
    #[default]
    Text,
    Json,
}

/// ANG: compiles architectural intent into source trees.
#[derive(Parser)]
#[command(name = "ang", version, about = "ANG architectural intent compiler")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new ANG project structure
    Init {
        /// Directory to initialize
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
        /// Language of the initial target
        #[arg(long, default_value = "go")]
        lang: String,
        /// Database of the initial target
        #[arg(long, default_value = "postgres")]
        db: String,
        /// Go module path
        #[arg(long)]
        module: Option<String>,
        /// Write into a non-empty directory, replacing scaffold files
        #[arg(long)]
        force: bool,
    },

    /// Validate intent models and architecture
    Validate {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },

    /// Deep semantic linting of flows and logic
    Lint(LintArgs),

    /// Compile intent into backend code, SDKs and infra configs
    Build(BuildArgs),

    /// Run migration diff/apply using Atlas
    Migrate {
        #[command(subcommand)]
        command: MigrateCommands,
    },

    /// Compare OpenAPI documents and recommend a semver bump
    ApiDiff {
        /// Baseline OpenAPI document
        #[arg(long, default_value = ang_analyze::api_diff::DEFAULT_BASE)]
        base: PathBuf,
        /// Current OpenAPI document
        #[arg(long, default_value = ang_analyze::api_diff::DEFAULT_CURRENT)]
        current: PathBuf,
        /// Overwrite the baseline with the current document
        #[arg(long)]
        write_base: bool,
    },

    /// Database schema drift and synchronization (requires DATABASE_URL)
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Check architectural invariants and policies
    Vet {
        #[command(subcommand)]
        command: Option<VetCommands>,
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },

    /// Audit RBAC actions and policies
    Rbac {
        #[command(subcommand)]
        command: RbacCommands,
    },

    /// Event-driven architecture audit
    Events {
        #[command(subcommand)]
        command: EventsCommands,
    },

    /// Generate architecture diagrams (Mermaid)
    Draw {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },

    /// Generate behavioural test cases from method flows
    Test {
        #[command(subcommand)]
        command: TestCommands,
    },

    /// Analyze a build log and suggest fixes
    Doctor {
        /// Build log file read when no other input is given
        #[arg(long, default_value = "ang-build.log")]
        log_file: PathBuf,
        /// Inline log text
        #[arg(long)]
        log: Option<String>,
        /// Read the log from stdin
        #[arg(long)]
        stdin: bool,
    },

    /// Start the Language Server Protocol server
    Lsp {
        /// Communicate over stdin/stdout
        #[arg(long)]
        stdio: bool,
    },

    /// Show the project hash (intent + templates)
    Hash {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },

    /// Show compiler and IR schema versions
    Version,

    /// Explain a diagnostic or error code with an example
    Explain {
        /// Code to explain, e.g. MISSING_OUTPUT
        code: Option<String>,
    },

    /// Run generated HTTP/WS contract tests
    ContractTest,

    /// Write MCP tool definitions for every service method
    Mcp {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Diff the generated schema against the migration directory
    Diff {
        /// Migration name
        name: String,
    },
    /// Apply pending migrations (requires DB_URL)
    Apply,
}

#[derive(Subcommand)]
enum DbCommands {
    /// Report drift between the database and the generated schema
    Status,
    /// Apply the generated schema to the database
    Sync,
}

#[derive(Subcommand)]
enum VetCommands {
    /// Audit embedded Go snippets for syntax errors
    Logic {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },
}

#[derive(Subcommand)]
enum RbacCommands {
    /// List every registered action (service.method)
    Actions {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },
    /// Report unprotected methods and zombie policies
    Inspect {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },
}

#[derive(Subcommand)]
enum EventsCommands {
    /// Show producers and consumers of every event
    Map {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },
}

#[derive(Subcommand)]
enum TestCommands {
    /// Write flow test cases as JSON
    Gen {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
        /// Output file, relative to the project
        #[arg(long, default_value = ang_analyze::DEFAULT_FLOW_CASES_PATH)]
        out: PathBuf,
    },
}

/// Flags of `ang build`.
#[derive(Args, Debug, Clone)]
pub(crate) struct BuildArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project: PathBuf,
    /// Directory for generated backend code (forces in_place mode)
    #[arg(long)]
    pub backend_dir: Option<PathBuf>,
    /// Directory for the generated frontend SDK
    #[arg(long)]
    pub frontend_dir: Option<PathBuf>,
    /// Copy the generated frontend SDK into this app directory
    #[arg(long)]
    pub frontend_app_dir: Option<PathBuf>,
    /// Directory for the generated admin frontend
    #[arg(long)]
    pub frontend_admin_dir: Option<PathBuf>,
    /// Copy the generated admin app into this directory
    #[arg(long)]
    pub frontend_admin_app_dir: Option<PathBuf>,
    /// Path of the frontend .env.example
    #[arg(long)]
    pub frontend_env_path: Option<PathBuf>,
    /// Generate frontend test stubs
    #[arg(long)]
    pub test_stubs: bool,
    /// Build only selected targets: name, lang or lang/framework/db, comma-separated
    #[arg(long, default_value = "")]
    pub target: String,
    /// Preview file changes without writing to output directories
    #[arg(long)]
    pub dry_run: bool,
    /// Build progress format
    #[arg(long, default_value = "text", value_enum)]
    pub log_format: LogFormat,
    /// Output mode: in_place | release
    #[arg(long)]
    pub mode: Option<String>,
    /// Rebuild whenever intent or templates change
    #[arg(short = 'w', long)]
    pub watch: bool,
    /// Polling interval in milliseconds for --watch
    #[arg(long, value_name = "MS", default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub watch_interval: u64,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ANG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let (output, quiet) = (cli.output, cli.quiet);

    match cli.command {
        Commands::Init {
            dir,
            name,
            lang,
            db,
            module,
            force,
        } => {
            let opts = commands::init::InitOptions {
                dir,
                name,
                lang,
                db,
                module,
                force,
            };
            cmd_init(&opts, output, quiet);
        }
        Commands::Validate { project } => cmd_validate(&project, output, quiet),
        Commands::Lint(args) => cmd_lint(&args, output, quiet),
        Commands::Build(args) => cmd_build(&args, output, quiet),
        Commands::Migrate { command } => match command {
            MigrateCommands::Diff { name } => cmd_migrate_diff(&name, output, quiet),
            MigrateCommands::Apply => cmd_migrate_apply(output, quiet),
        },
        Commands::ApiDiff {
            base,
            current,
            write_base,
        } => cmd_api_diff(&base, &current, write_base, output, quiet),
        Commands::Db { command } => match command {
            DbCommands::Status => cmd_db_status(output, quiet),
            DbCommands::Sync => cmd_db_sync(output, quiet),
        },
        Commands::Vet { command, project } => match command {
            Some(VetCommands::Logic { project }) => cmd_vet_logic(&project, output, quiet),
            None => cmd_vet(&project, output, quiet),
        },
        Commands::Rbac { command } => match command {
            RbacCommands::Actions { project } => cmd_rbac_actions(&project, output, quiet),
            RbacCommands::Inspect { project } => cmd_rbac_inspect(&project, output, quiet),
        },
        Commands::Events { command } => match command {
            EventsCommands::Map { project } => cmd_events_map(&project, output, quiet),
        },
        Commands::Draw { project } => cmd_draw(&project, output, quiet),
        Commands::Test { command } => match command {
            TestCommands::Gen { project, out } => cmd_test_gen(&project, &out, output, quiet),
        },
        Commands::Doctor { log_file, log, stdin } => {
            cmd_doctor(&log_file, log.as_deref(), stdin, output, quiet);
        }
        Commands::Lsp { stdio } => {
            if !stdio {
                report_error("LSP FAILED: only --stdio mode is supported", output, quiet);
                process::exit(1);
            }
            if let Err(e) = ang_lsp::run() {
                report_error(&format!("LSP FAILED: {}", e), output, quiet);
                process::exit(1);
            }
        }
        Commands::Hash { project } => cmd_hash(&project, output, quiet),
        Commands::Version => cmd_version(output),
        Commands::Explain { code } => cmd_explain(code.as_deref(), output, quiet),
        Commands::ContractTest => cmd_contract_test(output, quiet),
        Commands::Mcp { project } => cmd_mcp(&project, output, quiet),
    }
}

fn cmd_hash(project: &std::path::Path, output: OutputFormat, quiet: bool) {
    let hash = match ang_core::compute_project_hash(project) {
        Ok(h) => h,
        Err(e) => {
            report_error(&format!("Hash FAILED: {}", e), output, quiet);
            process::exit(1);
        }
    };
    match output {
        OutputFormat::Text => println!("{}", hash),
        OutputFormat::Json => {
            let doc = serde_json::json!({"hash": hash, "version": ang_core::COMPILER_VERSION});
            println!("{}", doc);
        }
    }
}

fn cmd_version(output: OutputFormat) {
    match output {
        OutputFormat::Text => println!(
            "ANG version {} (Schema v{})",
            ang_core::COMPILER_VERSION,
            ang_ir::IR_VERSION
        ),
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "version": ang_core::COMPILER_VERSION,
                "ir_version": ang_ir::IR_VERSION,
            });
            println!("{}", doc);
        }
    }
}

/// Report an error message respecting output format and quiet flag.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_args(argv: &[&str]) -> BuildArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Build(args) => args,
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn watch_interval_defaults_to_one_second() {
        let args = build_args(&["ang", "build", ".", "--watch"]);
        assert!(args.watch);
        assert_eq!(args.watch_interval, 1000);
        let args = build_args(&["ang", "build", ".", "-w", "--watch-interval", "250"]);
        assert_eq!(args.watch_interval, 250);
        assert!(Cli::try_parse_from(["ang", "build", ".", "--watch-interval", "0"]).is_err());
    }
}
