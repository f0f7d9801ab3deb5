//! `ang init`: scaffold a minimal intent tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use serde_json::json;

use crate::{report_error, OutputFormat};

#[derive(Debug, Clone)]
pub(crate) struct InitOptions {
    pub dir: PathBuf,
    pub name: Option<String>,
    pub lang: String,
    pub db: String,
    pub module: Option<String>,
    pub force: bool,
}

const DOMAIN_ORDER: &str = r#"{
  Order: {
    fields: {
      id: "string",
      total: "int",
    },
  },
}
"#;

const ARCH_ORDERS: &str = r#"{
  Orders: {
    methods: {
      GetOrder: {
        input: {id: "string"},
        output: {order: "Order"},
        flow: [
          {action: "repo.Find", source: "Order", input: "req.ID", output: "order", error: "Order not found"},
          {action: "mapping.Assign", to: "resp.Order", value: "order"},
        ],
      },
    },
  },
}
"#;

const API_HTTP: &str = r#"{
  endpoints: [
    {method: "GET", path: "/orders/{id}", service: "Orders", rpc: "GetOrder"},
  ],
}
"#;

pub(crate) fn default_framework(lang: &str) -> &'static str {
    match lang {
        "python" => "fastapi",
        _ => "chi",
    }
}

/// Lowercase, with anything outside `[a-z0-9_-]` replaced by `-`.
pub(crate) fn sanitize_project_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('-').to_string();
    if cleaned.is_empty() {
        "app".to_string()
    } else {
        cleaned
    }
}

fn ensure_target_dir(dir: &Path, force: bool) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| format!("create target directory {}: {}", dir.display(), e))?;
    let mut entries = fs::read_dir(dir).map_err(|e| format!("read target directory {}: {}", dir.display(), e))?;
    if entries.next().is_some() && !force {
        return Err(format!(
            "target directory {} is not empty (use --force to continue)",
            dir.display()
        ));
    }
    Ok(())
}

/// Relative path and contents of every scaffold file.
pub(crate) fn scaffold_files(opts: &InitOptions) -> Vec<(&'static str, String)> {
    let dir_name = std::path::absolute(&opts.dir)
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();
    let name = sanitize_project_name(opts.name.as_deref().unwrap_or(&dir_name));
    let module = opts.module.clone().unwrap_or_else(|| format!("github.com/example/{}", name));

    let project = json!({
        "project": {
            "name": name,
            "module": module,
            "build": {"mode": "in_place"},
        },
        "targets": [{
            "name": "api",
            "lang": opts.lang,
            "framework": default_framework(&opts.lang),
            "db": opts.db,
        }],
    });
    let mut project_text = serde_json::to_string_pretty(&project).unwrap_or_default();
    project_text.push('\n');

    let mut files = vec![
        ("cue/domain/order.json", DOMAIN_ORDER.to_string()),
        ("cue/architecture/orders.json", ARCH_ORDERS.to_string()),
        ("cue/api/http.json", API_HTTP.to_string()),
        ("cue/project/project.json", project_text),
    ];
    if opts.lang == "go" {
        files.push(("go.mod", format!("module {}\n\ngo 1.22\n", module)));
    }
    files
}

pub(crate) fn init_project(opts: &InitOptions) -> Result<Vec<PathBuf>, String> {
    ensure_target_dir(&opts.dir, opts.force)?;
    let mut written = Vec::new();
    for (rel, body) in scaffold_files(opts) {
        let path = opts.dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create {}: {}", parent.display(), e))?;
        }
        fs::write(&path, body).map_err(|e| format!("write {}: {}", path.display(), e))?;
        written.push(path);
    }
    tracing::info!(dir = %opts.dir.display(), files = written.len(), "project scaffold written");
    Ok(written)
}

pub(crate) fn cmd_init(opts: &InitOptions, output: OutputFormat, quiet: bool) {
    if output == OutputFormat::Text && !quiet {
        println!("Initializing ANG project...");
    }
    let written = match init_project(opts) {
        Ok(w) => w,
        Err(e) => {
            report_error(&format!("Init FAILED: {}", e), output, quiet);
            process::exit(1);
        }
    };
    match output {
        OutputFormat::Text => {
            if !quiet {
                for path in &written {
                    println!("  + {}", path.display());
                }
                println!("Project structure initialized successfully.");
            }
        }
        OutputFormat::Json => {
            let files: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
            println!("{}", json!({"status": "ok", "files": files}));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(dir: &Path) -> InitOptions {
        InitOptions {
            dir: dir.to_path_buf(),
            name: Some("My Shop".into()),
            lang: "go".into(),
            db: "postgres".into(),
            module: None,
            force: false,
        }
    }

    #[test]
    fn names_are_sanitized() {
        assert_eq!(sanitize_project_name("My Shop"), "my-shop");
        assert_eq!(sanitize_project_name("  "), "app");
        assert_eq!(sanitize_project_name("billing_v2"), "billing_v2");
    }

    #[test]
    fn scaffold_writes_project_and_go_mod() {
        let dir = tempfile::tempdir().unwrap();
        init_project(&opts(dir.path())).unwrap();
        let project: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("cue/project/project.json")).unwrap()).unwrap();
        assert_eq!(project["project"]["name"], "my-shop");
        assert_eq!(project["targets"][0]["framework"], "chi");
        let go_mod = fs::read_to_string(dir.path().join("go.mod")).unwrap();
        assert!(go_mod.starts_with("module github.com/example/my-shop"));
    }

    #[test]
    fn python_scaffold_has_no_go_mod() {
        let dir = tempfile::tempdir().unwrap();
        let mut o = opts(dir.path());
        o.lang = "python".into();
        init_project(&o).unwrap();
        assert!(!dir.path().join("go.mod").exists());
        assert!(fs::read_to_string(dir.path().join("cue/project/project.json"))
            .unwrap()
            .contains("fastapi"));
    }

    #[test]
    fn non_empty_dir_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "hi").unwrap();
        let err = init_project(&opts(dir.path())).unwrap_err();
        assert!(err.ends_with("is not empty (use --force to continue)"));

        let mut forced = opts(dir.path());
        forced.force = true;
        assert!(init_project(&forced).is_ok());
        assert!(dir.path().join("README.md").exists());
    }
}
