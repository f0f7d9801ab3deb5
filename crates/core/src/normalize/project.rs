use ang_ir::{BuildMode, Strategy};

use super::{NormalizeError, Normalizer};
use crate::defs::{ProjectDef, TargetDef};
use crate::loader::Node;

const PROJECT_FIELDS: &[&str] = &[
    "name",
    "version",
    "module",
    "strategy",
    "build",
    "plugins",
    "ui_provider",
];

const TARGET_FIELDS: &[&str] = &[
    "name",
    "lang",
    "framework",
    "db",
    "cache",
    "queue",
    "storage",
    "output_dir",
];

impl Normalizer {
    /// `project` section of `cue/project`. Missing section yields defaults.
    pub fn extract_project(&mut self, domain: Option<&Node>) -> Result<ProjectDef, NormalizeError> {
        let Some(node) = domain.and_then(|d| d.get("project")) else {
            return Ok(default_project());
        };
        self.check_fields(node, PROJECT_FIELDS, "project");

        let strategy = match node.str_field("strategy").as_deref() {
            None | Some("monolith") => Strategy::Monolith,
            Some("microservices") => Strategy::Microservices,
            Some(other) => {
                return Err(NormalizeError::invalid(
                    node,
                    format!("unknown strategy '{}' (expected monolith or microservices)", other),
                ))
            }
        };
        let build_mode = match node.get("build").and_then(|b| b.str_field("mode")) {
            Some(raw) => match BuildMode::parse(&raw) {
                Some(mode) => Some(mode),
                None => {
                    return Err(NormalizeError::invalid(
                        node,
                        format!("unknown build mode '{}' (expected in_place or release)", raw),
                    ))
                }
            },
            None => None,
        };
        let name = node.str_field("name").unwrap_or_else(|| "app".to_string());
        Ok(ProjectDef {
            module: node
                .str_field("module")
                .unwrap_or_else(|| format!("github.com/example/{}", name)),
            name,
            version: node.str_field("version").unwrap_or_else(|| "0.1.0".to_string()),
            strategy,
            build_mode,
            plugins: node.str_list("plugins"),
            ui_provider: node.str_field("ui_provider"),
        })
    }

    /// `targets` list of `cue/project`; a single Go target when absent.
    pub fn extract_targets(&mut self, domain: Option<&Node>) -> Result<Vec<TargetDef>, NormalizeError> {
        let Some(list) = domain.and_then(|d| d.get("targets")) else {
            return Ok(vec![default_target("default")]);
        };
        let Some(items) = list.as_array() else {
            return Err(NormalizeError::invalid(list, "targets must be a list"));
        };
        let mut out: Vec<TargetDef> = Vec::with_capacity(items.len());
        for (i, node) in items.iter().enumerate() {
            self.check_fields(node, TARGET_FIELDS, "target");
            let defaults = default_target("");
            let field = |key: &str, fallback: &str| {
                node.str_field(key)
                    .map(|s| s.to_ascii_lowercase())
                    .unwrap_or_else(|| fallback.to_string())
            };
            let lang = field("lang", &defaults.lang);
            let name = node
                .str_field("name")
                .unwrap_or_else(|| if i == 0 { lang.clone() } else { format!("{}-{}", lang, i + 1) });
            if out.iter().any(|t| t.name == name) {
                return Err(NormalizeError::invalid(node, format!("duplicate target name '{}'", name)));
            }
            out.push(TargetDef {
                name,
                framework: field("framework", &defaults.framework),
                db: field("db", &defaults.db),
                cache: field("cache", &defaults.cache),
                queue: field("queue", &defaults.queue),
                storage: field("storage", &defaults.storage),
                output_dir: node.str_field("output_dir"),
                lang,
            });
        }
        if out.is_empty() {
            out.push(default_target("default"));
        }
        Ok(out)
    }
}

fn default_project() -> ProjectDef {
    ProjectDef {
        name: "app".to_string(),
        version: "0.1.0".to_string(),
        module: "github.com/example/app".to_string(),
        ..ProjectDef::default()
    }
}

fn default_target(name: &str) -> TargetDef {
    TargetDef {
        name: name.to_string(),
        lang: "go".to_string(),
        framework: "chi".to_string(),
        db: "postgres".to_string(),
        cache: "redis".to_string(),
        queue: "nats".to_string(),
        storage: "s3".to_string(),
        output_dir: None,
    }
}
