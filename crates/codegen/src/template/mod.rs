//! Template lookup.
//!
//! Emitters ask a [`TemplateResolver`] for template bytes by name
//! (`go/service_port.go.tmpl`). [`ProjectTemplates`] prefers a file under
//! the project's `templates/` directory and falls back to the templates
//! compiled into this crate.

mod builtin;
pub mod render;

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::TemplateError;

pub use builtin::BUILTIN_TEMPLATES;
pub use render::Template;

pub trait TemplateResolver {
    /// Raw template bytes for `name`.
    fn resolve(&self, name: &str) -> Result<Vec<u8>, TemplateError>;
}

/// Templates compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinTemplates;

impl TemplateResolver for BuiltinTemplates {
    fn resolve(&self, name: &str) -> Result<Vec<u8>, TemplateError> {
        BUILTIN_TEMPLATES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, body)| body.as_bytes().to_vec())
            .ok_or_else(|| TemplateError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Project overrides from `<project>/templates/<name>`, else built-in.
#[derive(Debug, Clone)]
pub struct ProjectTemplates {
    dir: PathBuf,
}

impl ProjectTemplates {
    pub fn new(project_root: &Path) -> Self {
        ProjectTemplates {
            dir: project_root.join("templates"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TemplateResolver for ProjectTemplates {
    fn resolve(&self, name: &str) -> Result<Vec<u8>, TemplateError> {
        let candidate = self.dir.join(name);
        if candidate.is_file() {
            tracing::debug!(template = name, path = %candidate.display(), "using project template");
            return std::fs::read(&candidate).map_err(|e| TemplateError::Render {
                name: name.to_string(),
                message: format!("read {}: {}", candidate.display(), e),
            });
        }
        BuiltinTemplates.resolve(name)
    }
}

/// SHA-256 over every built-in template and every project override,
/// keyed by name. Changes whenever any template the build could use
/// changes.
pub fn templates_hash(project_root: &Path) -> String {
    let mut entries: Vec<(String, Vec<u8>)> = BUILTIN_TEMPLATES
        .iter()
        .map(|(name, body)| (format!("builtin:{}", name), body.as_bytes().to_vec()))
        .collect();
    let dir = project_root.join("templates");
    if dir.is_dir() {
        for entry in WalkDir::new(&dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&dir) else {
                continue;
            };
            let Ok(body) = std::fs::read(entry.path()) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            entries.push((format!("project:{}", rel), body));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let mut hasher = Sha256::new();
    for (name, body) in &entries {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update((body.len() as u64).to_le_bytes());
        hasher.update(body);
    }
    ang_core::project_hash::hex(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let name = "go/logger.go.tmpl";
        let builtin = BuiltinTemplates.resolve(name).unwrap();
        let resolver = ProjectTemplates::new(dir.path());
        assert_eq!(resolver.resolve(name).unwrap(), builtin);

        let before = templates_hash(dir.path());
        std::fs::create_dir_all(dir.path().join("templates/go")).unwrap();
        std::fs::write(dir.path().join("templates").join(name), "package logger\n").unwrap();
        assert_eq!(resolver.resolve(name).unwrap(), b"package logger\n".to_vec());
        assert_ne!(templates_hash(dir.path()), before);
    }

    #[test]
    fn unknown_template() {
        assert!(matches!(
            BuiltinTemplates.resolve("nope.tmpl"),
            Err(TemplateError::NotFound { .. })
        ));
    }

    #[test]
    fn every_builtin_template_parses() {
        for (name, body) in BUILTIN_TEMPLATES {
            if let Err(e) = Template::parse(name, body) {
                panic!("{}", e);
            }
        }
    }
}
