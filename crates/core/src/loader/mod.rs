//! Domain loading.
//!
//! A project's declarative input lives under `cue/<domain>/`. The pipeline
//! reads it through [`DomainLoader`]; the bundled [`JsonDirLoader`] reads
//! relaxed JSON files and merges their top-level members.

mod json;
mod node;

pub use json::parse as parse_relaxed_json;
pub use node::{Node, NodeValue};

use std::path::Path;

use ang_ir::SourceLoc;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{file}:{line}:{column}: {message}")]
    Parse {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },
    #[error("{file}:{line}:{column}: '{key}' is already declared in {first}")]
    DuplicateKey {
        key: String,
        first: String,
        file: String,
        line: u32,
        column: u32,
    },
    #[error("{file}: top-level value must be an object, found {found}")]
    NotAnObject { file: String, found: &'static str },
}

/// Resolves a domain directory to a typed tree of declared values.
pub trait DomainLoader {
    /// Load `domain` (a path relative to `project`, e.g. `cue/domain`).
    /// Returns `Ok(None)` when the domain does not exist.
    fn load_domain(&self, project: &Path, domain: &str) -> Result<Option<Node>, LoadError>;
}

/// Reads every `*.json` file directly inside the domain directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDirLoader;

impl DomainLoader for JsonDirLoader {
    fn load_domain(&self, project: &Path, domain: &str) -> Result<Option<Node>, LoadError> {
        let dir = project.join(domain);
        if !dir.is_dir() {
            return Ok(None);
        }
        let io_err = |path: &Path, source| LoadError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
            let path = entry.map_err(|e| io_err(&dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut merged: Vec<(String, Node)> = Vec::new();
        for path in &files {
            let src = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let rel = format!("{}/{}", domain.trim_end_matches('/'), name);
            let doc = parse_relaxed_json(&src, &rel)?;
            let NodeValue::Object(members) = doc.value else {
                return Err(LoadError::NotAnObject {
                    file: rel,
                    found: doc.kind(),
                });
            };
            for (key, node) in members {
                if let Some((_, prev)) = merged.iter().find(|(k, _)| *k == key) {
                    return Err(LoadError::DuplicateKey {
                        key,
                        first: prev.loc.file.clone(),
                        file: node.loc.file.clone(),
                        line: node.loc.line,
                        column: node.loc.column,
                    });
                }
                merged.push((key, node));
            }
        }
        tracing::trace!(domain, files = files.len(), "loaded domain");

        Ok(Some(Node::object(
            merged,
            SourceLoc {
                file: domain.to_string(),
                line: 1,
                column: 1,
                path: String::new(),
            },
        )))
    }
}

/// File stem of the file a node was declared in (`cue/domain/user.json` -> `user`).
pub fn file_stem(loc: &SourceLoc) -> &str {
    let name = loc.file.rsplit('/').next().unwrap_or(loc.file.as_str());
    name.strip_suffix(".json").unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let domain = dir.path().join("cue/domain");
        std::fs::create_dir_all(&domain).unwrap();
        std::fs::write(domain.join("b.json"), r#"{"Order": {"fields": {}}}"#).unwrap();
        std::fs::write(domain.join("a.json"), r#"{"User": {"fields": {}}}"#).unwrap();
        std::fs::write(domain.join("notes.txt"), "ignored").unwrap();

        let node = JsonDirLoader
            .load_domain(dir.path(), "cue/domain")
            .unwrap()
            .unwrap();
        let keys: Vec<&str> = node.members().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["User", "Order"]);
        assert_eq!(node.get("Order").unwrap().loc.file, "cue/domain/b.json");
        assert_eq!(file_stem(&node.get("User").unwrap().loc), "a");
    }

    #[test]
    fn missing_domain_is_none_and_duplicates_fail() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JsonDirLoader
            .load_domain(dir.path(), "cue/views")
            .unwrap()
            .is_none());

        let domain = dir.path().join("cue/domain");
        std::fs::create_dir_all(&domain).unwrap();
        std::fs::write(domain.join("a.json"), r#"{"User": {}}"#).unwrap();
        std::fs::write(domain.join("b.json"), r#"{"User": {}}"#).unwrap();
        let err = JsonDirLoader
            .load_domain(dir.path(), "cue/domain")
            .unwrap_err();
        assert!(err.to_string().contains("already declared in cue/domain/a.json"));
    }
}
