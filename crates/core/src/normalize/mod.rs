//! Normalizer: loaded trees -> typed definitions.
//!
//! Every extractor is total on its input shape. Unknown members produce
//! `UNKNOWN_FIELD` diagnostics (severity info) instead of failures; only
//! structurally unusable input (a service that is not an object, a template
//! with no body) is an error.

mod api;
mod entity;
mod infra;
mod policy;
mod project;
mod repo;
mod service;

pub(crate) use api::API_SECTIONS;
pub use infra::{InfraRegistry, InfraSections};

use std::path::{Path, PathBuf};

use ang_ir::SourceLoc;

use crate::diagnostic::Warning;
use crate::loader::Node;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("{loc}: {message}")]
    Invalid { loc: SourceLoc, message: String },
    #[error("template '{name}': cannot read {path}: {source}")]
    TemplateFile {
        name: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("template '{name}': {field} is empty and no {field}_file is set")]
    MissingTemplateBody { name: String, field: String },
}

impl NormalizeError {
    pub(crate) fn invalid(node: &Node, message: impl Into<String>) -> Self {
        NormalizeError::Invalid {
            loc: node.loc.clone(),
            message: message.into(),
        }
    }
}

/// Extraction state shared by all extractors of one pipeline run.
pub struct Normalizer {
    project_root: PathBuf,
    warnings: Vec<Warning>,
}

impl Normalizer {
    pub fn new(project_root: &Path) -> Self {
        Normalizer {
            project_root: project_root.to_path_buf(),
            warnings: Vec::new(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    pub(crate) fn push(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Report members of `node` not listed in `allowed`.
    pub(crate) fn check_fields(&mut self, node: &Node, allowed: &[&str], what: &str) {
        for (key, child) in node.members() {
            if !allowed.contains(&key.as_str()) {
                self.warnings.push(
                    Warning::info("UNKNOWN_FIELD", format!("unknown field '{}' in {}", key, what))
                        .with_hint(format!("known fields: {}", allowed.join(", ")))
                        .at(&child.loc),
                );
            }
        }
    }

    /// Resolve `path` relative to the project root; absolute paths pass through.
    pub(crate) fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.project_root.join(p)
        }
    }
}

/// `{param}` names in a path template, in order.
///
/// An unmatched `{` ends the scan; params found before it are returned.
pub fn path_params(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        let name = after[..close].trim();
        if !name.is_empty() {
            out.push(name.to_string());
        }
        rest = &after[close + 1..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_params_in_order() {
        assert_eq!(path_params("/a/{id}/b/{slug}"), vec!["id", "slug"]);
        assert!(path_params("/health").is_empty());
    }

    #[test]
    fn path_params_stops_at_unmatched_brace() {
        assert_eq!(path_params("/a/{id}/b/{slug"), vec!["id"]);
    }
}
