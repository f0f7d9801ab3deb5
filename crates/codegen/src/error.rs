//! Error types for code generation.

use std::path::PathBuf;

use ang_core::ContractError;

/// Template lookup and rendering failures.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template '{name}' not found")]
    NotFound { name: String },
    #[error("template '{name}' line {line}: {message}")]
    Parse {
        name: String,
        line: usize,
        message: String,
    },
    #[error("template '{name}': {message}")]
    Render { name: String, message: String },
    #[error("template '{name}' is not valid UTF-8")]
    Encoding { name: String },
}

/// Failure inside a single emission step.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("refusing to write '{}': outside the output roots", path.display())]
    OutsideRoot { path: PathBuf },
    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialize {what}: {message}")]
    Serialize { what: String, message: String },
    #[error("{0}")]
    Contract(#[from] ContractError),
    #[error("{0}")]
    Other(String),
}

impl CodegenError {
    pub fn serialize(what: &str, err: impl std::fmt::Display) -> Self {
        CodegenError::Serialize {
            what: what.to_string(),
            message: err.to_string(),
        }
    }
}

/// Artifact hash manifest failures.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("walk '{}': {message}", root.display())]
    Walk { root: PathBuf, message: String },
    #[error("read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}
