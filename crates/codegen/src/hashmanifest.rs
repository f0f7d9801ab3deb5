//! Artifact hash manifest.
//!
//! After a successful build every generated file is hashed into
//! `<project>/.ang/cache/manifest.json`. The document is deterministic:
//! artifacts are sorted by forward-slash relative path and object keys are
//! sorted (`serde_json::Map` is a `BTreeMap` here), so identical outputs give
//! identical bytes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ang_core::project_hash::hex;
use ang_ir::BuildMode;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::emitter::normalize;
use crate::error::ManifestError;

pub const MANIFEST_SCHEMA_VERSION: &str = "artifact-manifest/v1";
pub const MANIFEST_PATH: &str = ".ang/cache/manifest.json";

/// Subtrees owned by the generator when it writes into the project root.
pub const IN_PLACE_OWNED: &[&str] = &[
    "cmd/server",
    "internal",
    "api",
    "db",
    "deploy",
    "sdk",
    "ang-manifest.json",
    "atlas.hcl",
    "sqlc.yaml",
];

/// Output locations of one built target.
#[derive(Debug, Clone)]
pub struct ManifestTarget {
    pub mode: BuildMode,
    pub backend: PathBuf,
    pub frontend: PathBuf,
}

fn absolute(project: &Path, p: &Path) -> PathBuf {
    normalize(&if p.is_absolute() {
        p.to_path_buf()
    } else {
        project.join(p)
    })
}

/// Roots to hash, deduplicated and sorted.
pub fn manifest_roots(project: &Path, targets: &[ManifestTarget]) -> Vec<PathBuf> {
    let project = normalize(project);
    let mut roots = BTreeSet::new();
    for t in targets {
        let backend = absolute(&project, &t.backend);
        let frontend = absolute(&project, &t.frontend);
        if t.mode == BuildMode::InPlace && backend == project {
            let owned: Vec<PathBuf> = IN_PLACE_OWNED.iter().map(|o| project.join(o)).collect();
            if !owned.iter().any(|o| frontend.starts_with(o)) {
                roots.insert(frontend);
            }
            roots.extend(owned);
        } else {
            roots.insert(backend);
            roots.insert(frontend);
        }
    }
    roots.into_iter().collect()
}

fn rel_slash(project: &Path, path: &Path) -> String {
    path.strip_prefix(project)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// `(relative path, sha256)` for every file under `roots`, sorted by path.
/// The `.ang` directory is never hashed.
pub fn collect_artifacts(project: &Path, roots: &[PathBuf]) -> Result<Vec<(String, String)>, ManifestError> {
    let project = normalize(project);
    let cache = project.join(".ang");
    let mut files = BTreeSet::new();
    for root in roots {
        if !root.exists() {
            continue;
        }
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| ManifestError::Walk {
                root: root.clone(),
                message: e.to_string(),
            })?;
            let path = normalize(entry.path());
            if path.starts_with(&cache) || !entry.file_type().is_file() {
                continue;
            }
            files.insert(path);
        }
    }
    let mut out = Vec::with_capacity(files.len());
    for path in files {
        let bytes = std::fs::read(&path).map_err(|e| ManifestError::Read {
            path: path.clone(),
            source: e,
        })?;
        out.push((rel_slash(&project, &path), hex(&Sha256::digest(&bytes))));
    }
    out.sort();
    Ok(out)
}

/// Manifest document for the given artifacts.
pub fn manifest_document(
    artifacts: &[(String, String)],
    ir_version: &str,
    input_hash: Option<&str>,
    template_hash: Option<&str>,
) -> Value {
    let mut doc = Map::new();
    doc.insert("schemaVersion".into(), json!(MANIFEST_SCHEMA_VERSION));
    doc.insert("compilerVersion".into(), json!(ang_core::COMPILER_VERSION));
    doc.insert("irVersion".into(), json!(ir_version));
    if let Some(h) = input_hash.filter(|h| !h.is_empty()) {
        doc.insert("inputHash".into(), json!(h));
    }
    if let Some(h) = template_hash.filter(|h| !h.is_empty()) {
        doc.insert("templateHash".into(), json!(h));
    }
    let list: Vec<Value> = artifacts
        .iter()
        .map(|(path, hash)| json!({"path": path, "hash": hash}))
        .collect();
    doc.insert("artifacts".into(), Value::Array(list));
    Value::Object(doc)
}

/// Hash every artifact of `targets` and write the manifest. Returns the
/// manifest path.
pub fn write_artifact_hash_manifest(
    project: &Path,
    targets: &[ManifestTarget],
    ir_version: &str,
    input_hash: Option<&str>,
    template_hash: Option<&str>,
) -> Result<PathBuf, ManifestError> {
    let roots = manifest_roots(project, targets);
    let artifacts = collect_artifacts(project, &roots)?;
    let doc = manifest_document(&artifacts, ir_version, input_hash, template_hash);
    let mut text = serde_json::to_string_pretty(&doc)?;
    text.push('\n');

    let path = project.join(MANIFEST_PATH);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ManifestError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(&path, text).map_err(|e| ManifestError::Write {
        path: path.clone(),
        source: e,
    })?;
    tracing::debug!(artifacts = artifacts.len(), path = %path.display(), "artifact manifest written");
    Ok(path)
}
