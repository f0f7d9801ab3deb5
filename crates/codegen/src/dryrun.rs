//! Dry-run planning.
//!
//! A dry run emits every target into a scratch tree, then compares each
//! scratch file with the file at its intended location. Nothing under the
//! intended directories is touched.

use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use crate::emitter::normalize;
use crate::error::CodegenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Unchanged,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "create",
            ChangeAction::Update => "update",
            ChangeAction::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub action: ChangeAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DryRunTarget {
    pub target: String,
    pub lang: String,
    pub backend_dir: String,
    pub frontend_dir: String,
    pub changes: Vec<FileChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DryRunManifest {
    pub status: String,
    pub total_targets: usize,
    pub total_generated_files: usize,
    pub total_create: usize,
    pub total_update: usize,
    pub total_unchanged: usize,
    pub targets: Vec<DryRunTarget>,
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub optional_steps_skipped: Vec<String>,
}

impl Default for DryRunManifest {
    fn default() -> Self {
        DryRunManifest {
            status: "dry_run".to_string(),
            total_targets: 0,
            total_generated_files: 0,
            total_create: 0,
            total_update: 0,
            total_unchanged: 0,
            targets: Vec::new(),
            notes: vec!["No output files were written to intended build directories.".to_string()],
            optional_steps_skipped: Vec::new(),
        }
    }
}

impl DryRunManifest {
    /// Recompute the totals from the per-target change lists.
    pub fn summarize(&mut self) {
        self.total_targets = self.targets.len();
        self.total_generated_files = 0;
        self.total_create = 0;
        self.total_update = 0;
        self.total_unchanged = 0;
        for change in self.targets.iter().flat_map(|t| &t.changes) {
            self.total_generated_files += 1;
            match change.action {
                ChangeAction::Create => self.total_create += 1,
                ChangeAction::Update => self.total_update += 1,
                ChangeAction::Unchanged => self.total_unchanged += 1,
            }
        }
    }
}

pub(crate) fn slash_path(p: &Path) -> String {
    normalize(p).to_string_lossy().replace('\\', "/")
}

/// Classify every file under `scratch` against the same relative path under
/// `intended`. Sorted by action, then path.
pub fn diff_tree(scratch: &Path, intended: &Path) -> Result<Vec<FileChange>, CodegenError> {
    let mut changes = Vec::new();
    if !scratch.is_dir() {
        return Ok(changes);
    }
    for entry in WalkDir::new(scratch) {
        let entry = entry.map_err(|e| CodegenError::Read {
            path: scratch.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(scratch) else {
            continue;
        };
        let generated = std::fs::read(entry.path()).map_err(|e| CodegenError::Read {
            path: entry.path().to_path_buf(),
            source: e,
        })?;
        let dest = intended.join(rel);
        let action = match std::fs::read(&dest) {
            Ok(existing) if existing == generated => ChangeAction::Unchanged,
            Ok(_) => ChangeAction::Update,
            Err(_) => ChangeAction::Create,
        };
        changes.push(FileChange {
            path: slash_path(&dest),
            action,
        });
    }
    changes.sort_by(|a, b| {
        a.action
            .as_str()
            .cmp(b.action.as_str())
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(changes)
}
