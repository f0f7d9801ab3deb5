//! Content hash of a project's inputs (`cue/` and `templates/`).

use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Directories whose contents determine the build.
pub const HASHED_DIRS: &[&str] = &["cue", "templates"];

/// SHA-256 (lowercase hex) over every file under [`HASHED_DIRS`], fed as
/// sorted `(relative path, content)` pairs. Missing directories hash as
/// empty, so the result only changes when an input file does.
pub fn compute_project_hash(project: &Path) -> std::io::Result<String> {
    let mut files: Vec<(String, std::path::PathBuf)> = Vec::new();
    for dir in HASHED_DIRS {
        let root = project.join(dir);
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = entry.map_err(std::io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(project)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.push((rel, entry.into_path()));
        }
    }
    files.sort();

    let mut hasher = Sha256::new();
    for (rel, path) in &files {
        let content = std::fs::read(path)?;
        hasher.update(rel.as_bytes());
        hasher.update([0u8]);
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(&content);
    }
    Ok(hex(&hasher.finalize()))
}

/// Lowercase hex encoding.
pub fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}
