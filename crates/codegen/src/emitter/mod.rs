//! The emitter engine.
//!
//! An [`Emitter`] is created per target. It owns the output roots, the
//! template resolver and the formatter, and records every file it produces.
//! Families (`emit_*` methods in the submodules) build a render context from
//! the IR, render a template and hand the bytes to [`Emitter::write`].
//!
//! Writes are idempotent (byte-equal files are left alone) and contained:
//! a path that escapes every configured root is refused.

mod docs;
pub mod flow;
pub mod format;
mod frontend;
mod go;
mod infra;
mod python;
mod sql;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use ang_ir::Schema;

use crate::context::MainContext;
use crate::error::{CodegenError, TemplateError};
use crate::missing::MissingImpls;
use crate::template::{Template, TemplateResolver};

pub use docs::{asyncapi_document, mcp_tools, openapi_document, system_manifest};
pub use format::{FormatError, Gofmt, NoFormat, SourceFormatter};

/// Which output root a relative path is written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    Backend,
    Frontend,
    FrontendAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRoots {
    pub backend: PathBuf,
    pub frontend: PathBuf,
    pub frontend_admin: PathBuf,
}

pub struct Emitter<'a> {
    schema: &'a Schema,
    main: MainContext,
    roots: OutputRoots,
    extra_roots: Vec<PathBuf>,
    resolver: &'a dyn TemplateResolver,
    formatter: &'a dyn SourceFormatter,
    templates: HashMap<String, Template>,
    missing: MissingImpls,
    generated: Vec<PathBuf>,
    written: usize,
    warnings: Vec<String>,
    /// Set once a missing formatter has been reported.
    formatter_missing: bool,
    dry_run: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(
        schema: &'a Schema,
        main: MainContext,
        roots: OutputRoots,
        resolver: &'a dyn TemplateResolver,
        formatter: &'a dyn SourceFormatter,
    ) -> Self {
        Emitter {
            schema,
            main,
            roots,
            extra_roots: Vec::new(),
            resolver,
            formatter,
            templates: HashMap::new(),
            missing: MissingImpls::default(),
            generated: Vec::new(),
            written: 0,
            warnings: Vec::new(),
            formatter_missing: false,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Permit writes under `root` (post-generation copies into app dirs).
    pub fn allow_root(&mut self, root: impl Into<PathBuf>) {
        self.extra_roots.push(root.into());
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn main(&self) -> &MainContext {
        &self.main
    }

    pub fn roots(&self) -> &OutputRoots {
        &self.roots
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn missing(&self) -> &MissingImpls {
        &self.missing
    }

    pub fn missing_mut(&mut self) -> &mut MissingImpls {
        &mut self.missing
    }

    pub fn take_missing(&mut self) -> MissingImpls {
        std::mem::take(&mut self.missing)
    }

    /// Every file produced so far, written or already up to date.
    pub fn generated(&self) -> &[PathBuf] {
        &self.generated
    }

    /// Number of files whose bytes actually changed on disk.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "ang::emit", "{}", message);
        self.warnings.push(message);
    }

    pub fn root_path(&self, root: Root) -> &Path {
        match root {
            Root::Backend => &self.roots.backend,
            Root::Frontend => &self.roots.frontend,
            Root::FrontendAdmin => &self.roots.frontend_admin,
        }
    }

    // ── Rendering ────────────────────────────────────────────────────

    /// Render template `name` against `ctx`. The target's main context is
    /// available to every template as `app`.
    pub fn render(&mut self, name: &str, ctx: &Value) -> Result<String, CodegenError> {
        if !self.templates.contains_key(name) {
            let bytes = self.resolver.resolve(name)?;
            let source = String::from_utf8(bytes).map_err(|_| TemplateError::Encoding {
                name: name.to_string(),
            })?;
            let parsed = Template::parse(name, &source)?;
            self.templates.insert(name.to_string(), parsed);
        }
        let mut scope = match ctx {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                let mut m = serde_json::Map::new();
                m.insert("value".to_string(), other.clone());
                m
            }
        };
        scope
            .entry("app".to_string())
            .or_insert_with(|| self.main.to_value());
        let template = self.templates.get(name).ok_or_else(|| TemplateError::NotFound {
            name: name.to_string(),
        })?;
        Ok(template.render(&Value::Object(scope))?)
    }

    /// Render `template` and write the result to `rel` under `root`, Go
    /// sources passing through the formatter first.
    pub fn emit(&mut self, root: Root, rel: &str, template: &str, ctx: &Value) -> Result<(), CodegenError> {
        let rendered = self.render(template, ctx)?;
        let bytes = if rel.ends_with(".go") {
            self.format_go(rel, rendered.into_bytes())
        } else {
            rendered.into_bytes()
        };
        self.write(root, rel, &bytes)
    }

    fn format_go(&mut self, rel: &str, raw: Vec<u8>) -> Vec<u8> {
        match self.formatter.format_go(&raw) {
            Ok(formatted) => formatted,
            Err(FormatError::Unavailable(tool)) => {
                if !self.formatter_missing {
                    self.formatter_missing = true;
                    self.warn(format!("{} is not installed; Go sources are written unformatted", tool));
                } else {
                    tracing::debug!(file = rel, tool = %tool, "formatter unavailable; writing raw source");
                }
                raw
            }
            Err(FormatError::Failed(msg)) => {
                self.warn(format!("gofmt {}: {}; wrote unformatted source", rel, msg));
                raw
            }
        }
    }

    // ── Writing ──────────────────────────────────────────────────────

    /// Write `bytes` to `rel` under `root`.
    pub fn write(&mut self, root: Root, rel: &str, bytes: &[u8]) -> Result<(), CodegenError> {
        let rel_path = Path::new(rel);
        if rel_path.is_absolute()
            || rel_path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(CodegenError::OutsideRoot {
                path: rel_path.to_path_buf(),
            });
        }
        let path = self.root_path(root).join(rel_path);
        self.write_path(&path, bytes)
    }

    /// Write to an absolute or cwd-relative path that must fall inside one
    /// of the roots.
    pub fn write_path(&mut self, path: &Path, bytes: &[u8]) -> Result<(), CodegenError> {
        let normalized = normalize(path);
        let inside = [
            &self.roots.backend,
            &self.roots.frontend,
            &self.roots.frontend_admin,
        ]
        .into_iter()
        .chain(self.extra_roots.iter())
        .any(|root| normalized.starts_with(normalize(root)));
        if !inside {
            return Err(CodegenError::OutsideRoot {
                path: path.to_path_buf(),
            });
        }
        let unchanged = std::fs::read(path).map(|old| old == bytes).unwrap_or(false);
        if !unchanged {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| CodegenError::Write {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            std::fs::write(path, bytes).map_err(|e| CodegenError::Write {
                path: path.to_path_buf(),
                source: e,
            })?;
            self.written += 1;
        }
        if !self.generated.iter().any(|p| p == path) {
            self.generated.push(path.to_path_buf());
        }
        Ok(())
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::capability::{Capability, CapabilitySet, Profile};
    use crate::template::BuiltinTemplates;

    pub fn go_caps() -> CapabilitySet {
        CapabilitySet::new(
            Profile::GoLegacy,
            [
                Capability::Http,
                Capability::Sql,
                Capability::Auth,
                Capability::Openapi,
                Capability::Manifest,
            ],
        )
    }

    pub fn roots(dir: &Path) -> OutputRoots {
        OutputRoots {
            backend: dir.join("backend"),
            frontend: dir.join("frontend"),
            frontend_admin: dir.join("frontend/admin"),
        }
    }

    pub static BUILTIN: BuiltinTemplates = BuiltinTemplates;
    pub static NOFMT: NoFormat = NoFormat;

    pub fn emitter<'a>(schema: &'a Schema, dir: &Path) -> Emitter<'a> {
        let main = MainContext::new(schema, "api", "chi", &go_caps());
        Emitter::new(schema, main, roots(dir), &BUILTIN, &NOFMT)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn writes_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Schema::default();
        let mut em = emitter(&schema, dir.path());
        em.write(Root::Backend, "a/b.txt", b"hello").unwrap();
        em.write(Root::Backend, "a/b.txt", b"hello").unwrap();
        assert_eq!(em.written(), 1);
        assert_eq!(em.generated().len(), 1);
        em.write(Root::Backend, "a/b.txt", b"changed").unwrap();
        assert_eq!(em.written(), 2);
        let on_disk = std::fs::read_to_string(dir.path().join("backend/a/b.txt")).unwrap();
        assert_eq!(on_disk, "changed");
    }

    #[test]
    fn escaping_paths_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Schema::default();
        let mut em = emitter(&schema, dir.path());
        let err = em.write(Root::Backend, "../outside.txt", b"x").unwrap_err();
        assert!(matches!(err, CodegenError::OutsideRoot { .. }));
        let err = em
            .write_path(&dir.path().join("elsewhere/file.txt"), b"x")
            .unwrap_err();
        assert!(matches!(err, CodegenError::OutsideRoot { .. }));
        em.allow_root(dir.path().join("elsewhere"));
        em.write_path(&dir.path().join("elsewhere/file.txt"), b"x").unwrap();
    }

    #[test]
    fn main_context_is_visible_as_app() {
        let dir = tempfile::tempdir().unwrap();
        let mut schema = Schema::default();
        schema.project.name = "shop".into();
        schema.project.module = "example.com/shop".into();
        let mut em = emitter(&schema, dir.path());
        let out = em.render("go/logger.go.tmpl", &Value::Null).unwrap();
        assert!(out.starts_with("package logger"));
        assert_eq!(em.main().module, "example.com/shop");
    }

    struct Missing;

    impl SourceFormatter for Missing {
        fn format_go(&self, _src: &[u8]) -> Result<Vec<u8>, FormatError> {
            Err(FormatError::Unavailable("gofmt".into()))
        }
    }

    #[test]
    fn missing_formatter_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Schema::default();
        let main = MainContext::new(&schema, "api", "chi", &go_caps());
        let mut em = Emitter::new(&schema, main, roots(dir.path()), &BUILTIN, &Missing);
        em.emit(Root::Backend, "internal/logger/logger.go", "go/logger.go.tmpl", &Value::Null)
            .unwrap();
        em.emit(Root::Backend, "internal/logger/copy.go", "go/logger.go.tmpl", &Value::Null)
            .unwrap();
        assert_eq!(em.warnings().len(), 1);
        assert_eq!(em.warnings()[0], "gofmt is not installed; Go sources are written unformatted");
        let raw = std::fs::read_to_string(dir.path().join("backend/internal/logger/logger.go")).unwrap();
        assert!(raw.starts_with("package logger"));
    }
}
