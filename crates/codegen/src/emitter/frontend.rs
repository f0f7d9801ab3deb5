//! TypeScript SDK, React components, admin pages and test stubs, plus
//! the post-generation hooks that copy them into application trees.

use std::path::{Path, PathBuf};

use heck::ToKebabCase;
use serde_json::{json, Value};
use walkdir::WalkDir;

use ang_ir::Entity;

use super::{Emitter, Root};
use crate::context::{camel, entity_ctx, service_ctx, snake};
use crate::error::CodegenError;

fn ui_entities(entities: &[Entity]) -> Vec<&Entity> {
    entities
        .iter()
        .filter(|e| e.is_persisted() && !e.dto_only)
        .collect()
}

impl Emitter<'_> {
    /// `sdk/client.ts`, `sdk/types.ts`, one module per service and an
    /// index re-exporting them.
    pub fn emit_frontend_sdk(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        self.emit(Root::Frontend, "sdk/client.ts", "ts/client.ts.tmpl", &Value::Null)?;
        let entities: Vec<Value> = schema.entities.iter().map(entity_ctx).collect();
        self.emit(
            Root::Frontend,
            "sdk/types.ts",
            "ts/types.ts.tmpl",
            &json!({ "entities": entities }),
        )?;
        let mut index = Vec::new();
        for svc in &schema.services {
            let mut types: Vec<&str> = Vec::new();
            for m in &svc.methods {
                let routed = schema
                    .endpoint_for(&svc.name, &m.name)
                    .is_some_and(|ep| !ep.is_ws());
                if !routed {
                    continue;
                }
                for t in [m.input.as_deref(), m.output.as_deref()].into_iter().flatten() {
                    if !types.contains(&t) {
                        types.push(t);
                    }
                }
            }
            types.sort();
            let mut ctx = service_ctx(schema, svc, &|_| None);
            ctx["type_imports"] = Value::String(types.join(", "));
            let kebab = svc.name.to_kebab_case();
            self.emit(Root::Frontend, &format!("sdk/{}.ts", kebab), "ts/service.ts.tmpl", &ctx)?;
            index.push(json!({"camel": camel(&svc.name), "kebab": kebab}));
        }
        self.emit(
            Root::Frontend,
            "sdk/index.ts",
            "ts/index.ts.tmpl",
            &json!({ "services": index }),
        )
    }

    pub fn emit_frontend_components(&mut self) -> Result<(), CodegenError> {
        for e in ui_entities(&self.schema().entities) {
            let rel = format!("components/{}Form.tsx", e.name);
            self.emit(Root::Frontend, &rel, "ts/form.tsx.tmpl", &entity_ctx(e))?;
        }
        Ok(())
    }

    pub fn emit_frontend_admin(&mut self) -> Result<(), CodegenError> {
        let entities = ui_entities(&self.schema().entities);
        for e in &entities {
            let rel = format!("{}AdminPage.tsx", e.name);
            self.emit(Root::FrontendAdmin, &rel, "ts/admin_page.tsx.tmpl", &entity_ctx(e))?;
        }
        let ctx = json!({ "entities": entities.iter().map(|e| entity_ctx(e)).collect::<Vec<_>>() });
        self.emit(Root::FrontendAdmin, "index.tsx", "ts/admin_index.tsx.tmpl", &ctx)
    }

    /// Vitest stubs, one file per service with HTTP endpoints.
    pub fn emit_test_stubs(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        for svc in &schema.services {
            let endpoints: Vec<Value> = schema
                .endpoints
                .iter()
                .filter(|ep| ep.service == svc.name && !ep.is_ws())
                .map(|ep| {
                    json!({
                        "verb": ep.method.to_ascii_uppercase(),
                        "path": ep.path,
                        "service": ep.service,
                        "rpc": ep.rpc,
                        "protected": ep.auth.is_protected(),
                    })
                })
                .collect();
            if endpoints.is_empty() {
                continue;
            }
            let rel = format!("tests/generated/{}.test.ts", snake(&svc.name));
            self.emit(
                Root::Frontend,
                &rel,
                "ts/test_stub.test.ts.tmpl",
                &json!({ "endpoints": endpoints }),
            )?;
        }
        Ok(())
    }

    // ── Post-generation hooks ────────────────────────────────────────

    /// Replace `<app_dir>/<frontend dir name>` with a copy of the frontend
    /// root. No-op in dry-run.
    pub fn copy_frontend_sdk(&mut self, app_dir: &Path) -> Result<(), CodegenError> {
        if self.is_dry_run() {
            return Ok(());
        }
        let src = self.roots().frontend.clone();
        let name = src.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("sdk"));
        let dest = app_dir.join(name);
        if dest.exists() {
            std::fs::remove_dir_all(&dest).map_err(|e| CodegenError::Write {
                path: dest.clone(),
                source: e,
            })?;
        }
        self.allow_root(dest.clone());
        let admin = self.roots().frontend_admin.clone();
        self.copy_tree(&src, &dest, Some(&admin))
    }

    /// Copy the admin root into `app_dir`, leaving other files there alone.
    pub fn copy_frontend_admin(&mut self, app_dir: &Path) -> Result<(), CodegenError> {
        if self.is_dry_run() {
            return Ok(());
        }
        let src = self.roots().frontend_admin.clone();
        self.allow_root(app_dir.to_path_buf());
        self.copy_tree(&src, app_dir, None)
    }

    /// Write `.env.example` for the frontend app unless one already exists.
    pub fn write_env_example(&mut self, app_dir: &Path, env_path: Option<&Path>) -> Result<(), CodegenError> {
        if self.is_dry_run() {
            return Ok(());
        }
        let path = env_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| app_dir.join(".env.example"));
        if path.exists() {
            tracing::debug!(path = %path.display(), "env example exists; leaving it");
            return Ok(());
        }
        let body = self.render("ts/env.example.tmpl", &Value::Null)?;
        if let Some(parent) = path.parent() {
            self.allow_root(parent.to_path_buf());
        }
        self.write_path(&path, body.as_bytes())
    }

    fn copy_tree(&mut self, src: &Path, dest: &Path, skip: Option<&Path>) -> Result<(), CodegenError> {
        if !src.is_dir() {
            return Ok(());
        }
        for entry in WalkDir::new(src).sort_by_file_name() {
            let entry = entry.map_err(|e| CodegenError::Read {
                path: src.to_path_buf(),
                source: e.into(),
            })?;
            let path = entry.path();
            if skip.is_some_and(|s| path.starts_with(s)) || !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = path.strip_prefix(src) else {
                continue;
            };
            let bytes = std::fs::read(path).map_err(|e| CodegenError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
            self.write_path(&dest.join(rel), &bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use ang_ir::{Endpoint, EndpointAuth, Entity, Field, Method, Schema, Service, TypeRef};

    fn schema() -> Schema {
        let mut s = Schema::default();
        s.entities = vec![
            Entity {
                name: "Order".into(),
                fields: vec![Field::new("id", TypeRef::String), Field::new("total", TypeRef::Float64)],
                ..Entity::default()
            },
            Entity {
                name: "GetOrderRequest".into(),
                fields: vec![Field::new("id", TypeRef::String)],
                ..Entity::default()
            },
        ];
        s.services = vec![Service {
            name: "OrderBook".into(),
            methods: vec![Method {
                name: "GetOrder".into(),
                input: Some("GetOrderRequest".into()),
                output: Some("Order".into()),
                ..Method::default()
            }],
            ..Service::default()
        }];
        s.endpoints = vec![Endpoint {
            method: "GET".into(),
            path: "/orders/{id}".into(),
            service: "OrderBook".into(),
            rpc: "GetOrder".into(),
            auth: EndpointAuth::none(),
            path_params: vec!["id".into()],
            ..Endpoint::default()
        }];
        s
    }

    #[test]
    fn sdk_module_per_service() {
        let dir = tempfile::tempdir().unwrap();
        let schema = schema();
        let mut em = emitter(&schema, dir.path());
        em.emit_frontend_sdk().unwrap();
        let sdk = dir.path().join("frontend/sdk");
        let svc = std::fs::read_to_string(sdk.join("order-book.ts")).unwrap();
        assert!(svc.contains("import type { GetOrderRequest, Order } from \"./types\";"));
        assert!(svc.contains("export function getOrder(req: GetOrderRequest): Promise<Order> {"));
        let index = std::fs::read_to_string(sdk.join("index.ts")).unwrap();
        assert!(index.contains("export * as orderBook from \"./order-book\";"));
        let types = std::fs::read_to_string(sdk.join("types.ts")).unwrap();
        assert!(types.contains("export interface Order {"));
    }

    #[test]
    fn admin_pages_only_for_persisted_entities() {
        let dir = tempfile::tempdir().unwrap();
        let schema = schema();
        let mut em = emitter(&schema, dir.path());
        em.emit_frontend_admin().unwrap();
        let admin = dir.path().join("frontend/admin");
        assert!(admin.join("OrderAdminPage.tsx").exists());
        assert!(!admin.join("GetOrderRequestAdminPage.tsx").exists());
    }

    #[test]
    fn sdk_copy_excludes_admin_and_keeps_existing_env() {
        let dir = tempfile::tempdir().unwrap();
        let schema = schema();
        let mut em = emitter(&schema, dir.path());
        em.emit_frontend_sdk().unwrap();
        em.emit_frontend_admin().unwrap();
        let app = dir.path().join("app");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join(".env.example"), "KEEP=1\n").unwrap();
        em.copy_frontend_sdk(&app).unwrap();
        em.write_env_example(&app, None).unwrap();
        assert!(app.join("frontend/sdk/client.ts").exists());
        assert!(!app.join("frontend/admin").exists());
        assert_eq!(std::fs::read_to_string(app.join(".env.example")).unwrap(), "KEEP=1\n");
    }
}
