//! FastAPI backend and the Python client SDK.

use serde_json::{json, Value};

use ang_ir::TypeRef;

use super::{Emitter, Root};
use crate::context::{entity_ctx, field_ctx, py_type, service_ctx, snake};
use crate::error::CodegenError;

fn py_literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(Value::String(s.clone()).to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("True".into()),
        Value::Bool(false) => Some("False".into()),
        _ => None,
    }
}

impl Emitter<'_> {
    /// `app/config.py` with one settings field per config entry.
    pub fn emit_python_config(&mut self) -> Result<(), CodegenError> {
        let fields: Vec<Value> = self
            .schema()
            .config
            .fields
            .iter()
            .map(|f| {
                json!({
                    "column": snake(&f.name),
                    "py_type": if matches!(f.ty, TypeRef::Entity { .. }) { "str".to_string() } else { py_type(&f.ty) },
                    "default": f.default.as_ref().and_then(py_literal),
                })
            })
            .collect();
        self.emit(
            Root::Backend,
            "app/config.py",
            "python/config.py.tmpl",
            &json!({ "fields": fields }),
        )
    }

    pub fn emit_python_rbac(&mut self) -> Result<(), CodegenError> {
        let roles: Vec<Value> = self
            .schema()
            .rbac
            .iter()
            .flat_map(|r| r.roles.iter())
            .map(|(name, perms)| json!({"name": name, "permissions": perms}))
            .collect();
        self.emit(
            Root::Backend,
            "app/rbac.py",
            "python/rbac.py.tmpl",
            &json!({ "roles": roles }),
        )
    }

    /// Application package: entry point, models, security and one router
    /// per service.
    pub fn emit_python_backend(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        self.write(Root::Backend, "app/__init__.py", b"")?;
        self.write(Root::Backend, "app/routers/__init__.py", b"")?;
        let services: Vec<Value> = schema
            .services
            .iter()
            .map(|s| json!({"snake": snake(&s.name)}))
            .collect();
        self.emit(
            Root::Backend,
            "app/main.py",
            "python/main.py.tmpl",
            &json!({ "services": services }),
        )?;
        let entities: Vec<Value> = schema
            .entities
            .iter()
            .map(|e| {
                let mut ctx = entity_ctx(e);
                ctx["fields"] = Value::Array(e.fields.iter().map(field_ctx).collect());
                ctx
            })
            .collect();
        self.emit(
            Root::Backend,
            "app/models.py",
            "python/models.py.tmpl",
            &json!({ "entities": entities }),
        )?;
        let algorithm = schema
            .auth
            .as_ref()
            .map(|a| a.algorithm.clone())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| "HS256".to_string());
        self.emit(
            Root::Backend,
            "app/security.py",
            "python/security.py.tmpl",
            &json!({ "algorithm": algorithm }),
        )?;
        for svc in &schema.services {
            let ctx = service_ctx(schema, svc, &|_| None);
            let rel = format!("app/routers/{}.py", snake(&svc.name));
            self.emit(Root::Backend, &rel, "python/router.py.tmpl", &ctx)?;
        }
        self.emit(
            Root::Backend,
            "requirements.txt",
            "python/requirements.txt.tmpl",
            &Value::Null,
        )
    }

    /// `sdk/python/ang_sdk`: a synchronous client with one method per
    /// HTTP endpoint.
    pub fn emit_python_sdk(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        let services: Vec<Value> = schema
            .services
            .iter()
            .map(|s| service_ctx(schema, s, &|_| None))
            .collect();
        self.emit(
            Root::Backend,
            "sdk/python/ang_sdk/client.py",
            "python/sdk_client.py.tmpl",
            &json!({ "services": services }),
        )?;
        self.emit(
            Root::Backend,
            "sdk/python/ang_sdk/__init__.py",
            "python/sdk_init.py.tmpl",
            &Value::Null,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use ang_ir::{Endpoint, EndpointAuth, Method, Schema, Service};

    fn schema() -> Schema {
        let mut s = Schema::default();
        s.project.version = "1.2.0".into();
        s.services = vec![Service {
            name: "Orders".into(),
            methods: vec![Method {
                name: "CancelOrder".into(),
                ..Method::default()
            }],
            ..Service::default()
        }];
        s.endpoints = vec![Endpoint {
            method: "DELETE".into(),
            path: "/orders/{id}".into(),
            service: "Orders".into(),
            rpc: "CancelOrder".into(),
            auth: EndpointAuth {
                kind: "jwt".into(),
                ..EndpointAuth::default()
            },
            path_params: vec!["id".into()],
            ..Endpoint::default()
        }];
        s
    }

    #[test]
    fn routers_check_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let schema = schema();
        let mut em = emitter(&schema, dir.path());
        em.emit_python_backend().unwrap();
        let router = std::fs::read_to_string(dir.path().join("backend/app/routers/orders.py")).unwrap();
        assert!(router.contains("@router.delete(\"/orders/{id}\")"));
        assert!(router.contains("def cancel_order(id: str, user=Depends(current_user), ):"));
        assert!(router.contains("require(user, \"orders.cancelorder\")"));
        let main = std::fs::read_to_string(dir.path().join("backend/app/main.py")).unwrap();
        assert!(main.contains("app.include_router(orders.router)"));
    }

    #[test]
    fn sdk_formats_path_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let schema = schema();
        let mut em = emitter(&schema, dir.path());
        em.emit_python_sdk().unwrap();
        let client = std::fs::read_to_string(dir.path().join("backend/sdk/python/ang_sdk/client.py")).unwrap();
        assert!(client.contains("def orders_cancel_order(self, req: dict[str, Any]) -> Any:"));
        assert!(client.contains("return self._call(\"DELETE\", f\"/orders/{req['id']}\")"));
        let init = std::fs::read_to_string(dir.path().join("backend/sdk/python/ang_sdk/__init__.py")).unwrap();
        assert!(init.contains("__version__ = \"1.2.0\""));
    }
}
