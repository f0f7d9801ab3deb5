//! Go backend families.
//!
//! Every family renders one or more files under the backend root. Import
//! lists are computed here from what the rendered code references, since
//! an unused import does not compile.

use std::collections::BTreeSet;

use heck::ToShoutySnakeCase;
use serde_json::{json, Value};

use ang_ir::flow::walk_steps;
use ang_ir::{Entity, FlowAction, Service, TypeRef};

use super::flow::{flow_deps, go_duration, translate_method, FlowDeps};
use super::sql::repo_ctx;
use super::{Emitter, Root};
use crate::context::{camel, entity_ctx, field_ctx, go_name, go_string_slice, service_ctx, snake};
use crate::error::CodegenError;

/// One constructor dependency: struct field, Go type and the expression
/// the container passes for it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Dep {
    field: String,
    ty: String,
    arg: String,
}

fn dep(field: impl Into<String>, ty: impl Into<String>, arg: impl Into<String>) -> Dep {
    Dep {
        field: field.into(),
        ty: ty.into(),
        arg: arg.into(),
    }
}

fn deps_value(deps: &[Dep]) -> Value {
    Value::Array(
        deps.iter()
            .map(|d| json!({"field": d.field, "ty": d.ty, "arg": d.arg}))
            .collect(),
    )
}

fn imports(module: &str, std: &[&str], internal: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = std.iter().map(|s| s.to_string()).collect();
    out.sort();
    out.extend(internal.iter().map(|p| format!("{}/{}", module, p)));
    out
}

fn needs_time(fields: &[ang_ir::Field]) -> bool {
    fn walk(t: &TypeRef, want: &dyn Fn(&TypeRef) -> bool) -> bool {
        want(t)
            || match t {
                TypeRef::Array { item } => walk(item, want),
                TypeRef::Map { key, value } => walk(key, want) || walk(value, want),
                _ => false,
            }
    }
    fields.iter().any(|f| walk(&f.ty, &|t| matches!(t, TypeRef::Time)))
}

fn needs_json(fields: &[ang_ir::Field]) -> bool {
    fields.iter().any(|f| matches!(f.ty, TypeRef::Json))
}

fn domain_imports(entities: &[&Entity], fsm: bool) -> Vec<String> {
    let mut out = Vec::new();
    if entities.iter().any(|e| needs_json(&e.fields)) {
        out.push("encoding/json".to_string());
    }
    if fsm {
        out.push("fmt".to_string());
    }
    if entities.iter().any(|e| needs_time(&e.fields)) {
        out.push("time".to_string());
    }
    out
}

/// Services called through `logic.Call`, other than `svc` itself.
fn called_services(svc: &Service) -> Vec<String> {
    let mut out: Vec<String> = svc.uses.clone();
    for m in &svc.methods {
        walk_steps(&m.flow, &mut |step| {
            if step.action != FlowAction::LogicCall {
                return;
            }
            let target = step.arg_str("method").or_else(|| step.arg_str("call"));
            if let Some((other, _)) = target.and_then(|t| t.split_once('.')) {
                if other != svc.name && !out.iter().any(|o| o == other) {
                    out.push(other.to_string());
                }
            }
        });
    }
    out
}

fn repo_sources(svc: &Service) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in &svc.methods {
        walk_steps(&m.flow, &mut |step| {
            if step.action.is_repo() {
                if let Some(src) = step.arg_str("source") {
                    if !out.iter().any(|r| r == src) {
                        out.push(src.to_string());
                    }
                }
            }
        });
    }
    out
}

fn service_deps(svc: &Service) -> Vec<Dep> {
    let mut deps: Vec<Dep> = repo_sources(svc)
        .iter()
        .map(|r| {
            dep(
                format!("{}Repo", camel(r)),
                format!("port.{}Repository", r),
                format!("d.{}Repository", r),
            )
        })
        .collect();
    for other in called_services(svc) {
        deps.push(dep(camel(&other), format!("port.{}Service", other), format!("c.{}", other)));
    }
    let FlowDeps {
        tx,
        publisher,
        cache,
        limiter,
        storage,
        mailer,
    } = flow_deps(svc);
    let infra = [
        (tx, "tx", "port.TxManager", "d.Tx"),
        (publisher, "publisher", "port.Publisher", "d.Publisher"),
        (cache, "cache", "port.Cache", "d.Cache"),
        (limiter, "limiter", "port.RateLimiter", "d.Limiter"),
        (storage, "storage", "port.FileStorage", "d.Storage"),
        (mailer, "mailer", "port.Mailer", "d.Mailer"),
    ];
    for (used, field, ty, arg) in infra {
        if used {
            deps.push(dep(field, ty, arg));
        }
    }
    deps
}

/// Services ordered so every `uses` target is constructed first. Cycles
/// keep declaration order.
fn wiring_order(services: &[Service]) -> Vec<&Service> {
    let mut done: Vec<&str> = Vec::new();
    let mut out: Vec<&Service> = Vec::new();
    fn visit<'s>(
        svc: &'s Service,
        all: &'s [Service],
        stack: &mut Vec<&'s str>,
        done: &mut Vec<&'s str>,
        out: &mut Vec<&'s Service>,
    ) {
        if done.contains(&svc.name.as_str()) || stack.contains(&svc.name.as_str()) {
            return;
        }
        stack.push(&svc.name);
        for other in called_services(svc) {
            if let Some(next) = all.iter().find(|s| s.name == other) {
                visit(next, all, stack, done, out);
            }
        }
        stack.pop();
        done.push(&svc.name);
        out.push(svc);
    }
    let mut stack = Vec::new();
    for svc in services {
        visit(svc, services, &mut stack, &mut done, &mut out);
    }
    out
}

fn has_cached_output(svc: &Service) -> bool {
    svc.methods.iter().any(|m| m.cache.is_some() && m.output.is_some())
}

impl<'a> Emitter<'a> {
    fn module(&self) -> String {
        self.main().module.clone()
    }

    fn wraps_cache(&self, svc: &Service) -> bool {
        self.main().has_cache && has_cached_output(svc)
    }

    // ── Foundation ───────────────────────────────────────────────────

    pub fn emit_go_config(&mut self) -> Result<(), CodegenError> {
        let fields: Vec<Value> = self
            .schema()
            .config
            .fields
            .iter()
            .map(|f| {
                let (go_ty, loader, zero) = match f.ty {
                    TypeRef::Int32 | TypeRef::Int64 => ("int64", "getenvInt", "0"),
                    TypeRef::Float32 | TypeRef::Float64 => ("float64", "getenvFloat", "0"),
                    TypeRef::Bool => ("bool", "getenvBool", "false"),
                    _ => ("string", "getenv", "\"\""),
                };
                let default_lit = match (&f.default, go_ty) {
                    (Some(Value::String(s)), "string") => Value::String(s.clone()).to_string(),
                    (Some(Value::Number(n)), "int64" | "float64") => n.to_string(),
                    (Some(Value::Bool(b)), "bool") => b.to_string(),
                    _ => zero.to_string(),
                };
                let base = field_ctx(f);
                json!({
                    "go_name": base["go_name"],
                    "env": base["env"],
                    "go_type": go_ty,
                    "loader": loader,
                    "default_lit": default_lit,
                })
            })
            .collect();
        self.emit(
            Root::Backend,
            "internal/config/config.go",
            "go/config.go.tmpl",
            &json!({ "fields": fields }),
        )
    }

    pub fn emit_go_logger(&mut self) -> Result<(), CodegenError> {
        self.emit(
            Root::Backend,
            "internal/pkg/logger/logger.go",
            "go/logger.go.tmpl",
            &Value::Null,
        )
    }

    pub fn emit_go_rbac(&mut self) -> Result<(), CodegenError> {
        let (roles, rules) = match &self.schema().rbac {
            Some(rbac) => (
                rbac.roles
                    .iter()
                    .map(|(name, perms)| json!({"name": name, "permissions_go": go_string_slice(perms)}))
                    .collect::<Vec<_>>(),
                rbac.permissions
                    .iter()
                    .map(|(name, rule)| json!({"name": name, "rule": rule}))
                    .collect::<Vec<_>>(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        self.emit(
            Root::Backend,
            "internal/pkg/rbac/rbac.go",
            "go/rbac.go.tmpl",
            &json!({"roles": roles, "rules": rules}),
        )
    }

    pub fn emit_go_errors(&mut self) -> Result<(), CodegenError> {
        let errors: Vec<Value> = self
            .schema()
            .errors
            .iter()
            .map(|e| {
                let name = go_name(&e.name);
                let go_name = if name.starts_with("Err") {
                    name
                } else {
                    format!("Err{}", name)
                };
                json!({
                    "go_name": go_name,
                    "status": if e.http_status == 0 { 500 } else { e.http_status },
                    "code": e.name.to_shouty_snake_case(),
                    "message": e.message,
                })
            })
            .collect();
        self.emit(
            Root::Backend,
            "internal/pkg/apperr/errors.go",
            "go/errors.go.tmpl",
            &json!({ "errors": errors }),
        )
    }

    pub fn emit_go_tracing(&mut self) -> Result<(), CodegenError> {
        self.emit(
            Root::Backend,
            "internal/pkg/tracing/tracing.go",
            "go/tracing.go.tmpl",
            &Value::Null,
        )
    }

    // ── Domain ───────────────────────────────────────────────────────

    /// One file per domain entity; messages and DTO-only shapes go to
    /// `dto.go`.
    pub fn emit_go_domain(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        for e in schema.entities.iter().filter(|e| !e.is_message() && !e.dto_only) {
            let mut ctx = entity_ctx(e);
            ctx["imports"] = json!(domain_imports(&[e], e.fsm.is_some()));
            let rel = format!("internal/domain/{}.go", snake(&e.name));
            self.emit(Root::Backend, &rel, "go/entity.go.tmpl", &ctx)?;
        }
        Ok(())
    }

    pub fn emit_go_dtos(&mut self) -> Result<(), CodegenError> {
        let dtos: Vec<&Entity> = self
            .schema()
            .entities
            .iter()
            .filter(|e| e.is_message() || e.dto_only)
            .collect();
        let ctx = json!({
            "imports": domain_imports(&dtos, false),
            "entities": dtos.iter().map(|e| entity_ctx(e)).collect::<Vec<_>>(),
        });
        self.emit(Root::Backend, "internal/domain/dto.go", "go/dto.go.tmpl", &ctx)
    }

    pub fn emit_go_events(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        let events: Vec<Value> = schema
            .events
            .iter()
            .map(|ev| {
                json!({
                    "name": ev.name,
                    "subject": ev.name,
                    "fields": ev.fields.iter().map(field_ctx).collect::<Vec<_>>(),
                })
            })
            .collect();
        let fields: Vec<ang_ir::Field> = schema.events.iter().flat_map(|e| e.fields.clone()).collect();
        let mut std = Vec::new();
        if needs_json(&fields) {
            std.push("encoding/json");
        }
        if needs_time(&fields) {
            std.push("time");
        }
        let ctx = json!({"imports": std, "events": events});
        self.emit(Root::Backend, "internal/domain/events.go", "go/events.go.tmpl", &ctx)
    }

    pub fn emit_go_views(&mut self) -> Result<(), CodegenError> {
        let views: Vec<Value> = self
            .schema()
            .views
            .iter()
            .map(|v| {
                json!({
                    "name": v.name,
                    "roles": v.roles.iter().map(|(role, fields)| json!({"role": role, "fields_go": go_string_slice(fields)})).collect::<Vec<_>>(),
                })
            })
            .collect();
        self.emit(
            Root::Backend,
            "internal/views/views.go",
            "go/views.go.tmpl",
            &json!({ "views": views }),
        )
    }

    // ── Ports ────────────────────────────────────────────────────────

    pub fn emit_go_service_ports(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        let module = self.module();
        for svc in &schema.services {
            let mut ctx = service_ctx(schema, svc, &|_| None);
            let mut std = Vec::new();
            if !svc.methods.is_empty() {
                std.push("context");
            }
            let uses_domain = svc.methods.iter().any(|m| m.input.is_some() || m.output.is_some());
            let internal: &[&str] = if uses_domain { &["internal/domain"] } else { &[] };
            ctx["imports"] = json!(imports(&module, &std, internal));
            let rel = format!("internal/port/{}.go", snake(&svc.name));
            self.emit(Root::Backend, &rel, "go/service_port.go.tmpl", &ctx)?;
        }
        Ok(())
    }

    pub fn emit_go_repository_ports(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        let repos: Vec<Value> = schema
            .persisted_entities()
            .map(|e| repo_ctx(e, schema.repo_for(&e.name)))
            .collect();
        self.emit(
            Root::Backend,
            "internal/port/repository.go",
            "go/repository_port.go.tmpl",
            &json!({ "repos": repos }),
        )
    }

    pub fn emit_go_publisher_port(&mut self) -> Result<(), CodegenError> {
        self.emit(Root::Backend, "internal/port/publisher.go", "go/publisher.go.tmpl", &Value::Null)
    }

    pub fn emit_go_mailer_port(&mut self) -> Result<(), CodegenError> {
        self.emit(Root::Backend, "internal/port/mailer.go", "go/mailer_port.go.tmpl", &Value::Null)
    }

    // ── Services ─────────────────────────────────────────────────────

    /// Service implementations with bodies translated from flows.
    /// Untranslatable actions are recorded as missing implementations.
    pub fn emit_go_service_impls(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        let module = self.module();
        for svc in &schema.services {
            let mut bodies = Vec::new();
            for m in &svc.methods {
                let body = translate_method(schema, svc, m);
                for (action, loc) in &body.missing {
                    self.missing_mut().record(&svc.name, &m.name, action, loc);
                }
                bodies.push((m.name.clone(), body.code));
            }
            let all_code: String = bodies.iter().map(|(_, c)| c.as_str()).collect();
            let lookup = |name: &str| bodies.iter().find(|(n, _)| n == name).map(|(_, c)| c.clone());
            let mut ctx = service_ctx(schema, svc, &lookup);
            let deps = service_deps(svc);
            let mut std = Vec::new();
            if !svc.methods.is_empty() {
                std.push("context");
            }
            if all_code.contains("time.") {
                std.push("time");
            }
            let mut internal = Vec::new();
            if all_code.contains("apperr.") {
                internal.push("internal/pkg/apperr");
            }
            if all_code.contains("domain.") || svc.methods.iter().any(|m| m.input.is_some() || m.output.is_some()) {
                internal.push("internal/domain");
            }
            internal.push("internal/port");
            for m in &svc.methods {
                if let Some(imp) = &m.implementation {
                    for extra in &imp.imports {
                        if !std.contains(&extra.as_str()) && !extra.starts_with(&module) {
                            std.push(extra.as_str());
                        }
                    }
                }
            }
            ctx["imports"] = json!(imports(&module, &std, &internal));
            ctx["deps"] = deps_value(&deps);
            let rel = format!("internal/service/{}.go", snake(&svc.name));
            self.emit(Root::Backend, &rel, "go/service_impl.go.tmpl", &ctx)?;
        }
        Ok(())
    }

    pub fn emit_go_cached_services(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        for svc in schema.services.iter().filter(|s| has_cached_output(s)) {
            let ctx = service_ctx(schema, svc, &|_| None);
            let rel = format!("internal/service/{}_cached.go", snake(&svc.name));
            self.emit(Root::Backend, &rel, "go/cached_service.go.tmpl", &ctx)?;
        }
        Ok(())
    }

    /// Infrastructure fields of `app.Deps` with the expression `main.go`
    /// builds each from.
    fn infra_deps(&self) -> Vec<(Dep, String)> {
        let schema = self.schema();
        let main = self.main();
        let mut needed: BTreeSet<String> = BTreeSet::new();
        let mut repos: Vec<String> = Vec::new();
        for svc in &schema.services {
            for d in service_deps(svc) {
                if let Some(entity) = d.arg.strip_prefix("d.").and_then(|a| a.strip_suffix("Repository")) {
                    if !repos.iter().any(|r| r == entity) {
                        repos.push(entity.to_string());
                    }
                } else if d.arg.starts_with("d.") {
                    needed.insert(d.arg.trim_start_matches("d.").to_string());
                }
            }
            if self.wraps_cache(svc) {
                needed.insert("Cache".to_string());
            }
        }
        let mut out = Vec::new();
        for entity in repos {
            let expr = match schema.entity(&entity).and_then(|e| main.store_for(e)) {
                Some("sql") => format!("postgres.New{}Repository(db)", entity),
                Some("mongo") => format!("mongorepo.New{}Repository(mdb)", entity),
                _ => "nil".to_string(),
            };
            out.push((
                dep(
                    format!("{}Repository", entity),
                    format!("port.{}Repository", entity),
                    "",
                ),
                expr,
            ));
        }
        let infra: [(&str, &str, String); 6] = [
            (
                "Tx",
                "port.TxManager",
                if main.has_sql { "postgres.NewTxManager(db)" } else { "app.NopTx{}" }.to_string(),
            ),
            (
                "Publisher",
                "port.Publisher",
                if main.has_events { "bus" } else { "app.LogPublisher{Log: log}" }.to_string(),
            ),
            (
                "Cache",
                "port.Cache",
                if main.has_cache { "cache.NewRedis(rdb)" } else { "app.NopCache{}" }.to_string(),
            ),
            (
                "Limiter",
                "port.RateLimiter",
                if main.has_cache { "cache.NewLimiter(rdb, 120)" } else { "app.AllowAll{}" }.to_string(),
            ),
            (
                "Storage",
                "port.FileStorage",
                "app.LocalStorage{Dir: \"uploads\"}".to_string(),
            ),
            (
                "Mailer",
                "port.Mailer",
                if main.has_email {
                    "mailer.NewSMTP(cfg.SMTPAddr, cfg.SMTPFrom, nil)"
                } else {
                    "app.LogMailer{Log: log}"
                }
                .to_string(),
            ),
        ];
        for (field, ty, expr) in infra {
            if needed.contains(field) {
                out.push((dep(field, ty, ""), expr));
            }
        }
        out
    }

    pub fn emit_go_container(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        let module = self.module();
        let services: Vec<Value> = wiring_order(&schema.services)
            .into_iter()
            .map(|svc| {
                let args: Vec<String> = service_deps(svc).into_iter().map(|d| d.arg).collect();
                json!({
                    "name": svc.name,
                    "args": args.join(", "),
                    "cached": self.wraps_cache(svc),
                })
            })
            .collect();
        let deps: Vec<Dep> = self.infra_deps().into_iter().map(|(d, _)| d).collect();
        let mut internal = vec!["internal/port"];
        if !services.is_empty() {
            internal.push("internal/service");
        }
        let ctx = json!({
            "imports": imports(&module, &["context", "log/slog", "os", "path/filepath", "time"], &internal),
            "services": services,
            "deps": deps_value(&deps),
        });
        self.emit(Root::Backend, "internal/app/container.go", "go/container.go.tmpl", &ctx)
    }

    pub fn emit_go_scheduler(&mut self) -> Result<(), CodegenError> {
        let jobs: Vec<Value> = self
            .schema()
            .schedules
            .iter()
            .map(|s| {
                let spec = match (&s.cron, &s.every) {
                    (Some(cron), _) => cron.clone(),
                    (None, Some(every)) => format!("@every {}", every),
                    (None, None) => "@hourly".to_string(),
                };
                json!({"name": s.name, "spec": spec, "service": s.service, "action": s.action})
            })
            .collect();
        self.emit(
            Root::Backend,
            "internal/app/scheduler.go",
            "go/scheduler.go.tmpl",
            &json!({ "jobs": jobs }),
        )
    }

    // ── Transport ────────────────────────────────────────────────────

    fn http_services(&self) -> Vec<&'a Service> {
        let schema = self.schema();
        schema
            .services
            .iter()
            .filter(|svc| {
                schema
                    .endpoints
                    .iter()
                    .any(|ep| ep.service == svc.name && !ep.is_ws() && svc.method(&ep.rpc).is_some())
            })
            .collect()
    }

    /// Handlers per service plus the router mounting them.
    pub fn emit_go_http_handlers(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        let module = self.module();
        let services = self.http_services();
        for svc in services.iter().copied() {
            let mut ctx = service_ctx(schema, svc, &|_| None);
            let routed: Vec<&ang_ir::Method> = svc
                .methods
                .iter()
                .filter(|m| schema.endpoint_for(&svc.name, &m.name).is_some_and(|ep| !ep.is_ws()))
                .collect();
            let decodes = routed.iter().any(|m| {
                m.input.is_some()
                    && schema
                        .endpoint_for(&svc.name, &m.name)
                        .is_some_and(|ep| !matches!(ep.method.to_ascii_uppercase().as_str(), "GET" | "DELETE"))
            });
            let mut std = vec!["net/http"];
            let mut internal = Vec::new();
            if decodes {
                std.push("encoding/json");
                internal.push("internal/pkg/apperr");
            }
            if routed.iter().any(|m| m.input.is_some()) {
                internal.push("internal/domain");
            }
            internal.push("internal/port");
            ctx["imports"] = json!(imports(&module, &std, &internal));
            let rel = format!("internal/transport/http/{}.go", snake(&svc.name));
            self.emit(Root::Backend, &rel, "go/handler.go.tmpl", &ctx)?;
        }

        let handlers: Vec<Value> = services
            .iter()
            .map(|s| json!({"name": s.name, "camel": format!("{}H", camel(&s.name))}))
            .collect();
        let routes: Vec<Value> = schema
            .endpoints
            .iter()
            .filter(|ep| !ep.is_ws() && services.iter().any(|s| s.name == ep.service && s.method(&ep.rpc).is_some()))
            .map(|ep| {
                let verb = ep.method.to_ascii_uppercase();
                json!({
                    "verb": verb,
                    "path": ep.path,
                    "pattern": format!("{} {}", verb, ep.path),
                    "handler": format!("{}H", camel(&ep.service)),
                    "rpc": ep.rpc,
                    "protected": ep.auth.is_protected(),
                    "roles": ep.auth.roles,
                })
            })
            .collect();
        let main = self.main();
        let mut std = vec!["encoding/json", "errors", "log/slog", "net/http"];
        if main.framework == "chi" {
            std.push("github.com/go-chi/chi/v5");
        }
        let mut internal = vec!["internal/app", "internal/pkg/apperr", "internal/transport/http/middleware"];
        if main.has_auth {
            internal.push("internal/pkg/auth");
        }
        let ctx = json!({
            "imports": imports(&module, &std, &internal),
            "handlers": handlers,
            "routes": routes,
        });
        self.emit(Root::Backend, "internal/transport/http/router.go", "go/router.go.tmpl", &ctx)
    }

    pub fn emit_go_health(&mut self) -> Result<(), CodegenError> {
        self.emit(
            Root::Backend,
            "internal/transport/http/health.go",
            "go/health.go.tmpl",
            &Value::Null,
        )
    }

    pub fn emit_go_metrics_middleware(&mut self) -> Result<(), CodegenError> {
        self.emit(
            Root::Backend,
            "internal/transport/http/middleware/metrics.go",
            "go/metrics.go.tmpl",
            &Value::Null,
        )
    }

    pub fn emit_go_logging_middleware(&mut self) -> Result<(), CodegenError> {
        self.emit(
            Root::Backend,
            "internal/transport/http/middleware/logging.go",
            "go/logging_middleware.go.tmpl",
            &Value::Null,
        )
    }

    // ── Adapters ─────────────────────────────────────────────────────

    pub fn emit_go_postgres_common(&mut self) -> Result<(), CodegenError> {
        self.emit(
            Root::Backend,
            "internal/adapter/repository/postgres/db.go",
            "go/postgres_common.go.tmpl",
            &Value::Null,
        )
    }

    pub fn emit_go_postgres_repos(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        for e in self.sql_entities() {
            let ctx = repo_ctx(e, schema.repo_for(&e.name));
            let rel = format!("internal/adapter/repository/postgres/{}.go", snake(&e.name));
            self.emit(Root::Backend, &rel, "go/postgres_repo.go.tmpl", &ctx)?;
        }
        Ok(())
    }

    pub fn emit_go_mongo_common(&mut self) -> Result<(), CodegenError> {
        self.emit(
            Root::Backend,
            "internal/adapter/repository/mongo/client.go",
            "go/mongo_common.go.tmpl",
            &Value::Null,
        )
    }

    pub fn emit_go_mongo_repos(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        for e in self.mongo_entities() {
            let ctx = repo_ctx(e, schema.repo_for(&e.name));
            let rel = format!("internal/adapter/repository/mongo/{}.go", snake(&e.name));
            self.emit(Root::Backend, &rel, "go/mongo_repo.go.tmpl", &ctx)?;
        }
        Ok(())
    }

    pub fn emit_go_redis_client(&mut self) -> Result<(), CodegenError> {
        self.emit(Root::Backend, "internal/adapter/cache/redis.go", "go/redis.go.tmpl", &Value::Null)
    }

    pub fn emit_go_s3_client(&mut self) -> Result<(), CodegenError> {
        self.emit(Root::Backend, "internal/adapter/storage/s3.go", "go/s3.go.tmpl", &Value::Null)
    }

    pub fn emit_go_nats_adapter(&mut self) -> Result<(), CodegenError> {
        self.emit(Root::Backend, "internal/adapter/events/nats.go", "go/nats.go.tmpl", &Value::Null)
    }

    pub fn emit_go_smtp(&mut self) -> Result<(), CodegenError> {
        self.emit(Root::Backend, "internal/adapter/mailer/smtp.go", "go/smtp.go.tmpl", &Value::Null)
    }

    pub fn emit_go_email_templates(&mut self) -> Result<(), CodegenError> {
        let templates: Vec<Value> = self
            .schema()
            .templates
            .iter()
            .filter(|t| t.channel.is_empty() || t.channel.eq_ignore_ascii_case("email"))
            .map(|t| json!({"name": t.name, "subject": t.subject, "body": t.body}))
            .collect();
        self.emit(
            Root::Backend,
            "internal/notifications/templates.go",
            "go/email_templates.go.tmpl",
            &json!({ "templates": templates }),
        )
    }

    // ── Auth ─────────────────────────────────────────────────────────

    pub fn emit_go_auth(&mut self) -> Result<(), CodegenError> {
        let Some(auth) = &self.schema().auth else {
            return Ok(());
        };
        let ctx = json!({
            "issuer": auth.issuer,
            "audience": auth.audience,
            "access_ttl": go_duration(&auth.access_ttl),
            "refresh_ttl": go_duration(&auth.refresh_ttl),
            "rotation": auth.rotation,
            "algorithm": if auth.algorithm.is_empty() { "HS256" } else { auth.algorithm.as_str() },
            "claims": {
                "user_id": auth.claims.user_id,
                "roles": auth.claims.roles,
                "permissions": auth.claims.permissions,
            },
        });
        self.emit(Root::Backend, "internal/pkg/auth/jwt.go", "go/auth.go.tmpl", &ctx)
    }

    /// Refresh-token store `kind`: `port`, `memory`, `redis`, `postgres`
    /// or `hybrid`.
    pub fn emit_go_refresh_store(&mut self, kind: &str) -> Result<(), CodegenError> {
        let rel = if kind == "port" {
            "internal/pkg/auth/refresh_store.go".to_string()
        } else {
            format!("internal/pkg/auth/refresh_{}.go", kind)
        };
        let template = format!("go/refresh_{}.go.tmpl", kind);
        self.emit(Root::Backend, &rel, &template, &Value::Null)
    }

    // ── Tests ────────────────────────────────────────────────────────

    pub fn emit_go_contract_tests(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        for svc in self.http_services() {
            let routes: Vec<Value> = schema
                .endpoints
                .iter()
                .filter(|ep| ep.service == svc.name && !ep.is_ws())
                .map(|ep| json!({"path": ep.path}))
                .collect();
            let ctx = json!({"name": svc.name, "routes": routes});
            let rel = format!("tests/contract/{}_contract_test.go", snake(&svc.name));
            self.emit(Root::Backend, &rel, "go/contract_test.go.tmpl", &ctx)?;
        }
        Ok(())
    }

    pub fn emit_go_e2e_tests(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        let mut unresolved = Vec::new();
        let scenarios: Vec<Value> = schema
            .scenarios
            .iter()
            .map(|sc| {
                let steps: Vec<Value> = sc
                    .steps
                    .iter()
                    .filter_map(|st| {
                        let route = match st.action.split_once(' ') {
                            Some((verb, path)) => Some((verb.to_ascii_uppercase(), path.trim().to_string())),
                            None => st
                                .action
                                .split_once('.')
                                .and_then(|(s, m)| schema.endpoint_for(s, m))
                                .map(|ep| (ep.method.to_ascii_uppercase(), ep.path.clone())),
                        };
                        let Some((verb, path)) = route else {
                            unresolved.push(format!("{}/{}: {}", sc.name, st.name, st.action));
                            return None;
                        };
                        let input = serde_json::to_string(&st.input).unwrap_or_else(|_| "{}".to_string());
                        Some(json!({
                            "name": st.name,
                            "verb": verb,
                            "path": path,
                            "input": input,
                            "expect_status": if st.expect_status == 0 { 200 } else { st.expect_status },
                            "export": st.export,
                        }))
                    })
                    .collect();
                json!({
                    "go_name": go_name(&sc.name),
                    "description": if sc.description.is_empty() { sc.name.clone() } else { sc.description.clone() },
                    "steps": steps,
                })
            })
            .collect();
        for u in unresolved {
            self.warn(format!("e2e scenario step {} has no matching endpoint; skipped", u));
        }
        self.emit(
            Root::Backend,
            "tests/e2e/scenarios_test.go",
            "go/e2e_test.go.tmpl",
            &json!({ "scenarios": scenarios }),
        )
    }

    // ── Entry points ─────────────────────────────────────────────────

    fn main_ctx(&self, service_name: &str) -> Value {
        let main = self.main();
        let module = self.module();
        let deps = self.infra_deps();
        let exprs: String = deps.iter().map(|(_, e)| e.as_str()).collect::<Vec<_>>().join(" ");
        let mut std = vec!["context", "errors", "net/http", "os", "os/signal", "syscall", "time"];
        std.sort();
        let mut internal = vec!["internal/app", "internal/config", "internal/pkg/logger", "internal/transport/http"];
        if main.has_sql {
            internal.push("internal/adapter/repository/postgres");
        }
        if main.has_mongo {
            internal.push("internal/adapter/repository/mongo");
        }
        if main.has_cache {
            internal.push("internal/adapter/cache");
        }
        if main.has_events {
            internal.push("internal/adapter/events");
        }
        if exprs.contains("mailer.") {
            internal.push("internal/adapter/mailer");
        }
        json!({
            "service_name": service_name,
            "imports": imports(&module, &std, &internal),
            "deps": deps.iter().map(|(d, expr)| json!({"field": d.field, "expr": expr})).collect::<Vec<_>>(),
        })
    }

    /// `cmd/server/main.go` and `go.mod`, or one main per service when the
    /// project strategy is microservices.
    pub fn emit_go_server_main(&mut self) -> Result<(), CodegenError> {
        if self.main().microservices {
            let names: Vec<String> = self.schema().services.iter().map(|s| s.name.clone()).collect();
            for name in names {
                let ctx = self.main_ctx(&snake(&name).replace('_', "-"));
                let rel = format!("cmd/{}/main.go", snake(&name).replace('_', "-"));
                self.emit(Root::Backend, &rel, "go/main.go.tmpl", &ctx)?;
            }
        } else {
            let project = self.main().project.clone();
            let ctx = self.main_ctx(&project);
            self.emit(Root::Backend, "cmd/server/main.go", "go/main.go.tmpl", &ctx)?;
        }
        let ctx = json!({ "requires": self.go_requires() });
        self.emit(Root::Backend, "go.mod", "go/go.mod.tmpl", &ctx)
    }

    fn go_requires(&self) -> Vec<Value> {
        let main = self.main();
        let mut reqs = vec![
            ("github.com/prometheus/client_golang", "v1.19.0"),
            ("go.opentelemetry.io/otel", "v1.24.0"),
            ("go.opentelemetry.io/otel/exporters/otlp/otlptrace/otlptracegrpc", "v1.24.0"),
            ("go.opentelemetry.io/otel/sdk", "v1.24.0"),
        ];
        if main.framework == "chi" {
            reqs.push(("github.com/go-chi/chi/v5", "v5.0.12"));
        }
        if main.has_sql {
            reqs.push(("github.com/jackc/pgx/v5", "v5.5.5"));
        }
        if main.has_mongo {
            reqs.push(("go.mongodb.org/mongo-driver", "v1.14.0"));
        }
        if main.has_cache {
            reqs.push(("github.com/redis/go-redis/v9", "v9.5.1"));
        }
        if main.has_events {
            reqs.push(("github.com/nats-io/nats.go", "v1.33.1"));
        }
        if main.has_auth {
            reqs.push(("github.com/golang-jwt/jwt/v5", "v5.2.1"));
        }
        if main.has_scheduler {
            reqs.push(("github.com/robfig/cron/v3", "v3.0.1"));
        }
        if main.has_storage {
            reqs.push(("github.com/aws/aws-sdk-go-v2", "v1.26.1"));
            reqs.push(("github.com/aws/aws-sdk-go-v2/config", "v1.27.11"));
            reqs.push(("github.com/aws/aws-sdk-go-v2/service/s3", "v1.53.1"));
        }
        reqs.sort();
        reqs.into_iter()
            .map(|(path, version)| json!({"path": path, "version": version}))
            .collect()
    }
}
