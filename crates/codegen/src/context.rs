//! Render contexts.
//!
//! Templates never see IR types directly: each family gets a JSON value
//! built here, with names already cased and types already mapped for the
//! target language.

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use serde_json::{json, Value};

use ang_ir::{Endpoint, Entity, Field, Schema, Service, Strategy, TypeRef};

use crate::capability::{Capability, CapabilitySet};

/// Per-target facts shared by every family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainContext {
    pub project: String,
    pub module: String,
    pub version: String,
    pub target: String,
    pub framework: String,
    pub has_http: bool,
    pub has_sql: bool,
    pub has_mongo: bool,
    pub has_cache: bool,
    pub has_events: bool,
    pub has_storage: bool,
    pub has_auth: bool,
    pub has_scheduler: bool,
    pub has_email: bool,
    pub microservices: bool,
}

impl MainContext {
    pub fn new(schema: &Schema, target_name: &str, framework: &str, caps: &CapabilitySet) -> Self {
        let project = if schema.project.name.is_empty() {
            "app".to_string()
        } else {
            schema.project.name.clone()
        };
        let module = if schema.project.module.is_empty() {
            project.to_snake_case().replace('_', "-")
        } else {
            schema.project.module.clone()
        };
        MainContext {
            project,
            module,
            version: if schema.project.version.is_empty() {
                "0.1.0".to_string()
            } else {
                schema.project.version.clone()
            },
            target: target_name.to_string(),
            framework: framework.trim().to_ascii_lowercase(),
            has_http: caps.has(Capability::Http),
            has_sql: caps.has(Capability::Sql),
            has_mongo: caps.has(Capability::Mongo),
            has_cache: caps.has(Capability::Cache),
            has_events: caps.has(Capability::Events),
            has_storage: caps.has(Capability::Storage),
            has_auth: caps.has(Capability::Auth) && schema.auth.is_some(),
            has_scheduler: caps.has(Capability::Scheduler) && !schema.schedules.is_empty(),
            has_email: caps.has(Capability::Email) && !schema.templates.is_empty(),
            microservices: schema.project.strategy == Strategy::Microservices,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "project": self.project,
            "project_snake": self.project.to_snake_case(),
            "module": self.module,
            "version": self.version,
            "target": self.target,
            "framework": self.framework,
            "chi": self.framework == "chi",
            "has_http": self.has_http,
            "has_sql": self.has_sql,
            "has_mongo": self.has_mongo,
            "has_cache": self.has_cache,
            "has_events": self.has_events,
            "has_storage": self.has_storage,
            "has_auth": self.has_auth,
            "has_scheduler": self.has_scheduler,
            "has_email": self.has_email,
            "microservices": self.microservices,
        })
    }

    /// Store backing `entity` for this target: an explicit `@storage`
    /// wins, then SQL, then Mongo.
    pub fn store_for(&self, entity: &Entity) -> Option<&'static str> {
        match entity.storage.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("mongo") | Some("mongodb") if self.has_mongo => Some("mongo"),
            Some("postgres") | Some("sql") if self.has_sql => Some("sql"),
            Some("none") | Some("memory") => None,
            _ if self.has_sql => Some("sql"),
            _ if self.has_mongo => Some("mongo"),
            _ => None,
        }
    }
}

// ── Naming ───────────────────────────────────────────────────────────

const INITIALISMS: &[&str] = &["id", "url", "api", "http", "json", "uuid", "sql", "ip", "sku"];

/// Exported Go identifier: `user_id` -> `UserID`, `apiKey` -> `APIKey`.
pub fn go_name(s: &str) -> String {
    s.to_snake_case()
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            if INITIALISMS.contains(&w) {
                w.to_ascii_uppercase()
            } else {
                w.to_upper_camel_case()
            }
        })
        .collect()
}

pub fn snake(s: &str) -> String {
    s.to_snake_case()
}

pub fn camel(s: &str) -> String {
    s.to_lower_camel_case()
}

/// Naive English plural used for table and route names.
pub fn plural(s: &str) -> String {
    if s.ends_with('s') || s.ends_with('x') || s.ends_with("ch") || s.ends_with("sh") {
        format!("{}es", s)
    } else if s.ends_with('y') && !s.ends_with("ay") && !s.ends_with("ey") && !s.ends_with("oy") {
        format!("{}ies", &s[..s.len() - 1])
    } else {
        format!("{}s", s)
    }
}

pub fn table_name(entity: &str) -> String {
    plural(&entity.to_snake_case())
}

/// Go `[]string{...}` literal.
pub fn go_string_slice(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| Value::String(s.clone()).to_string()).collect();
    format!("[]string{{{}}}", quoted.join(", "))
}

// ── Type mapping ─────────────────────────────────────────────────────

/// Go spelling of `ty`; entity names are prefixed with `qualifier.` when
/// given.
pub fn go_type(ty: &TypeRef, qualifier: Option<&str>) -> String {
    match ty {
        TypeRef::String | TypeRef::Uuid => "string".to_string(),
        TypeRef::Int32 => "int32".to_string(),
        TypeRef::Int64 => "int64".to_string(),
        TypeRef::Float32 => "float32".to_string(),
        TypeRef::Float64 => "float64".to_string(),
        TypeRef::Bool => "bool".to_string(),
        TypeRef::Time => "time.Time".to_string(),
        TypeRef::Json => "json.RawMessage".to_string(),
        TypeRef::Any | TypeRef::Union { .. } => "any".to_string(),
        TypeRef::File => "[]byte".to_string(),
        TypeRef::Array { item } => format!("[]{}", go_type(item, qualifier)),
        TypeRef::Map { key, value } => {
            format!("map[{}]{}", go_type(key, qualifier), go_type(value, qualifier))
        }
        TypeRef::Entity { name } => match qualifier {
            Some(q) => format!("{}.{}", q, name),
            None => name.clone(),
        },
    }
}

pub fn ts_type(ty: &TypeRef) -> String {
    match ty {
        TypeRef::String | TypeRef::Uuid | TypeRef::Time => "string".to_string(),
        TypeRef::Int32 | TypeRef::Int64 | TypeRef::Float32 | TypeRef::Float64 => "number".to_string(),
        TypeRef::Bool => "boolean".to_string(),
        TypeRef::Json | TypeRef::Any => "unknown".to_string(),
        TypeRef::File => "Blob".to_string(),
        TypeRef::Array { item } => match item.as_ref() {
            TypeRef::Union { .. } => format!("Array<{}>", ts_type(item)),
            _ => format!("{}[]", ts_type(item)),
        },
        TypeRef::Map { key, value } => format!("Record<{}, {}>", ts_type(key), ts_type(value)),
        TypeRef::Entity { name } => name.clone(),
        TypeRef::Union { variants } => variants.iter().map(ts_type).collect::<Vec<_>>().join(" | "),
    }
}

pub fn py_type(ty: &TypeRef) -> String {
    match ty {
        TypeRef::String | TypeRef::Uuid => "str".to_string(),
        TypeRef::Int32 | TypeRef::Int64 => "int".to_string(),
        TypeRef::Float32 | TypeRef::Float64 => "float".to_string(),
        TypeRef::Bool => "bool".to_string(),
        TypeRef::Time => "datetime".to_string(),
        TypeRef::Json | TypeRef::Any => "Any".to_string(),
        TypeRef::File => "bytes".to_string(),
        TypeRef::Array { item } => format!("list[{}]", py_type(item)),
        TypeRef::Map { key, value } => format!("dict[{}, {}]", py_type(key), py_type(value)),
        TypeRef::Entity { name } => format!("\"{}\"", name),
        TypeRef::Union { variants } => variants.iter().map(py_type).collect::<Vec<_>>().join(" | "),
    }
}

pub fn sql_type(ty: &TypeRef) -> &'static str {
    match ty {
        TypeRef::String => "TEXT",
        TypeRef::Uuid => "UUID",
        TypeRef::Int32 => "INTEGER",
        TypeRef::Int64 => "BIGINT",
        TypeRef::Float32 => "REAL",
        TypeRef::Float64 => "DOUBLE PRECISION",
        TypeRef::Bool => "BOOLEAN",
        TypeRef::Time => "TIMESTAMPTZ",
        TypeRef::File => "BYTEA",
        _ => "JSONB",
    }
}

/// OpenAPI schema object for `ty`.
pub fn openapi_schema(ty: &TypeRef) -> Value {
    match ty {
        TypeRef::String => json!({"type": "string"}),
        TypeRef::Uuid => json!({"type": "string", "format": "uuid"}),
        TypeRef::Time => json!({"type": "string", "format": "date-time"}),
        TypeRef::Int32 => json!({"type": "integer", "format": "int32"}),
        TypeRef::Int64 => json!({"type": "integer", "format": "int64"}),
        TypeRef::Float32 => json!({"type": "number", "format": "float"}),
        TypeRef::Float64 => json!({"type": "number", "format": "double"}),
        TypeRef::Bool => json!({"type": "boolean"}),
        TypeRef::File => json!({"type": "string", "format": "binary"}),
        TypeRef::Json | TypeRef::Any => json!({}),
        TypeRef::Array { item } => json!({"type": "array", "items": openapi_schema(item)}),
        TypeRef::Map { value, .. } => json!({"type": "object", "additionalProperties": openapi_schema(value)}),
        TypeRef::Entity { name } => json!({"$ref": format!("#/components/schemas/{}", name)}),
        TypeRef::Union { variants } => json!({"oneOf": variants.iter().map(openapi_schema).collect::<Vec<_>>()}),
    }
}

fn literal(value: &Value, ty: &TypeRef) -> Option<String> {
    match (value, ty) {
        (Value::String(s), _) => Some(Value::String(s.clone()).to_string()),
        (Value::Number(n), _) => Some(n.to_string()),
        (Value::Bool(b), TypeRef::Bool) => Some(b.to_string()),
        _ => None,
    }
}

// ── Contexts ─────────────────────────────────────────────────────────

pub fn field_ctx(f: &Field) -> Value {
    json!({
        "name": f.name,
        "go_name": go_name(&f.name),
        "go_type": go_type(&f.ty, None),
        "go_type_domain": go_type(&f.ty, Some("domain")),
        "ts_type": ts_type(&f.ty),
        "py_type": py_type(&f.ty),
        "sql_type": sql_type(&f.ty),
        "column": snake(&f.name),
        "json": f.name,
        "optional": f.optional,
        "is_id": f.name == "id",
        "is_string": matches!(f.ty, TypeRef::String | TypeRef::Uuid),
        "unique": f.constraints.unique,
        "index": f.constraints.index,
        "secret": f.secret,
        "validate": f.constraints.validate,
        "enum_values": f.constraints.enum_values,
        "env": f.env.clone().unwrap_or_else(|| f.name.to_snake_case().to_uppercase()),
        "default": f.default.as_ref().and_then(|d| literal(d, &f.ty)),
    })
}

fn uses_type(fields: &[Field], pred: &dyn Fn(&TypeRef) -> bool) -> bool {
    fn walk(ty: &TypeRef, pred: &dyn Fn(&TypeRef) -> bool) -> bool {
        if pred(ty) {
            return true;
        }
        match ty {
            TypeRef::Array { item } => walk(item, pred),
            TypeRef::Map { key, value } => walk(key, pred) || walk(value, pred),
            TypeRef::Union { variants } => variants.iter().any(|v| walk(v, pred)),
            _ => false,
        }
    }
    fields.iter().any(|f| walk(&f.ty, pred))
}

pub fn entity_ctx(e: &Entity) -> Value {
    let fsm = e.fsm.as_ref().map(|fsm| {
        json!({
            "field": fsm.field,
            "go_field": go_name(&fsm.field),
            "states": fsm.states,
            "transitions": fsm.transitions.iter().map(|(from, to)| json!({"from": from, "to": to, "to_go": go_string_slice(to)})).collect::<Vec<_>>(),
        })
    });
    json!({
        "name": e.name,
        "snake": snake(&e.name),
        "camel": camel(&e.name),
        "table": table_name(&e.name),
        "route": plural(&e.name.to_snake_case()).replace('_', "-"),
        "description": e.description,
        "fields": e.fields.iter().map(field_ctx).collect::<Vec<_>>(),
        "non_id_fields": e.fields.iter().filter(|f| f.name != "id").map(field_ctx).collect::<Vec<_>>(),
        "has_id": e.has_id(),
        "needs_time": uses_type(&e.fields, &|t| matches!(t, TypeRef::Time)),
        "needs_json": uses_type(&e.fields, &|t| matches!(t, TypeRef::Json)),
        "fsm": fsm,
        "invariants": e.invariants,
    })
}

/// Endpoint facts; `input` resolves path parameters onto request fields.
pub fn endpoint_ctx(ep: &Endpoint, input: Option<&Entity>) -> Value {
    let params: Vec<Value> = ep
        .path_params
        .iter()
        .map(|p| {
            let target = input.and_then(|e| {
                e.fields
                    .iter()
                    .find(|f| f.name.eq_ignore_ascii_case(p) || go_name(&f.name) == go_name(p))
                    .filter(|f| matches!(f.ty, TypeRef::String | TypeRef::Uuid))
            });
            json!({
                "name": p,
                "go_field": target.map(|f| go_name(&f.name)),
            })
        })
        .collect();
    let verb = ep.method.to_ascii_uppercase();
    let mut ts_path = ep.path.clone();
    let mut py_path = ep.path.clone();
    for p in &ep.path_params {
        let field = input
            .and_then(|e| e.fields.iter().find(|f| f.name.eq_ignore_ascii_case(p)))
            .map(|f| f.name.clone())
            .unwrap_or_else(|| p.clone());
        let placeholder = format!("{{{}}}", p);
        ts_path = ts_path.replace(&placeholder, &format!("${{encodeURIComponent(String(req.{}))}}", field));
        py_path = py_path.replace(&placeholder, &format!("{{req['{}']}}", field));
    }
    json!({
        "verb": verb,
        "verb_lower": verb.to_ascii_lowercase(),
        "verb_title": verb.to_ascii_lowercase().to_upper_camel_case(),
        "path": ep.path,
        "ts_path": ts_path,
        "py_path": py_path,
        "service": ep.service,
        "rpc": ep.rpc,
        "description": ep.description,
        "path_params": params,
        "has_body": !matches!(verb.as_str(), "GET" | "DELETE" | "WS"),
        "is_ws": ep.is_ws(),
        "protected": ep.auth.is_protected(),
        "roles": ep.auth.roles,
        "permission": ep.auth.permission,
        "middleware": ep.middleware,
        "timeout": ep.timeout,
        "idempotent": ep.idempotent,
        "room_param": ep.room_param,
    })
}

/// Service facts shared by the port, impl, handler and SDK families.
/// `bodies` supplies a translated body per method name (impl family only).
pub fn service_ctx(schema: &Schema, svc: &Service, bodies: &dyn Fn(&str) -> Option<String>) -> Value {
    let methods: Vec<Value> = svc
        .methods
        .iter()
        .map(|m| {
            let endpoint = schema.endpoint_for(&svc.name, &m.name);
            let input_entity = m.input.as_deref().and_then(|i| schema.entity(i));
            json!({
                "name": m.name,
                "snake": snake(&m.name),
                "camel": camel(&m.name),
                "description": m.description,
                "input": m.input,
                "output": m.output,
                "has_input": m.input.is_some(),
                "has_output": m.output.is_some(),
                "input_fields": input_entity.map(|e| e.fields.iter().map(field_ctx).collect::<Vec<_>>()).unwrap_or_default(),
                "publishes": m.publishes,
                "throws": m.throws,
                "cache": m.cache.as_ref().map(|c| json!({"ttl": c.ttl, "tags": c.tags})),
                "idempotent": m.idempotent,
                "body": bodies(&m.name),
                "http": endpoint.map(|ep| endpoint_ctx(ep, input_entity)),
                "permission": format!("{}.{}", svc.name, m.name).to_ascii_lowercase(),
            })
        })
        .collect();
    let mut repos: Vec<String> = Vec::new();
    for m in &svc.methods {
        ang_ir::flow::walk_steps(&m.flow, &mut |step| {
            if step.action.is_repo() {
                if let Some(src) = step.arg_str("source") {
                    if !repos.iter().any(|r| r == src) {
                        repos.push(src.to_string());
                    }
                }
            }
        });
    }
    let cached = svc.methods.iter().any(|m| m.cache.is_some());
    json!({
        "name": svc.name,
        "svc": svc.name,
        "svc_snake": snake(&svc.name),
        "snake": snake(&svc.name),
        "camel": camel(&svc.name),
        "kebab": snake(&svc.name).replace('_', "-"),
        "description": svc.description,
        "methods": methods,
        "uses": svc.uses.iter().map(|u| json!({"name": u, "camel": camel(u)})).collect::<Vec<_>>(),
        "repos": repos.iter().map(|r| json!({"entity": r, "camel": camel(r)})).collect::<Vec<_>>(),
        "publishes": !svc.publishes.is_empty() || svc.methods.iter().any(|m| !m.publishes.is_empty()),
        "subscribes": svc.subscribes.iter().map(|(event, handler)| json!({"event": event, "handler": handler})).collect::<Vec<_>>(),
        "cached": cached,
        "requires": {
            "sql": svc.requires.sql,
            "mongo": svc.requires.mongo,
            "redis": svc.requires.redis,
            "nats": svc.requires.nats,
            "s3": svc.requires.s3,
        },
    })
}
