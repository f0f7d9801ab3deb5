//! Document artifacts: OpenAPI, AsyncAPI, the system manifest, MCP tool
//! listings and Mermaid diagrams.
//!
//! The structured documents are built as `serde_json` values and
//! serialized, so they are valid by construction; only the Mermaid
//! diagrams go through templates.

use serde_json::{json, Map, Value};

use ang_ir::{Entity, Field, Schema, TypeRef};

use super::{Emitter, Root};
use crate::context::{camel, openapi_schema, snake, table_name};
use crate::error::CodegenError;

fn field_schema(f: &Field) -> Value {
    let mut schema = openapi_schema(&f.ty);
    if let Value::Object(obj) = &mut schema {
        if !f.constraints.enum_values.is_empty() {
            obj.insert("enum".into(), json!(f.constraints.enum_values));
        }
        if let Some(default) = &f.default {
            obj.insert("default".into(), default.clone());
        }
        if f.secret {
            obj.insert("writeOnly".into(), Value::Bool(true));
        }
    }
    schema
}

/// JSON schema object for an entity's fields.
fn object_schema(fields: &[Field], description: &str) -> Value {
    let mut props = Map::new();
    let mut required = Vec::new();
    for f in fields {
        props.insert(f.name.clone(), field_schema(f));
        if !f.optional {
            required.push(Value::String(f.name.clone()));
        }
    }
    let mut out = json!({"type": "object", "properties": props});
    if !required.is_empty() {
        out["required"] = Value::Array(required);
    }
    if !description.is_empty() {
        out["description"] = Value::String(description.to_string());
    }
    out
}

fn entity_ref(name: &str) -> Value {
    json!({"$ref": format!("#/components/schemas/{}", name)})
}

fn error_response(schema: &Schema, name: &str) -> (String, Value) {
    let def = schema.errors.iter().find(|e| e.name == name);
    let status = def.map(|d| d.http_status).filter(|s| *s != 0).unwrap_or(500);
    let message = def.map(|d| d.message.clone()).unwrap_or_else(|| name.to_string());
    (
        status.to_string(),
        json!({
            "description": message,
            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Error"}}},
        }),
    )
}

/// OpenAPI 3.0 document for every HTTP endpoint.
pub fn openapi_document(schema: &Schema) -> Value {
    let mut paths = Map::new();
    for ep in schema.endpoints.iter().filter(|ep| !ep.is_ws()) {
        let method = schema.method(&ep.service, &ep.rpc);
        let verb = ep.method.to_ascii_lowercase();
        let mut op = Map::new();
        op.insert("operationId".into(), json!(format!("{}{}", camel(&ep.service), ep.rpc)));
        op.insert("tags".into(), json!([ep.service]));
        let summary = if !ep.description.is_empty() {
            ep.description.clone()
        } else {
            method.map(|m| m.description.clone()).unwrap_or_default()
        };
        if !summary.is_empty() {
            op.insert("summary".into(), Value::String(summary));
        }
        let input = method.and_then(|m| m.input.as_deref()).and_then(|i| schema.entity(i));
        let mut params: Vec<Value> = ep
            .path_params
            .iter()
            .map(|p| {
                let ty = input
                    .and_then(|e| e.fields.iter().find(|f| f.name.eq_ignore_ascii_case(p)))
                    .map(|f| openapi_schema(&f.ty))
                    .unwrap_or_else(|| json!({"type": "string"}));
                json!({"name": p, "in": "path", "required": true, "schema": ty})
            })
            .collect();
        let has_body = !matches!(verb.as_str(), "get" | "delete");
        if let Some(entity) = input {
            if has_body {
                op.insert(
                    "requestBody".into(),
                    json!({
                        "required": true,
                        "content": {"application/json": {"schema": entity_ref(&entity.name)}},
                    }),
                );
            } else {
                for f in entity.fields.iter().filter(|f| !ep.path_params.iter().any(|p| p.eq_ignore_ascii_case(&f.name))) {
                    params.push(json!({
                        "name": f.name,
                        "in": "query",
                        "required": !f.optional,
                        "schema": openapi_schema(&f.ty),
                    }));
                }
            }
        }
        if let Some(page) = &ep.pagination {
            params.push(json!({"name": "limit", "in": "query", "schema": {"type": "integer", "default": page.default_limit}}));
            let (name, schema) = if page.kind == "cursor" {
                ("cursor", json!({"type": "string"}))
            } else {
                ("offset", json!({"type": "integer", "default": 0}))
            };
            params.push(json!({"name": name, "in": "query", "schema": schema}));
        }
        if !params.is_empty() {
            op.insert("parameters".into(), Value::Array(params));
        }
        let mut responses = Map::new();
        match method.and_then(|m| m.output.as_deref()) {
            Some(out) => {
                responses.insert(
                    "200".into(),
                    json!({
                        "description": "OK",
                        "content": {"application/json": {"schema": entity_ref(out)}},
                    }),
                );
            }
            None => {
                responses.insert("204".into(), json!({"description": "No Content"}));
            }
        }
        let throws = method.map(|m| m.throws.clone()).unwrap_or_default();
        for err in ep.errors.iter().chain(throws.iter()) {
            let (status, resp) = error_response(schema, err);
            responses.entry(status).or_insert(resp);
        }
        if ep.auth.is_protected() {
            responses
                .entry("401")
                .or_insert_with(|| json!({"description": "Unauthorized"}));
            op.insert("security".into(), json!([{"bearerAuth": []}]));
        }
        op.insert("responses".into(), Value::Object(responses));
        if ep.idempotent {
            op.insert("x-idempotent".into(), Value::Bool(true));
        }
        if let Some(rl) = &ep.rate_limit {
            op.insert("x-rate-limit".into(), json!({"rps": rl.rps, "burst": rl.burst}));
        }
        let entry = paths
            .entry(openapi_path(&ep.path))
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(ops) = entry {
            ops.insert(verb, Value::Object(op));
        }
    }

    let mut schemas = Map::new();
    for e in &schema.entities {
        schemas.insert(e.name.clone(), object_schema(&e.fields, &e.description));
    }
    schemas.insert(
        "Error".into(),
        json!({
            "type": "object",
            "properties": {"code": {"type": "string"}, "message": {"type": "string"}},
            "required": ["code", "message"],
        }),
    );

    let project = &schema.project;
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": if project.name.is_empty() { "api" } else { project.name.as_str() },
            "version": if project.version.is_empty() { "0.1.0" } else { project.version.as_str() },
        },
        "paths": paths,
        "components": {
            "schemas": schemas,
            "securitySchemes": {
                "bearerAuth": {"type": "http", "scheme": "bearer", "bearerFormat": "JWT"},
            },
        },
    })
}

/// `/users/:id` and `/users/{id}` both become `/users/{id}`.
fn openapi_path(path: &str) -> String {
    path.split('/')
        .map(|seg| match seg.strip_prefix(':') {
            Some(name) => format!("{{{}}}", name),
            None => seg.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// AsyncAPI 2.6 document: one channel per event, publishers and
/// subscribers taken from the services.
pub fn asyncapi_document(schema: &Schema) -> Value {
    let mut channels = Map::new();
    let mut messages = Map::new();
    for ev in &schema.events {
        let publishers: Vec<&str> = schema
            .services
            .iter()
            .filter(|s| s.publishes.contains(&ev.name) || s.methods.iter().any(|m| m.publishes.contains(&ev.name)))
            .map(|s| s.name.as_str())
            .collect();
        let subscribers: Vec<&str> = schema
            .services
            .iter()
            .filter(|s| s.subscribes.contains_key(&ev.name))
            .map(|s| s.name.as_str())
            .collect();
        let msg_ref = json!({"$ref": format!("#/components/messages/{}", ev.name)});
        let mut channel = Map::new();
        channel.insert("publish".into(), json!({"operationId": format!("publish{}", ev.name), "message": msg_ref}));
        channel.insert(
            "subscribe".into(),
            json!({"operationId": format!("on{}", ev.name), "message": msg_ref}),
        );
        channel.insert("x-publishers".into(), json!(publishers));
        channel.insert("x-subscribers".into(), json!(subscribers));
        if ev.external {
            channel.insert("x-external".into(), Value::Bool(true));
        }
        channels.insert(ev.name.clone(), Value::Object(channel));
        messages.insert(
            ev.name.clone(),
            json!({"name": ev.name, "payload": object_schema(&ev.fields, "")}),
        );
    }
    let project = &schema.project;
    json!({
        "asyncapi": "2.6.0",
        "info": {
            "title": format!("{} events", if project.name.is_empty() { "app" } else { project.name.as_str() }),
            "version": if project.version.is_empty() { "0.1.0" } else { project.version.as_str() },
        },
        "defaultContentType": "application/json",
        "servers": {"nats": {"url": "nats://localhost:4222", "protocol": "nats"}},
        "channels": channels,
        "components": {"messages": messages},
    })
}

/// One MCP tool per service method, with the input entity as JSON schema.
pub fn mcp_tools(schema: &Schema) -> Value {
    let tools: Vec<Value> = schema
        .services
        .iter()
        .flat_map(|svc| {
            svc.methods.iter().map(move |m| {
                let input = m
                    .input
                    .as_deref()
                    .and_then(|i| schema.entity(i))
                    .map(|e| object_schema(&e.fields, ""))
                    .unwrap_or_else(|| json!({"type": "object", "properties": {}}));
                let description = if m.description.is_empty() {
                    format!("{}.{}", svc.name, m.name)
                } else {
                    m.description.clone()
                };
                json!({
                    "name": format!("{}_{}", snake(&svc.name), snake(&m.name)),
                    "description": description,
                    "inputSchema": input,
                })
            })
        })
        .collect();
    json!({ "tools": tools })
}

/// Summary of what the project declares, for tooling that does not want
/// to parse the IR.
pub fn system_manifest(schema: &Schema) -> Value {
    json!({
        "project": schema.project.name,
        "version": schema.project.version,
        "irVersion": schema.ir_version,
        "entities": schema.entities.iter().map(|e| json!({
            "name": e.name,
            "table": if e.is_persisted() { Value::String(table_name(&e.name)) } else { Value::Null },
            "fields": e.fields.iter().map(|f| f.name.clone()).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
        "services": schema.services.iter().map(|s| json!({
            "name": s.name,
            "methods": s.methods.iter().map(|m| m.name.clone()).collect::<Vec<_>>(),
            "publishes": s.publishes,
            "subscribes": s.subscribes.keys().collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
        "endpoints": schema.endpoints.iter().map(|ep| json!({
            "method": ep.method,
            "path": ep.path,
            "rpc": format!("{}.{}", ep.service, ep.rpc),
            "protected": ep.auth.is_protected(),
        })).collect::<Vec<_>>(),
        "events": schema.events.iter().map(|e| e.name.clone()).collect::<Vec<_>>(),
        "errors": schema.errors.iter().map(|e| json!({"name": e.name, "status": e.http_status})).collect::<Vec<_>>(),
        "schedules": schema.schedules.iter().map(|s| s.name.clone()).collect::<Vec<_>>(),
    })
}

fn mermaid_kind(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Array { item } => format!("{}_list", mermaid_kind(item)),
        TypeRef::Entity { name } => name.clone(),
        TypeRef::Map { .. } => "map".into(),
        other => other.to_string().replace(['[', ']'], ""),
    }
}

fn erd_relations(entities: &[Entity]) -> Vec<Value> {
    let mut out = Vec::new();
    for e in entities {
        for f in &e.fields {
            if let Some(target) = f.ty.element_entity() {
                if entities.iter().any(|x| x.name == target) {
                    out.push(json!({"from": e.name, "to": target, "label": f.name}));
                }
            } else if let Some(base) = f.name.strip_suffix("Id").or_else(|| f.name.strip_suffix("_id")) {
                let target = heck::ToUpperCamelCase::to_upper_camel_case(base);
                if target != e.name && entities.iter().any(|x| x.name == target) {
                    out.push(json!({"from": target, "to": e.name, "label": f.name}));
                }
            }
        }
    }
    out
}

impl Emitter<'_> {
    pub fn emit_openapi(&mut self) -> Result<(), CodegenError> {
        let doc = openapi_document(self.schema());
        let yaml = serde_yaml::to_string(&doc).map_err(|e| CodegenError::serialize("openapi", e))?;
        self.write(Root::Backend, "api/openapi.yaml", yaml.as_bytes())
    }

    pub fn emit_asyncapi(&mut self) -> Result<(), CodegenError> {
        let doc = asyncapi_document(self.schema());
        let yaml = serde_yaml::to_string(&doc).map_err(|e| CodegenError::serialize("asyncapi", e))?;
        self.write(Root::Backend, "api/asyncapi.yaml", yaml.as_bytes())
    }

    pub fn emit_system_manifest(&mut self) -> Result<(), CodegenError> {
        let doc = system_manifest(self.schema());
        let mut text = serde_json::to_string_pretty(&doc).map_err(|e| CodegenError::serialize("system manifest", e))?;
        text.push('\n');
        self.write(Root::Backend, "ang-manifest.json", text.as_bytes())
    }

    pub fn emit_mcp_tools(&mut self) -> Result<(), CodegenError> {
        let doc = mcp_tools(self.schema());
        let mut text = serde_json::to_string_pretty(&doc).map_err(|e| CodegenError::serialize("mcp tools", e))?;
        text.push('\n');
        self.write(Root::Backend, "mcp/tools.json", text.as_bytes())
    }

    /// `docs/architecture.mmd` and `docs/erd.mmd`.
    pub fn emit_mermaid(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        let main = self.main().clone();
        let services: Vec<Value> = schema
            .services
            .iter()
            .map(|s| json!({"id": snake(&s.name), "name": s.name}))
            .collect();
        let mut stores = Vec::new();
        let mut edges = Vec::new();
        for (flag, id, label) in [
            (main.has_sql, "postgres", "Postgres"),
            (main.has_mongo, "mongo", "MongoDB"),
            (main.has_cache, "redis", "Redis"),
            (main.has_events, "nats", "NATS"),
        ] {
            if flag {
                stores.push(json!({"id": id, "label": label}));
            }
        }
        for ep in &schema.endpoints {
            let edge = json!({"from": "client", "to": snake(&ep.service), "label": ""});
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }
        for svc in &schema.services {
            for other in &svc.uses {
                edges.push(json!({"from": snake(&svc.name), "to": snake(other), "label": "uses"}));
            }
            let uses_repo = svc.methods.iter().any(|m| {
                let mut found = false;
                ang_ir::flow::walk_steps(&m.flow, &mut |s| found |= s.action.is_repo());
                found
            });
            if uses_repo {
                if main.has_sql {
                    edges.push(json!({"from": snake(&svc.name), "to": "postgres", "label": ""}));
                } else if main.has_mongo {
                    edges.push(json!({"from": snake(&svc.name), "to": "mongo", "label": ""}));
                }
            }
            let publishes = !svc.publishes.is_empty() || svc.methods.iter().any(|m| !m.publishes.is_empty());
            if publishes && main.has_events {
                edges.push(json!({"from": snake(&svc.name), "to": "nats", "label": "publish"}));
            }
            if !svc.subscribes.is_empty() && main.has_events {
                edges.push(json!({"from": "nats", "to": snake(&svc.name), "label": "subscribe"}));
            }
        }
        let ctx = json!({"services": services, "stores": stores, "edges": edges});
        self.emit(Root::Backend, "docs/architecture.mmd", "mermaid/architecture.mmd.tmpl", &ctx)?;

        let entities: Vec<Value> = schema
            .entities
            .iter()
            .filter(|e| !e.is_message())
            .map(|e| {
                json!({
                    "name": e.name,
                    "fields": e.fields.iter().map(|f| json!({
                        "kind": mermaid_kind(&f.ty),
                        "name": f.name,
                        "is_id": f.name == "id",
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        let persisted: Vec<Entity> = schema.entities.iter().filter(|e| !e.is_message()).cloned().collect();
        let ctx = json!({"entities": entities, "relations": erd_relations(&persisted)});
        self.emit(Root::Backend, "docs/erd.mmd", "mermaid/erd.mmd.tmpl", &ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ang_ir::{Endpoint, EndpointAuth, Event, Method, Service};

    fn schema() -> Schema {
        let mut s = Schema::default();
        s.project.name = "shop".into();
        s.entities = vec![
            Entity {
                name: "Order".into(),
                fields: vec![
                    Field::new("id", TypeRef::String),
                    Field::new("userId", TypeRef::String),
                    Field::new("total", TypeRef::Float64),
                ],
                ..Entity::default()
            },
            Entity {
                name: "User".into(),
                fields: vec![Field::new("id", TypeRef::String)],
                ..Entity::default()
            },
            Entity {
                name: "GetOrderRequest".into(),
                fields: vec![Field::new("id", TypeRef::String)],
                ..Entity::default()
            },
        ];
        s.services = vec![Service {
            name: "Orders".into(),
            publishes: vec!["OrderPlaced".into()],
            methods: vec![Method {
                name: "GetOrder".into(),
                input: Some("GetOrderRequest".into()),
                output: Some("Order".into()),
                ..Method::default()
            }],
            ..Service::default()
        }];
        s.events = vec![Event {
            name: "OrderPlaced".into(),
            fields: vec![Field::new("orderId", TypeRef::String)],
            ..Event::default()
        }];
        s.endpoints = vec![Endpoint {
            method: "GET".into(),
            path: "/orders/{id}".into(),
            service: "Orders".into(),
            rpc: "GetOrder".into(),
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
    fn openapi_paths_and_security() {
        let doc = openapi_document(&schema());
        let op = &doc["paths"]["/orders/{id}"]["get"];
        assert_eq!(op["operationId"], "ordersGetOrder");
        assert_eq!(op["parameters"][0]["in"], "path");
        assert_eq!(op["security"][0]["bearerAuth"], json!([]));
        assert_eq!(
            op["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/Order"
        );
        assert!(op.get("requestBody").is_none());
        assert_eq!(doc["components"]["schemas"]["Order"]["required"], json!(["id", "userId", "total"]));
    }

    #[test]
    fn colon_params_are_rewritten() {
        assert_eq!(openapi_path("/users/:id/orders"), "/users/{id}/orders");
    }

    #[test]
    fn asyncapi_lists_publishers() {
        let doc = asyncapi_document(&schema());
        assert_eq!(doc["channels"]["OrderPlaced"]["x-publishers"], json!(["Orders"]));
        assert_eq!(
            doc["components"]["messages"]["OrderPlaced"]["payload"]["properties"]["orderId"]["type"],
            "string"
        );
    }

    #[test]
    fn mcp_tool_per_method() {
        let tools = mcp_tools(&schema());
        assert_eq!(tools["tools"][0]["name"], "orders_get_order");
        assert_eq!(tools["tools"][0]["inputSchema"]["properties"]["id"]["type"], "string");
    }

    #[test]
    fn erd_infers_id_references() {
        let s = schema();
        let rels = erd_relations(&s.entities[..2]);
        assert_eq!(rels, vec![json!({"from": "User", "to": "Order", "label": "userId"})]);
    }
}
