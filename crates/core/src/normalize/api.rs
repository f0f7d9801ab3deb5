use std::collections::BTreeMap;

use ang_ir::{CachePolicy, Pagination, RateLimit, ScenarioStep, TestHints};

use super::{NormalizeError, Normalizer};
use crate::defs::{EndpointDef, ErrorDef, EventDef, ScenarioDef, ScheduleDef};
use crate::diagnostic::Warning;
use crate::loader::Node;

pub(crate) const API_SECTIONS: &[&str] = &["endpoints", "events", "errors", "schedules", "scenarios"];

const ENDPOINT_FIELDS: &[&str] = &[
    "method",
    "path",
    "service",
    "rpc",
    "description",
    "auth",
    "middleware",
    "rate_limit",
    "timeout",
    "cache",
    "invalidate",
    "idempotent",
    "errors",
    "pagination",
    "test_hints",
    "messages",
    "room_param",
];

const VERBS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "WS"];

impl Normalizer {
    pub fn extract_endpoints(&mut self, api: &Node) -> Result<Vec<EndpointDef>, NormalizeError> {
        let Some(list) = api.get("endpoints") else {
            return Ok(Vec::new());
        };
        let Some(items) = list.as_array() else {
            return Err(NormalizeError::invalid(list, "endpoints must be a list"));
        };
        let mut out = Vec::with_capacity(items.len());
        for node in items {
            self.check_fields(node, ENDPOINT_FIELDS, "endpoint");
            let method = node
                .str_field("method")
                .unwrap_or_default()
                .to_ascii_uppercase();
            if !VERBS.contains(&method.as_str()) {
                return Err(NormalizeError::invalid(
                    node,
                    format!("endpoint method '{}' must be one of {}", method, VERBS.join(", ")),
                ));
            }
            let (Some(path), Some(service), Some(rpc)) = (
                node.str_field("path"),
                node.str_field("service"),
                node.str_field("rpc"),
            ) else {
                return Err(NormalizeError::invalid(
                    node,
                    "endpoint requires path, service and rpc",
                ));
            };
            if !path.starts_with('/') {
                self.push(
                    Warning::warn("INVALID_PATH", format!("endpoint path '{}' should start with '/'", path))
                        .at(&node.loc),
                );
            }

            let auth = node.get("auth");
            let auth_type = match auth.map(|a| (a.as_str(), a)) {
                Some((Some(kind), _)) => kind.to_string(),
                Some((None, a)) => a.str_field("type").unwrap_or_else(|| "jwt".to_string()),
                None => "none".to_string(),
            };
            let auth_list = |key: &str| auth.map(|a| a.str_list(key)).unwrap_or_default();
            let auth_str = |key: &str| auth.and_then(|a| a.str_field(key));

            let rate_limit = node.get("rate_limit").map(|r| RateLimit {
                rps: r.get("rps").and_then(Node::as_i64).unwrap_or(10).max(0) as u32,
                burst: r.get("burst").and_then(Node::as_i64).unwrap_or(20).max(0) as u32,
            });
            let pagination = node.get("pagination").map(|p| Pagination {
                kind: p.str_field("type").unwrap_or_else(|| "offset".to_string()),
                default_limit: p.get("default_limit").and_then(Node::as_i64).unwrap_or(20).max(1) as u32,
                max_limit: p.get("max_limit").and_then(Node::as_i64).unwrap_or(100).max(1) as u32,
            });
            let test_hints = node.get("test_hints").map(|h| TestHints {
                happy_path: h.str_field("happy_path"),
                error_cases: h.str_list("error_cases"),
            });
            let cache = node.get("cache").map(|c| CachePolicy {
                ttl: c.str_field("ttl").unwrap_or_else(|| "5m".to_string()),
                tags: c.str_list("tags"),
            });

            out.push(EndpointDef {
                method,
                path,
                service,
                rpc,
                description: node.str_field("description").unwrap_or_default(),
                auth_type,
                roles: auth_list("roles"),
                permission: auth_str("permission"),
                check: auth_str("check"),
                inject: auth_list("inject"),
                middleware: node.str_list("middleware"),
                rate_limit,
                timeout: node.str_field("timeout"),
                cache,
                invalidate: node.str_list("invalidate"),
                idempotent: node.bool_field("idempotent"),
                errors: node.str_list("errors"),
                pagination,
                test_hints,
                messages: node.str_list("messages"),
                room_param: node.str_field("room_param"),
                source: node.loc.clone(),
            });
        }
        Ok(out)
    }

    pub fn extract_events(&mut self, api: &Node) -> Result<Vec<EventDef>, NormalizeError> {
        let mut out = Vec::new();
        let Some(events) = api.get("events") else {
            return Ok(out);
        };
        for (name, node) in events.members() {
            self.check_fields(node, &["fields", "external", "description"], &format!("event {}", name));
            let fields = match node.get("fields") {
                Some(fields) => self.fields(fields, name)?,
                None => Vec::new(),
            };
            out.push(EventDef {
                name: name.clone(),
                fields,
                external: node.bool_field("external"),
                source: node.loc.clone(),
            });
        }
        Ok(out)
    }

    pub fn extract_errors(&mut self, api: &Node) -> Result<Vec<ErrorDef>, NormalizeError> {
        let mut out = Vec::new();
        let Some(errors) = api.get("errors") else {
            return Ok(out);
        };
        for (name, node) in errors.members() {
            self.check_fields(node, &["code", "http_status", "message"], &format!("error {}", name));
            let http_status = node.get("http_status").and_then(Node::as_i64).unwrap_or(400);
            if !(100..=599).contains(&http_status) {
                return Err(NormalizeError::invalid(
                    node,
                    format!("error {} has invalid http_status {}", name, http_status),
                ));
            }
            out.push(ErrorDef {
                name: name.clone(),
                code: node.get("code").and_then(Node::as_i64).unwrap_or(0),
                http_status: http_status as u16,
                message: node.str_field("message").unwrap_or_else(|| name.clone()),
                source: node.loc.clone(),
            });
        }
        Ok(out)
    }

    pub fn extract_schedules(&mut self, api: &Node) -> Result<Vec<ScheduleDef>, NormalizeError> {
        let mut out = Vec::new();
        let Some(schedules) = api.get("schedules") else {
            return Ok(out);
        };
        for (name, node) in schedules.members() {
            self.check_fields(
                node,
                &["service", "action", "cron", "every", "publish"],
                &format!("schedule {}", name),
            );
            let cron = node.str_field("cron");
            let every = node.str_field("every");
            if cron.is_none() && every.is_none() {
                return Err(NormalizeError::invalid(
                    node,
                    format!("schedule {} needs cron or every", name),
                ));
            }
            out.push(ScheduleDef {
                name: name.clone(),
                service: node.str_field("service").unwrap_or_default(),
                action: node.str_field("action").unwrap_or_default(),
                cron,
                every,
                publish: node.str_field("publish"),
                source: node.loc.clone(),
            });
        }
        Ok(out)
    }

    pub fn extract_scenarios(&mut self, api: &Node) -> Result<Vec<ScenarioDef>, NormalizeError> {
        let mut out = Vec::new();
        let Some(scenarios) = api.get("scenarios") else {
            return Ok(out);
        };
        for (name, node) in scenarios.members() {
            let mut steps = Vec::new();
            for (i, step) in node
                .get("steps")
                .and_then(Node::as_array)
                .unwrap_or_default()
                .iter()
                .enumerate()
            {
                let json_map = |key: &str| -> BTreeMap<String, serde_json::Value> {
                    step.get(key)
                        .map(|n| {
                            n.members()
                                .iter()
                                .map(|(k, v)| (k.clone(), v.to_json()))
                                .collect()
                        })
                        .unwrap_or_default()
                };
                let export = step
                    .get("export")
                    .map(|n| {
                        n.members()
                            .iter()
                            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                            .collect()
                    })
                    .unwrap_or_default();
                steps.push(ScenarioStep {
                    name: step.str_field("name").unwrap_or_else(|| format!("step{}", i + 1)),
                    action: step.str_field("action").unwrap_or_default(),
                    input: json_map("input"),
                    expect_status: step
                        .get("expect_status")
                        .and_then(Node::as_i64)
                        .unwrap_or(200) as u16,
                    expect_body: json_map("expect_body"),
                    export,
                });
            }
            out.push(ScenarioDef {
                name: name.clone(),
                description: node.str_field("description").unwrap_or_default(),
                steps,
                source: node.loc.clone(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_relaxed_json;
    use std::path::Path;

    #[test]
    fn endpoints_resolve_auth_shapes() {
        let api = parse_relaxed_json(
            r#"{"endpoints": [
                {"method": "post", "path": "/auth/login", "service": "Auth", "rpc": "Login"},
                {"method": "GET", "path": "/orders/{id}", "service": "Orders", "rpc": "Get",
                 "auth": {"roles": ["admin"], "permission": "orders.get"}},
                {"method": "DELETE", "path": "/orders/{id}", "service": "Orders", "rpc": "Delete", "auth": "api_key"},
            ]}"#,
            "cue/api/http.json",
        )
        .unwrap();
        let mut n = Normalizer::new(Path::new("."));
        let eps = n.extract_endpoints(&api).unwrap();
        assert_eq!(eps[0].method, "POST");
        assert_eq!(eps[0].auth_type, "none");
        assert_eq!(eps[1].auth_type, "jwt");
        assert_eq!(eps[1].roles, vec!["admin"]);
        assert_eq!(eps[2].auth_type, "api_key");
    }

    #[test]
    fn rejects_unknown_verbs_and_bad_status() {
        let mut n = Normalizer::new(Path::new("."));
        let api = parse_relaxed_json(
            r#"{"endpoints": [{"method": "TRACE", "path": "/x", "service": "S", "rpc": "R"}]}"#,
            "a.json",
        )
        .unwrap();
        assert!(n.extract_endpoints(&api).is_err());

        let api = parse_relaxed_json(r#"{"errors": {"Boom": {"http_status": 999}}}"#, "a.json").unwrap();
        assert!(n.extract_errors(&api).is_err());
    }
}
