use std::collections::BTreeMap;

use ang_ir::{CachePolicy, FlowAction, FlowStep, MethodImpl};

use super::{NormalizeError, Normalizer};
use crate::defs::{EntityDef, MethodDef, ServiceDef};
use crate::diagnostic::{Severity, Warning};
use crate::flowsem;
use crate::loader::{Node, NodeValue};

const SERVICE_FIELDS: &[&str] = &["description", "uses", "publishes", "subscribes", "methods"];

const METHOD_FIELDS: &[&str] = &[
    "description",
    "input",
    "output",
    "publishes",
    "throws",
    "cache",
    "idempotent",
    "impl",
    "flow",
];

impl Normalizer {
    /// Extract services. Inline method shapes are appended to `entities` as
    /// `<Method>Request` / `<Method>Response`.
    pub fn extract_services(
        &mut self,
        domain: &Node,
        entities: &mut Vec<EntityDef>,
    ) -> Result<Vec<ServiceDef>, NormalizeError> {
        let mut out = Vec::new();
        for (name, node) in domain.members() {
            if !node.is_object() {
                return Err(NormalizeError::invalid(
                    node,
                    format!("service '{}' must be an object, found {}", name, node.kind()),
                ));
            }
            self.check_fields(node, SERVICE_FIELDS, &format!("service {}", name));

            let mut methods = Vec::new();
            if let Some(methods_node) = node.get("methods") {
                for (method_name, method_node) in methods_node.members() {
                    methods.push(self.method(name, method_name, method_node, entities)?);
                }
            }
            if methods.is_empty() {
                self.push(
                    Warning::warn("EMPTY_SERVICE", format!("service {} declares no methods", name))
                        .at(&node.loc),
                );
            }

            let mut subscribes = BTreeMap::new();
            if let Some(subs) = node.get("subscribes") {
                for (event, handler) in subs.members() {
                    let handler = handler
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Handle{}", event));
                    subscribes.insert(event.clone(), handler);
                }
            }

            out.push(ServiceDef {
                name: name.clone(),
                description: node.str_field("description").unwrap_or_default(),
                methods,
                publishes: node.str_list("publishes"),
                subscribes,
                uses: node.str_list("uses"),
                source: node.loc.clone(),
            });
        }
        Ok(out)
    }

    fn method(
        &mut self,
        service: &str,
        name: &str,
        node: &Node,
        entities: &mut Vec<EntityDef>,
    ) -> Result<MethodDef, NormalizeError> {
        if !node.is_object() {
            return Err(NormalizeError::invalid(
                node,
                format!("method {}.{} must be an object", service, name),
            ));
        }
        self.check_fields(node, METHOD_FIELDS, &format!("method {}.{}", service, name));

        let input = self.shape(node.get("input"), service, name, "Request", entities)?;
        let output = self.shape(node.get("output"), service, name, "Response", entities)?;

        let flow = match node.get("flow") {
            Some(flow) => self.flow_steps(flow)?,
            None => Vec::new(),
        };
        for issue in flowsem::validate(&flow) {
            self.push(
                Warning::new(Severity::Error, &issue.code, format!("{}.{}: {}", service, name, issue.message))
                    .with_hint(issue.hint)
                    .at(&issue.loc),
            );
        }
        self.lint_generated_values(service, name, &flow, entities);

        let cache = node.get("cache").map(|c| CachePolicy {
            ttl: c.str_field("ttl").unwrap_or_else(|| "5m".to_string()),
            tags: c.str_list("tags"),
        });

        let implementation = match node.get("impl") {
            Some(imp) => {
                self.check_fields(imp, &["lang", "code", "imports", "requires_tx", "tx"], "impl");
                let Some(code) = imp.get("code").and_then(Node::as_str) else {
                    return Err(NormalizeError::invalid(
                        imp,
                        format!("impl of {}.{} has no code", service, name),
                    ));
                };
                let code_loc = imp.get("code").map(|c| c.loc.clone()).unwrap_or_default();
                Some(MethodImpl {
                    lang: imp.str_field("lang").unwrap_or_else(|| "go".to_string()),
                    code: code.to_string(),
                    imports: imp.str_list("imports"),
                    requires_tx: imp.bool_field("requires_tx") || imp.bool_field("tx"),
                    source: code_loc,
                })
            }
            None => None,
        };

        Ok(MethodDef {
            name: name.to_string(),
            description: node.str_field("description").unwrap_or_default(),
            input,
            output,
            flow,
            publishes: node.str_list("publishes"),
            throws: node.str_list("throws"),
            cache,
            idempotent: node.bool_field("idempotent"),
            implementation,
            source: node.loc.clone(),
        })
    }

    /// Method input/output: an entity name or an inline field map.
    fn shape(
        &mut self,
        node: Option<&Node>,
        service: &str,
        method: &str,
        suffix: &str,
        entities: &mut Vec<EntityDef>,
    ) -> Result<Option<String>, NormalizeError> {
        let Some(node) = node else {
            return Ok(None);
        };
        match &node.value {
            NodeValue::String(s) if !s.trim().is_empty() => Ok(Some(s.trim().to_string())),
            NodeValue::Object(_) => {
                let mut entity_name = format!("{}{}", method, suffix);
                if entities.iter().any(|e| e.name == entity_name) {
                    entity_name = format!("{}{}{}", service, method, suffix);
                }
                let fields = self.fields(node, &entity_name)?;
                entities.push(EntityDef {
                    name: entity_name.clone(),
                    owner: Some(service.to_lowercase()),
                    dto_only: true,
                    fields,
                    source: node.loc.clone(),
                    ..EntityDef::default()
                });
                Ok(Some(entity_name))
            }
            _ => Err(NormalizeError::invalid(
                node,
                format!(
                    "{}.{} {} must be an entity name or field map",
                    service,
                    method,
                    suffix.to_lowercase()
                ),
            )),
        }
    }

    pub(crate) fn flow_steps(&mut self, node: &Node) -> Result<Vec<FlowStep>, NormalizeError> {
        let Some(items) = node.as_array() else {
            return Err(NormalizeError::invalid(node, "flow must be a list of steps"));
        };
        let mut steps = Vec::with_capacity(items.len());
        for item in items {
            if !item.is_object() {
                return Err(NormalizeError::invalid(item, "flow step must be an object"));
            }
            let action = item.get("action").and_then(Node::as_str).unwrap_or("");
            let mut step = FlowStep::new(FlowAction::parse(action));
            step.source = item.loc.clone();
            for (key, value) in item.members() {
                match key.as_str() {
                    "action" => {}
                    "_do" => step.do_steps = self.flow_steps(value)?,
                    "_then" => step.then_steps = self.flow_steps(value)?,
                    "_else" => step.else_steps = self.flow_steps(value)?,
                    "do" | "then" | "else" if value.as_array().is_some() => {
                        self.push(
                            Warning::warn(
                                "NESTED_KEY",
                                format!("nested steps under '{}' are treated as an argument", key),
                            )
                            .with_hint(format!("rename '{}' to '_{}'", key, key))
                            .at(&value.loc),
                        );
                        step.args.insert(key.clone(), value.to_json());
                    }
                    _ => {
                        step.args.insert(key.clone(), value.to_json());
                    }
                }
            }
            steps.push(step);
        }
        Ok(steps)
    }

    /// Values built by `mapping.Map` and later saved must get an ID (and a
    /// creation timestamp when the entity has one).
    fn lint_generated_values(&mut self, service: &str, method: &str, flow: &[FlowStep], entities: &[EntityDef]) {
        let mut mapped: Vec<(&str, &str, &FlowStep)> = Vec::new();
        let mut assigned: Vec<String> = Vec::new();
        let mut saved: Vec<&str> = Vec::new();
        ang_ir::flow::walk_steps(flow, &mut |step| match step.action {
            FlowAction::MappingMap => {
                if let (Some(out), Some(entity)) = (step.arg_str("output"), step.arg_str("entity")) {
                    mapped.push((out, entity, step));
                }
            }
            FlowAction::MappingAssign => {
                if let Some(to) = step.arg_str("to") {
                    assigned.push(to.to_ascii_lowercase());
                }
            }
            FlowAction::RepoSave => {
                if let Some(input) = step.arg_str("input") {
                    saved.push(input);
                }
            }
            _ => {}
        });

        for (var, entity_name, step) in mapped {
            if !saved.contains(&var) {
                continue;
            }
            let Some(entity) = entities.iter().find(|e| e.name == entity_name) else {
                continue;
            };
            let mapped_fields: Vec<String> = step
                .args
                .get("fields")
                .and_then(|f| f.as_object())
                .map(|m| m.keys().map(|k| k.to_ascii_lowercase()).collect())
                .unwrap_or_default();
            let is_set = |field: &str| {
                let bare = field.replace('_', "");
                mapped_fields.iter().any(|f| f.replace('_', "") == bare)
                    || assigned
                        .iter()
                        .any(|a| a.replace('_', "") == format!("{}.{}", var.to_ascii_lowercase(), bare))
            };
            for (field, code) in [("id", "MISSING_ID"), ("created_at", "MISSING_CREATED_AT")] {
                let declared = entity.fields.iter().any(|f| f.name.eq_ignore_ascii_case(field));
                if declared && !is_set(field) {
                    self.push(
                        Warning::warn(
                            code,
                            format!(
                                "{}.{}: '{}' is saved without assigning {}",
                                service, method, var, field
                            ),
                        )
                        .with_hint(format!(
                            "{{\"action\": \"mapping.Assign\", \"to\": \"{}.{}\", \"value\": ...}}",
                            var, field
                        ))
                        .at(&step.source),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_relaxed_json;
    use std::path::Path;

    fn run(src: &str) -> (Vec<ServiceDef>, Vec<EntityDef>, Vec<Warning>) {
        let node = parse_relaxed_json(src, "cue/architecture/svc.json").unwrap();
        let mut n = Normalizer::new(Path::new("."));
        let mut entities = Vec::new();
        let services = n.extract_services(&node, &mut entities).unwrap();
        (services, entities, n.take_warnings())
    }

    #[test]
    fn inline_shapes_become_message_entities() {
        let (services, entities, warnings) = run(
            r#"{"Auth": {"methods": {"Login": {
                "input": {"email": "string", "password": "string"},
                "output": {"token": "string"},
            }}}}"#,
        );
        let login = &services[0].methods[0];
        assert_eq!(login.input.as_deref(), Some("LoginRequest"));
        assert_eq!(login.output.as_deref(), Some("LoginResponse"));
        assert_eq!(entities.len(), 2);
        assert!(entities[0].dto_only);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn nested_flow_lists_and_contract_issues() {
        let (services, _, warnings) = run(
            r#"{"Orders": {"methods": {"Update": {
                "input": "UpdateOrderRequest",
                "flow": [
                    {"action": "repo.Find", "source": "Order", "input": "req.ID", "output": "order", "error": "Order not found"},
                    {"action": "flow.If", "cond": "order.Status == \"draft\"", "_then": [
                        {"action": "repo.Save", "source": "Order", "input": "order"},
                    ]},
                    {"action": "logic.Check", "condition": "order.Total > 0"},
                ],
            }}}}"#,
        );
        let flow = &services[0].methods[0].flow;
        assert_eq!(flow[1].then_steps.len(), 1);
        assert_eq!(flow[1].then_steps[0].source.path, "Orders.methods.Update.flow[1]._then[0]");
        let codes: Vec<&str> = warnings.iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec!["MISSING_THROW"]);
        assert_eq!(warnings[0].line, 8);
    }

    #[test]
    fn mapped_value_saved_without_id_is_flagged() {
        let node = parse_relaxed_json(
            r#"{"Orders": {"methods": {"Create": {"flow": [
                {"action": "mapping.Map", "entity": "Order", "output": "order", "fields": {"Total": "req.Total"}},
                {"action": "repo.Save", "source": "Order", "input": "order"},
            ]}}}}"#,
            "cue/architecture/orders.json",
        )
        .unwrap();
        let mut n = Normalizer::new(Path::new("."));
        let mut entities = vec![EntityDef {
            name: "Order".into(),
            fields: vec![
                crate::defs::FieldDef::new("id", "uuid"),
                crate::defs::FieldDef::new("total", "int"),
            ],
            ..EntityDef::default()
        }];
        n.extract_services(&node, &mut entities).unwrap();
        let codes: Vec<String> = n.take_warnings().into_iter().map(|w| w.code).collect();
        assert_eq!(codes, vec!["MISSING_ID"]);
    }
}
