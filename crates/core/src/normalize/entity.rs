use std::collections::BTreeMap;

use ang_ir::{Fsm, Index};

use super::{NormalizeError, Normalizer};
use crate::defs::{EntityDef, FieldDef};
use crate::diagnostic::Warning;
use crate::loader::{file_stem, Node, NodeValue};

const ENTITY_FIELDS: &[&str] = &[
    "@owner",
    "@storage",
    "@dto",
    "description",
    "fields",
    "fsm",
    "indexes",
    "invariants",
];

const FIELD_KEYS: &[&str] = &[
    "type",
    "optional",
    "default",
    "validate",
    "unique",
    "index",
    "primary_key",
    "secret",
    "pii",
    "env",
    "enum",
    "description",
];

/// File stems that hold shared types rather than one owner's entities.
const SHARED_STEMS: &[&str] = &["domain", "types", "common"];

impl Normalizer {
    pub fn extract_entities(&mut self, domain: &Node) -> Result<Vec<EntityDef>, NormalizeError> {
        let mut out = Vec::new();
        for (name, node) in domain.members() {
            if !node.is_object() {
                return Err(NormalizeError::invalid(
                    node,
                    format!("entity '{}' must be an object, found {}", name, node.kind()),
                ));
            }
            out.push(self.entity(name, node)?);
        }
        Ok(out)
    }

    fn entity(&mut self, name: &str, node: &Node) -> Result<EntityDef, NormalizeError> {
        self.check_fields(node, ENTITY_FIELDS, &format!("entity {}", name));

        let stem = file_stem(&node.loc);
        let owner = node.str_field("@owner").or_else(|| {
            (!stem.is_empty() && !SHARED_STEMS.contains(&stem)).then(|| stem.to_string())
        });

        let fields = match node.get("fields") {
            Some(fields) => self.fields(fields, name)?,
            None => {
                self.push(
                    Warning::warn("EMPTY_ENTITY", format!("entity {} declares no fields", name))
                        .at(&node.loc),
                );
                Vec::new()
            }
        };

        let fsm = node.get("fsm").map(|f| self.fsm(f, name));
        let indexes = node
            .get("indexes")
            .and_then(Node::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        let fields = item.str_list("fields");
                        let index_name = item.str_field("name").unwrap_or_else(|| {
                            format!("idx_{}_{}", name, fields.join("_")).to_lowercase()
                        });
                        Index {
                            name: index_name,
                            fields,
                            unique: item.bool_field("unique"),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(EntityDef {
            name: name.to_string(),
            description: node.str_field("description").unwrap_or_default(),
            owner,
            storage: node.str_field("@storage"),
            dto_only: node.bool_field("@dto"),
            fields,
            fsm,
            indexes,
            invariants: node.str_list("invariants"),
            source: node.loc.clone(),
        })
    }

    /// Parse a `{name: type | {type, ...}}` map. Used for entities, events,
    /// config and inline method shapes.
    pub(crate) fn fields(&mut self, node: &Node, owner: &str) -> Result<Vec<FieldDef>, NormalizeError> {
        let mut out = Vec::new();
        for (name, value) in node.members() {
            let field = match &value.value {
                NodeValue::String(ty) => {
                    let (ty, optional) = split_optional(ty);
                    FieldDef {
                        optional,
                        source: value.loc.clone(),
                        ..FieldDef::new(name, ty)
                    }
                }
                NodeValue::Object(_) => {
                    self.check_fields(value, FIELD_KEYS, &format!("field {}.{}", owner, name));
                    let Some(raw) = value.str_field("type") else {
                        return Err(NormalizeError::invalid(
                            value,
                            format!("field {}.{} has no type", owner, name),
                        ));
                    };
                    let (ty, optional) = split_optional(&raw);
                    FieldDef {
                        name: name.clone(),
                        ty: ty.to_string(),
                        optional: optional || value.bool_field("optional"),
                        default: value.get("default").map(Node::to_json),
                        validate: value.str_field("validate"),
                        unique: value.bool_field("unique"),
                        index: value.bool_field("index"),
                        primary_key: value.bool_field("primary_key"),
                        secret: value.bool_field("secret"),
                        pii: value.bool_field("pii"),
                        env: value.str_field("env"),
                        enum_values: value.str_list("enum"),
                        source: value.loc.clone(),
                    }
                }
                _ => {
                    return Err(NormalizeError::invalid(
                        value,
                        format!(
                            "field {}.{} must be a type string or object, found {}",
                            owner,
                            name,
                            value.kind()
                        ),
                    ))
                }
            };
            out.push(field);
        }
        Ok(out)
    }

    fn fsm(&mut self, node: &Node, entity: &str) -> Fsm {
        self.check_fields(node, &["field", "states", "transitions"], &format!("fsm of {}", entity));
        let mut transitions = BTreeMap::new();
        if let Some(t) = node.get("transitions") {
            for (from, to) in t.members() {
                let targets = match &to.value {
                    NodeValue::String(s) => vec![s.clone()],
                    NodeValue::Array(items) => {
                        items.iter().filter_map(Node::as_str).map(str::to_string).collect()
                    }
                    _ => Vec::new(),
                };
                transitions.insert(from.clone(), targets);
            }
        }
        Fsm {
            field: node.str_field("field").unwrap_or_else(|| "status".to_string()),
            states: node.str_list("states"),
            transitions,
        }
    }
}

/// `"string?"` -> (`"string"`, optional).
fn split_optional(ty: &str) -> (&str, bool) {
    let ty = ty.trim();
    match ty.strip_suffix('?') {
        Some(base) => (base.trim_end(), true),
        None => (ty, false),
    }
}
