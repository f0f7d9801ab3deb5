use super::{NormalizeError, Normalizer};
use crate::defs::{FinderDef, RepositoryDef, WhereDef};
use crate::loader::{Node, NodeValue};

const FINDER_FIELDS: &[&str] = &[
    "action",
    "returns",
    "select",
    "where",
    "order_by",
    "direction",
    "limit",
    "for_update",
    "sql",
];

impl Normalizer {
    pub fn extract_repos(&mut self, domain: &Node) -> Result<Vec<RepositoryDef>, NormalizeError> {
        let mut out = Vec::new();
        for (entity, node) in domain.members() {
            self.check_fields(node, &["finders"], &format!("repository {}", entity));
            let mut finders = Vec::new();
            if let Some(list) = node.get("finders") {
                for (name, f) in list.members() {
                    finders.push(self.finder(entity, name, f)?);
                }
            }
            out.push(RepositoryDef {
                entity: entity.clone(),
                finders,
                source: node.loc.clone(),
            });
        }
        Ok(out)
    }

    fn finder(&mut self, entity: &str, name: &str, node: &Node) -> Result<FinderDef, NormalizeError> {
        self.check_fields(node, FINDER_FIELDS, &format!("finder {}.{}", entity, name));
        let mut filters = Vec::new();
        if let Some(w) = node.get("where") {
            match &w.value {
                // {"email": "email"} shorthand: equality on field with named param.
                NodeValue::Object(members) => {
                    for (field, param) in members {
                        filters.push(WhereDef {
                            field: field.clone(),
                            op: "=".to_string(),
                            param: param.as_str().unwrap_or(field.as_str()).to_string(),
                            param_type: None,
                        });
                    }
                }
                NodeValue::Array(items) => {
                    for item in items {
                        self.check_fields(item, &["field", "op", "param", "type"], "where clause");
                        let Some(field) = item.str_field("field") else {
                            return Err(NormalizeError::invalid(item, "where clause needs a field"));
                        };
                        filters.push(WhereDef {
                            param: item.str_field("param").unwrap_or_else(|| field.clone()),
                            op: item.str_field("op").unwrap_or_else(|| "=".to_string()),
                            param_type: item.str_field("type"),
                            field,
                        });
                    }
                }
                _ => return Err(NormalizeError::invalid(w, "where must be an object or list")),
            }
        }
        let action = node.str_field("action").unwrap_or_else(|| infer_action(name).to_string());
        Ok(FinderDef {
            name: name.to_string(),
            action,
            returns: node.str_field("returns"),
            select: node.str_list("select"),
            filters,
            order_by: node.str_field("order_by"),
            direction: node.str_field("direction"),
            limit: node.get("limit").and_then(Node::as_i64).unwrap_or(0).max(0) as u32,
            for_update: node.bool_field("for_update"),
            custom_sql: node.str_field("sql"),
            source: node.loc.clone(),
        })
    }
}

/// Finder action implied by its name prefix.
fn infer_action(name: &str) -> &'static str {
    if name.starts_with("List") || name.starts_with("FindAll") {
        "list"
    } else if name.starts_with("Count") {
        "count"
    } else if name.starts_with("Exists") {
        "exists"
    } else if name.starts_with("Delete") {
        "delete"
    } else if name.starts_with("FindOne") || name.starts_with("GetBy") {
        "find_one"
    } else {
        "find"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_relaxed_json;
    use std::path::Path;

    #[test]
    fn where_shorthand_and_list_forms() {
        let node = parse_relaxed_json(
            r#"{"Order": {"finders": {
                "FindByEmail": {"where": {"email": "email"}},
                "ListRecent": {"where": [{"field": "created_at", "op": ">=", "param": "since", "type": "time"}],
                               "order_by": "created_at", "direction": "desc", "limit": 50},
            }}}"#,
            "cue/repo/order.json",
        )
        .unwrap();
        let mut n = Normalizer::new(Path::new("."));
        let repos = n.extract_repos(&node).unwrap();
        let finders = &repos[0].finders;
        assert_eq!(finders[0].action, "find");
        assert_eq!(finders[0].filters[0].op, "=");
        assert_eq!(finders[1].action, "list");
        assert_eq!(finders[1].filters[0].param_type.as_deref(), Some("time"));
        assert_eq!(finders[1].limit, 50);
    }
}
