use std::collections::BTreeMap;

use super::{NormalizeError, Normalizer};
use crate::defs::{RbacDef, ViewDef};
use crate::loader::{Node, NodeValue};

impl Normalizer {
    /// Roles and permissions. Permission names are lower-cased
    /// (`orders.create`); `validation_errors` entries are returned as
    /// `name: message` lines, sorted.
    pub fn extract_rbac(&mut self, node: &Node) -> Result<(RbacDef, Vec<String>), NormalizeError> {
        self.check_fields(node, &["roles", "permissions", "validation_errors"], "rbac");
        let mut roles = BTreeMap::new();
        if let Some(r) = node.get("roles") {
            for (role, perms) in r.members() {
                if perms.as_array().is_none() {
                    return Err(NormalizeError::invalid(
                        perms,
                        format!("role '{}' must list permissions", role),
                    ));
                }
                let list: Vec<String> = perms
                    .as_array()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Node::as_str)
                    .map(|p| p.trim().to_ascii_lowercase())
                    .collect();
                roles.insert(role.clone(), list);
            }
        }
        let mut permissions = BTreeMap::new();
        if let Some(p) = node.get("permissions") {
            match &p.value {
                NodeValue::Object(members) => {
                    for (name, desc) in members {
                        permissions.insert(
                            name.to_ascii_lowercase(),
                            desc.as_str().unwrap_or_default().to_string(),
                        );
                    }
                }
                NodeValue::Array(items) => {
                    for item in items.iter().filter_map(Node::as_str) {
                        permissions.insert(item.to_ascii_lowercase(), String::new());
                    }
                }
                _ => return Err(NormalizeError::invalid(p, "permissions must be an object or list")),
            }
        }
        let mut violations: Vec<String> = node
            .get("validation_errors")
            .map(|v| {
                v.members()
                    .iter()
                    .map(|(k, msg)| match msg.as_str() {
                        Some(s) => format!("{}: {}", k, s),
                        None => format!("{}: {}", k, msg.to_json()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        violations.sort();
        Ok((RbacDef { roles, permissions }, violations))
    }

    pub fn extract_views(&mut self, domain: &Node) -> Result<Vec<ViewDef>, NormalizeError> {
        let mut out = Vec::new();
        for (name, node) in domain.members() {
            self.check_fields(node, &["entity", "roles"], &format!("view {}", name));
            let Some(entity) = node.str_field("entity") else {
                return Err(NormalizeError::invalid(node, format!("view {} needs an entity", name)));
            };
            let roles = node
                .get("roles")
                .map(|r| {
                    r.members()
                        .iter()
                        .map(|(role, _)| (role.clone(), r.str_list(role)))
                        .collect()
                })
                .unwrap_or_default();
            out.push(ViewDef {
                name: name.clone(),
                entity,
                roles,
                source: node.loc.clone(),
            });
        }
        Ok(out)
    }

    /// Sorted `name: message` lines from `cue/lint`.
    pub fn extract_lint(&mut self, node: &Node) -> Vec<String> {
        let mut out: Vec<String> = node
            .get("validation_errors")
            .map(|v| {
                v.members()
                    .iter()
                    .map(|(k, msg)| format!("{}: {}", k, msg.as_str().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();
        out.sort();
        out
    }
}
