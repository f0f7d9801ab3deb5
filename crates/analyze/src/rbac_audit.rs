//! RBAC audit.
//!
//! Actions are lower-case `service.method` names. A method is protected
//! when a permission names it; a permission naming no method is a zombie.

use std::collections::BTreeSet;

use ang_ir::Schema;
use serde::Serialize;

use crate::report::{Finding, FindingSeverity};

/// Every `service.method` action of the schema, sorted.
pub fn rbac_actions(schema: &Schema) -> BTreeSet<String> {
    schema
        .services
        .iter()
        .flat_map(|s| {
            s.methods
                .iter()
                .map(move |m| format!("{}.{}", s.name.to_lowercase(), m.name.to_lowercase()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RbacAudit {
    /// False when the project declares no policies at all.
    pub has_policies: bool,
    pub protected: Vec<String>,
    pub unprotected: Vec<String>,
    pub zombies: Vec<String>,
}

impl RbacAudit {
    pub fn findings(&self) -> Vec<Finding> {
        let mut out = Vec::new();
        for a in &self.unprotected {
            out.push(Finding::new("rbac", FindingSeverity::Warning, format!("unprotected method {}", a)).about(a));
        }
        for z in &self.zombies {
            out.push(
                Finding::new("rbac", FindingSeverity::Warning, format!("policy {} references no method", z)).about(z),
            );
        }
        out
    }
}

pub fn inspect_rbac(schema: &Schema) -> RbacAudit {
    let actions = rbac_actions(schema);
    let Some(rbac) = &schema.rbac else {
        return RbacAudit {
            has_policies: false,
            protected: Vec::new(),
            unprotected: actions.into_iter().collect(),
            zombies: Vec::new(),
        };
    };
    let mut protected = BTreeSet::new();
    let mut zombies = BTreeSet::new();
    for action in rbac.permissions.keys() {
        let action = action.to_lowercase();
        if actions.contains(&action) {
            protected.insert(action);
        } else {
            zombies.insert(action);
        }
    }
    let unprotected = actions.iter().filter(|a| !protected.contains(*a)).cloned().collect();
    RbacAudit {
        has_policies: true,
        protected: protected.into_iter().collect(),
        unprotected,
        zombies: zombies.into_iter().collect(),
    }
}
