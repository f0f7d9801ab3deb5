//! Architectural invariants (`ang vet`) and the embedded-logic audit
//! (`ang vet logic`).

use ang_core::{PipelineOutput, Warning};
use ang_ir::Schema;

use crate::report::{Finding, FindingSeverity};

/// Diagnostic code of embedded snippet syntax errors.
pub const GO_SYNTAX_ERROR: &str = "GO_SYNTAX_ERROR";

/// Entities without an `id` (request/response messages excepted) and
/// services without methods.
pub fn vet_schema(schema: &Schema) -> Vec<Finding> {
    let mut out = Vec::new();
    for e in &schema.entities {
        if e.name.ends_with("Request") || e.name.ends_with("Response") {
            continue;
        }
        if !e.fields.iter().any(|f| f.name == "id") {
            out.push(
                Finding::new("vet", FindingSeverity::Error, format!("Entity '{}' has no 'id' field.", e.name))
                    .about(&e.name),
            );
        }
    }
    for s in &schema.services {
        if s.methods.is_empty() {
            out.push(
                Finding::new("vet", FindingSeverity::Error, format!("Service '{}' is empty.", s.name)).about(&s.name),
            );
        }
    }
    out
}

/// Policy violations declared under `validation_errors`, then the schema
/// invariants.
pub fn vet(output: &PipelineOutput) -> Vec<Finding> {
    let mut out: Vec<Finding> = output
        .normalized
        .policy_violations
        .iter()
        .map(|v| Finding::new("policy", FindingSeverity::Error, v.clone()))
        .collect();
    out.extend(vet_schema(&output.schema));
    out
}

/// Snippet syntax errors among `diagnostics`.
pub fn logic_errors(diagnostics: &[Warning]) -> Vec<&Warning> {
    diagnostics.iter().filter(|d| d.code == GO_SYNTAX_ERROR).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ang_ir::{Entity, Field, Method, Service, TypeRef};

    #[test]
    fn flags_missing_ids_and_empty_services() {
        let mut schema = Schema::default();
        schema.entities.push(Entity {
            name: "Audit".into(),
            fields: vec![Field::new("at", TypeRef::Time)],
            ..Entity::default()
        });
        schema.entities.push(Entity {
            name: "LoginRequest".into(),
            ..Entity::default()
        });
        schema.entities.push(Entity {
            name: "User".into(),
            fields: vec![Field::new("id", TypeRef::String)],
            ..Entity::default()
        });
        schema.services.push(Service {
            name: "Idle".into(),
            ..Service::default()
        });
        schema.services.push(Service {
            name: "Auth".into(),
            methods: vec![Method {
                name: "Login".into(),
                ..Method::default()
            }],
            ..Service::default()
        });

        let findings = vet_schema(&schema);
        let messages: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["Entity 'Audit' has no 'id' field.", "Service 'Idle' is empty."]
        );
        assert!(crate::report::has_errors(&findings));
    }

    #[test]
    fn logic_audit_keeps_syntax_errors_only() {
        let diags = vec![
            Warning::warn("UNKNOWN_FIELD", "x"),
            Warning::error(GO_SYNTAX_ERROR, "expected ';'"),
        ];
        let found = logic_errors(&diags);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "expected ';'");
    }
}
