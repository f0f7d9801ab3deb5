//! IR semantic validation.
//!
//! Every check appends plain messages to one list; nothing short-circuits.
//! A non-empty list fails the IR stage with all messages sorted, so the
//! same input always reports the same text.

mod catalog;
mod refs;
mod scope;

use ang_ir::Schema;

use crate::error::{ContractError, ErrorCode};

pub use scope::check_flow_scopes;

/// Check references, flow scopes and the template catalogue.
pub fn validate_ir_semantics(schema: &Schema) -> Result<(), ContractError> {
    let mut errors = collect_errors(schema);
    if errors.is_empty() {
        return Ok(());
    }
    errors.sort();
    errors.dedup();
    let body = errors
        .iter()
        .map(|e| format!(" - {}", e))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ContractError::new(
        ErrorCode::IrSemanticValidate,
        "validate ir",
        format!("ir semantic validation failed:\n{}", body),
    ))
}

/// Every semantic violation in `schema`, unsorted.
pub fn collect_errors(schema: &Schema) -> Vec<String> {
    let mut errors = Vec::new();
    refs::check_types(schema, &mut errors);
    refs::check_services(schema, &mut errors);
    refs::check_endpoints(schema, &mut errors);
    refs::check_events(schema, &mut errors);
    refs::check_repos_and_views(schema, &mut errors);
    for svc in &schema.services {
        for m in &svc.methods {
            check_flow_scopes(&svc.name, m, &mut errors);
        }
    }
    catalog::check_templates(schema, &mut errors);
    catalog::check_notifications(schema, &mut errors);
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use ang_ir::{Endpoint, Entity, Field, Method, Service, TypeRef};

    #[test]
    fn errors_are_sorted_and_joined() {
        let schema = Schema {
            entities: vec![Entity {
                name: "Order".into(),
                fields: vec![
                    Field::new("id", TypeRef::String),
                    Field::new("owner", TypeRef::entity("Customer")),
                ],
                ..Entity::default()
            }],
            services: vec![Service {
                name: "Orders".into(),
                methods: vec![Method {
                    name: "Get".into(),
                    ..Method::default()
                }],
                ..Service::default()
            }],
            endpoints: vec![Endpoint {
                method: "GET".into(),
                path: "/orders".into(),
                service: "Orders".into(),
                rpc: "List".into(),
                ..Endpoint::default()
            }],
            ..Schema::default()
        };
        let err = validate_ir_semantics(&schema).unwrap_err();
        assert_eq!(err.code, ErrorCode::IrSemanticValidate);
        let lines: Vec<&str> = err.cause.lines().collect();
        assert_eq!(lines[0], "ir semantic validation failed:");
        assert!(lines[1].contains("endpoint GET /orders"), "{}", err.cause);
        assert!(lines[2].contains("Order.owner references unknown type 'Customer'"), "{}", err.cause);
    }

    #[test]
    fn empty_schema_is_valid() {
        assert!(validate_ir_semantics(&Schema::default()).is_ok());
    }
}
