//! IR builder: normalized definitions -> [`Schema`].
//!
//! Resolves declared type strings to the canonical lattice, links
//! endpoints to services, builds finder predicates, orders services by
//! dependency and attaches infra sections. Reference checks live in
//! [`crate::validate`]; this module only fails on input it cannot shape.

use std::collections::HashMap;

use ang_ir::flow::walk_steps;
use ang_ir::{
    Config, Direction, Endpoint, EndpointAuth, Entity, Event, Field, FieldConstraints, FinderAction,
    FlowAction, Method, OrderBy, Predicate, PredicateKind, PredicateOp, Repository, Schema,
    Service, ServiceRequirements, TypeRef, IR_VERSION,
};

use crate::defs::{EndpointDef, EntityDef, FieldDef, FinderDef, NormalizedSet, ServiceDef};
use crate::depsort::sort_services;
use crate::error::{ContractError, ErrorCode};
use crate::normalize::path_params;
use crate::validate::validate_ir_semantics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub usize);

/// Name -> position table for entities.
struct EntityTable<'a> {
    by_name: HashMap<&'a str, EntityId>,
    defs: &'a [EntityDef],
}

impl<'a> EntityTable<'a> {
    fn build(defs: &'a [EntityDef]) -> Result<Self, ContractError> {
        let mut by_name = HashMap::new();
        for (i, e) in defs.iter().enumerate() {
            if by_name.insert(e.name.as_str(), EntityId(i)).is_some() {
                return Err(ContractError::new(
                    ErrorCode::IrConvertTransform,
                    "index entities",
                    format!("{}: duplicate entity '{}'", e.source, e.name),
                ));
            }
        }
        Ok(EntityTable { by_name, defs })
    }

    fn get(&self, name: &str) -> Option<&'a EntityDef> {
        self.by_name.get(name).map(|id| &self.defs[id.0])
    }
}

/// Build the IR from a normalized set, then validate it.
pub fn convert_and_transform(set: NormalizedSet) -> Result<Schema, ContractError> {
    let schema = convert(set)?;
    validate_ir_semantics(&schema)?;
    Ok(schema)
}

/// Build the IR without running semantic validation.
pub fn convert(set: NormalizedSet) -> Result<Schema, ContractError> {
    let table = EntityTable::build(&set.entities)?;

    let entities = set
        .entities
        .iter()
        .map(convert_entity)
        .collect::<Result<Vec<_>, _>>()?;

    let events = set
        .events
        .iter()
        .map(|e| {
            Ok(Event {
                name: e.name.clone(),
                fields: convert_fields(&e.name, &e.fields)?,
                external: e.external,
                source: e.source.clone(),
            })
        })
        .collect::<Result<Vec<_>, ContractError>>()?;

    let services = set
        .services
        .iter()
        .map(|s| convert_service(s, &table))
        .collect::<Vec<_>>();
    let services = sort_services(services)?;

    let endpoints = set.endpoints.iter().map(convert_endpoint).collect();

    let repos = set
        .repos
        .iter()
        .map(|r| {
            let entity = table.get(&r.entity);
            Ok(Repository {
                entity: r.entity.clone(),
                finders: r
                    .finders
                    .iter()
                    .map(|f| convert_finder(&r.entity, f, entity))
                    .collect::<Result<Vec<_>, ContractError>>()?,
                source: r.source.clone(),
            })
        })
        .collect::<Result<Vec<_>, ContractError>>()?;

    let config = Config {
        fields: convert_fields("config", &set.config.fields)?,
    };

    let mut auth = set.auth.clone();
    if let (Some(auth), Some(service)) = (auth.as_mut(), set.context_patch.auth_overrides.get("service")) {
        auth.service = Some(service.clone());
    }

    let mut metadata = std::collections::BTreeMap::new();
    let patch = &set.context_patch;
    metadata.insert("force_cache".to_string(), patch.force_cache.into());
    metadata.insert("force_sql".to_string(), patch.force_sql.into());
    metadata.insert("notification_muting".to_string(), patch.notification_muting.into());
    if !set.policy_violations.is_empty() {
        metadata.insert(
            "policy_violations".to_string(),
            serde_json::to_value(&set.policy_violations).unwrap_or_default(),
        );
    }

    Ok(Schema {
        ir_version: IR_VERSION.to_string(),
        project: set.project.clone(),
        targets: set.targets.clone(),
        entities,
        services,
        events,
        errors: set.errors.clone(),
        endpoints,
        repos,
        config,
        auth,
        rbac: set.rbac.clone(),
        schedules: set.schedules.clone(),
        views: set.views.clone(),
        scenarios: set.scenarios.clone(),
        notifications: set.notifications.clone(),
        templates: set.templates.clone(),
        metadata,
    })
}

fn convert_entity(e: &EntityDef) -> Result<Entity, ContractError> {
    Ok(Entity {
        name: e.name.clone(),
        description: e.description.clone(),
        owner: e.owner.clone(),
        storage: e.storage.clone(),
        dto_only: e.dto_only,
        fields: convert_fields(&e.name, &e.fields)?,
        fsm: e.fsm.clone(),
        indexes: e.indexes.clone(),
        invariants: e.invariants.clone(),
        source: e.source.clone(),
    })
}

fn convert_fields(owner: &str, fields: &[FieldDef]) -> Result<Vec<Field>, ContractError> {
    fields
        .iter()
        .map(|f| {
            let ty = TypeRef::parse(&f.ty).map_err(|e| {
                ContractError::new(
                    ErrorCode::IrConvertTransform,
                    "resolve types",
                    format!("{}: {}.{}: {}", f.source, owner, f.name, e),
                )
            })?;
            Ok(Field {
                name: f.name.clone(),
                ty,
                optional: f.optional,
                default: f.default.clone(),
                constraints: FieldConstraints {
                    validate: f.validate.clone(),
                    unique: f.unique,
                    index: f.index,
                    primary_key: f.primary_key,
                    enum_values: f.enum_values.clone(),
                },
                secret: f.secret,
                pii: f.pii,
                env: f.env.clone(),
                source: f.source.clone(),
            })
        })
        .collect()
}

fn convert_service(s: &ServiceDef, table: &EntityTable<'_>) -> Service {
    let methods: Vec<Method> = s
        .methods
        .iter()
        .map(|m| Method {
            name: m.name.clone(),
            description: m.description.clone(),
            input: m.input.clone(),
            output: m.output.clone(),
            flow: m.flow.clone(),
            publishes: m.publishes.clone(),
            throws: m.throws.clone(),
            cache: m.cache.clone(),
            idempotent: m.idempotent,
            implementation: m.implementation.clone(),
            source: m.source.clone(),
        })
        .collect();
    let requires = requirements(s, &methods, table);
    Service {
        name: s.name.clone(),
        description: s.description.clone(),
        methods,
        publishes: s.publishes.clone(),
        subscribes: s.subscribes.clone(),
        uses: s.uses.clone(),
        requires,
        source: s.source.clone(),
    }
}

/// Infrastructure a service touches, derived from its flows.
fn requirements(s: &ServiceDef, methods: &[Method], table: &EntityTable<'_>) -> ServiceRequirements {
    let mut req = ServiceRequirements {
        nats: !s.publishes.is_empty() || !s.subscribes.is_empty(),
        ..ServiceRequirements::default()
    };
    for m in methods {
        if m.cache.is_some() {
            req.redis = true;
        }
        if !m.publishes.is_empty() {
            req.nats = true;
        }
        walk_steps(&m.flow, &mut |step| match &step.action {
            a if a.is_repo() => {
                let mongo = step
                    .arg_str("source")
                    .and_then(|name| table.get(name))
                    .and_then(|e| e.storage.as_deref())
                    .is_some_and(|st| st.eq_ignore_ascii_case("mongo") || st.eq_ignore_ascii_case("mongodb"));
                if mongo {
                    req.mongo = true;
                } else {
                    req.sql = true;
                }
            }
            FlowAction::TxBlock => req.sql = true,
            FlowAction::CacheGet | FlowAction::CacheSet | FlowAction::RateLimitCheck => req.redis = true,
            FlowAction::EventPublish => req.nats = true,
            FlowAction::StorageUpload => req.s3 = true,
            _ => {}
        });
    }
    req
}

fn convert_endpoint(e: &EndpointDef) -> Endpoint {
    let params = path_params(&e.path);
    let room_param = match &e.room_param {
        Some(room) => Some(room.clone()),
        None if e.method == "WS" => params.first().cloned(),
        None => None,
    };
    Endpoint {
        method: e.method.clone(),
        path: e.path.clone(),
        service: e.service.clone(),
        rpc: e.rpc.clone(),
        description: e.description.clone(),
        auth: EndpointAuth {
            kind: e.auth_type.clone(),
            roles: e.roles.clone(),
            permission: e.permission.clone(),
            check: e.check.clone(),
            inject: e.inject.clone(),
        },
        middleware: e.middleware.clone(),
        rate_limit: e.rate_limit.clone(),
        timeout: e.timeout.clone(),
        cache: e.cache.clone(),
        invalidate: e.invalidate.clone(),
        idempotent: e.idempotent,
        errors: e.errors.clone(),
        pagination: e.pagination.clone(),
        test_hints: e.test_hints.clone(),
        messages: e.messages.clone(),
        room_param,
        path_params: params,
        source: e.source.clone(),
    }
}

fn convert_finder(
    entity_name: &str,
    f: &FinderDef,
    entity: Option<&EntityDef>,
) -> Result<ang_ir::Finder, ContractError> {
    let fail = |msg: String| {
        ContractError::new(
            ErrorCode::IrConvertTransform,
            "build repository predicates",
            format!("{}: {}.{}: {}", f.source, entity_name, f.name, msg),
        )
    };
    let action = FinderAction::parse(&f.action).ok_or_else(|| fail(format!("unknown finder action '{}'", f.action)))?;

    let mut predicates = Vec::with_capacity(f.filters.len());
    for w in &f.filters {
        let op = PredicateOp::parse(&w.op).ok_or_else(|| fail(format!("unknown operator '{}'", w.op)))?;
        let declared = match &w.param_type {
            Some(raw) => Some(TypeRef::parse(raw).map_err(|e| fail(e.to_string()))?),
            None => None,
        };
        let field_ty = entity
            .and_then(|e| e.fields.iter().find(|fd| fd.name == w.field))
            .and_then(|fd| TypeRef::parse(&fd.ty).ok());
        let param_ty = match (declared, op) {
            (Some(ty), _) => ty,
            (None, PredicateOp::In) => TypeRef::array(field_ty.unwrap_or(TypeRef::String)),
            (None, _) => field_ty.unwrap_or(TypeRef::String),
        };
        predicates.push(Predicate {
            field: w.field.clone(),
            op,
            param: w.param.clone(),
            param_ty,
        });
    }

    let order_by = f.order_by.as_ref().map(|field| OrderBy {
        field: field.clone(),
        direction: match f.direction.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("desc") => Direction::Desc,
            _ => Direction::Asc,
        },
    });

    Ok(ang_ir::Finder {
        name: f.name.clone(),
        action,
        returns: f.returns.clone(),
        select: f.select.clone(),
        predicate_kind: predicate_kind(&predicates),
        predicates,
        order_by,
        limit: f.limit,
        for_update: f.for_update,
        custom_sql: f.custom_sql.clone(),
        source: f.source.clone(),
    })
}

/// Strongest operator wins: `IN` over comparison over equality.
fn predicate_kind(predicates: &[Predicate]) -> PredicateKind {
    if predicates.is_empty() {
        PredicateKind::None
    } else if predicates.iter().any(|p| p.op == PredicateOp::In) {
        PredicateKind::In
    } else if predicates.iter().any(|p| p.op != PredicateOp::Eq) {
        PredicateKind::Comparison
    } else {
        PredicateKind::Equality
    }
}
