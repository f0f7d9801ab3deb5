//! Name resolution checks.

use std::collections::HashSet;

use ang_ir::flow::walk_steps;
use ang_ir::{Field, FlowAction, Schema, SourceLoc};

pub(super) fn at(loc: &SourceLoc) -> String {
    if loc.is_known() {
        format!(" ({})", loc)
    } else {
        String::new()
    }
}

fn check_fields(owner: &str, fields: &[Field], entities: &HashSet<&str>, errors: &mut Vec<String>) {
    for f in fields {
        let mut refs = Vec::new();
        f.ty.entity_refs(&mut refs);
        for name in refs {
            if !entities.contains(name) {
                errors.push(format!(
                    "{}.{} references unknown type '{}'{}",
                    owner,
                    f.name,
                    name,
                    at(&f.source)
                ));
            }
        }
    }
}

fn entity_names(schema: &Schema) -> HashSet<&str> {
    schema.entities.iter().map(|e| e.name.as_str()).collect()
}

pub(super) fn check_types(schema: &Schema, errors: &mut Vec<String>) {
    let entities = entity_names(schema);
    for e in &schema.entities {
        check_fields(&format!("entity {}", e.name), &e.fields, &entities, errors);
        if let Some(fsm) = &e.fsm {
            if e.field(&fsm.field).is_none() {
                errors.push(format!(
                    "entity {} fsm field '{}' is not declared{}",
                    e.name,
                    fsm.field,
                    at(&e.source)
                ));
            }
            for (from, targets) in &fsm.transitions {
                for state in std::iter::once(from).chain(targets) {
                    if !fsm.states.contains(state) {
                        errors.push(format!(
                            "entity {} fsm transition uses unknown state '{}'{}",
                            e.name,
                            state,
                            at(&e.source)
                        ));
                    }
                }
            }
        }
    }
    for ev in &schema.events {
        check_fields(&format!("event {}", ev.name), &ev.fields, &entities, errors);
    }
    check_fields("config", &schema.config.fields, &entities, errors);
}

pub(super) fn check_services(schema: &Schema, errors: &mut Vec<String>) {
    let entities = entity_names(schema);
    for svc in &schema.services {
        for used in &svc.uses {
            if schema.service(used).is_none() {
                errors.push(format!(
                    "service {} uses unknown service '{}'{}",
                    svc.name,
                    used,
                    at(&svc.source)
                ));
            }
        }
        for m in &svc.methods {
            for (role, shape) in [("input", &m.input), ("output", &m.output)] {
                if let Some(name) = shape {
                    if !entities.contains(name.as_str()) {
                        errors.push(format!(
                            "method {}.{} {} references unknown entity '{}'{}",
                            svc.name,
                            m.name,
                            role,
                            name,
                            at(&m.source)
                        ));
                    }
                }
            }
            walk_steps(&m.flow, &mut |step| {
                let missing = match step.action {
                    FlowAction::LogicCall => step
                        .arg_str("method")
                        .and_then(|target| target.split_once('.'))
                        .filter(|(s, meth)| schema.method(s, meth).is_none())
                        .map(|(s, meth)| format!("calls unknown method '{}.{}'", s, meth)),
                    _ if step.action.is_repo() => step
                        .arg_str("source")
                        .filter(|src| !entities.contains(src))
                        .map(|src| format!("{} reads unknown entity '{}'", step.action, src)),
                    _ => None,
                };
                if let Some(msg) = missing {
                    errors.push(format!("method {}.{} {}{}", svc.name, m.name, msg, at(&step.source)));
                }
            });
        }
    }
    for sched in &schema.schedules {
        if schema.method(&sched.service, &sched.action).is_none() {
            errors.push(format!(
                "schedule {} targets unknown method '{}.{}'{}",
                sched.name,
                sched.service,
                sched.action,
                at(&sched.source)
            ));
        }
    }
}

pub(super) fn check_endpoints(schema: &Schema, errors: &mut Vec<String>) {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for ep in &schema.endpoints {
        if schema.method(&ep.service, &ep.rpc).is_none() {
            errors.push(format!(
                "endpoint {} {} is bound to unknown rpc '{}.{}'{}",
                ep.method,
                ep.path,
                ep.service,
                ep.rpc,
                at(&ep.source)
            ));
        }
        if !seen.insert((ep.method.as_str(), ep.path.as_str())) {
            errors.push(format!(
                "endpoint {} {} is declared more than once{}",
                ep.method,
                ep.path,
                at(&ep.source)
            ));
        }
    }
}

pub(super) fn check_events(schema: &Schema, errors: &mut Vec<String>) {
    let mut published: HashSet<&str> = HashSet::new();
    for svc in &schema.services {
        published.extend(svc.publishes.iter().map(String::as_str));
        for m in &svc.methods {
            published.extend(m.publishes.iter().map(String::as_str));
            walk_steps(&m.flow, &mut |step| {
                if step.action == FlowAction::EventPublish {
                    if let Some(name) = step.arg_str("name") {
                        published.insert(name);
                    }
                }
            });
        }
    }
    published.extend(schema.schedules.iter().filter_map(|s| s.publish.as_deref()));

    for name in &published {
        if schema.event(name).is_none() {
            errors.push(format!("published event '{}' is not declared", name));
        }
    }
    for svc in &schema.services {
        for (event, handler) in &svc.subscribes {
            match schema.event(event) {
                None => errors.push(format!(
                    "service {} subscribes to unknown event '{}'{}",
                    svc.name,
                    event,
                    at(&svc.source)
                )),
                Some(ev) if !ev.external && !published.contains(event.as_str()) => errors.push(format!(
                    "service {} subscribes to event '{}' which has no publisher and is not external{}",
                    svc.name,
                    event,
                    at(&svc.source)
                )),
                Some(_) => {}
            }
            if svc.method(handler).is_none() {
                errors.push(format!(
                    "service {} handles '{}' with unknown method '{}'{}",
                    svc.name,
                    event,
                    handler,
                    at(&svc.source)
                ));
            }
        }
    }
}

pub(super) fn check_repos_and_views(schema: &Schema, errors: &mut Vec<String>) {
    for repo in &schema.repos {
        let Some(entity) = schema.entity(&repo.entity) else {
            errors.push(format!(
                "repository for unknown entity '{}'{}",
                repo.entity,
                at(&repo.source)
            ));
            continue;
        };
        for finder in repo.finders.iter().filter(|f| f.custom_sql.is_none()) {
            let fields = finder
                .predicates
                .iter()
                .map(|p| p.field.as_str())
                .chain(finder.order_by.as_ref().map(|o| o.field.as_str()))
                .chain(finder.select.iter().map(String::as_str));
            for field in fields {
                if entity.field(field).is_none() {
                    errors.push(format!(
                        "finder {}.{} uses unknown field '{}'{}",
                        repo.entity,
                        finder.name,
                        field,
                        at(&finder.source)
                    ));
                }
            }
        }
    }
    for view in &schema.views {
        if schema.entity(&view.entity).is_none() {
            errors.push(format!(
                "view {} references unknown entity '{}'{}",
                view.name,
                view.entity,
                at(&view.source)
            ));
        }
    }
}
