//! Service dependency ordering.
//!
//! Services are indexed by position ([`ServiceId`]); `uses` edges point from
//! a service to the services it calls. Kahn's algorithm emits dependencies
//! before dependents and keeps declaration order among peers.

use std::collections::{HashMap, VecDeque};

use ang_ir::Service;

use crate::error::{ContractError, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub usize);

/// Order `services` so every service follows the services it `uses`.
///
/// Names in `uses` that match no service are ignored here; the semantic
/// validator reports them.
pub fn sort_services(services: Vec<Service>) -> Result<Vec<Service>, ContractError> {
    let ids: HashMap<&str, ServiceId> = services
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), ServiceId(i)))
        .collect();

    // deps[i] = services i depends on; dependents[j] = services that use j.
    let mut deps: Vec<Vec<ServiceId>> = vec![Vec::new(); services.len()];
    let mut dependents: Vec<Vec<ServiceId>> = vec![Vec::new(); services.len()];
    for (i, svc) in services.iter().enumerate() {
        for used in &svc.uses {
            if let Some(&dep) = ids.get(used.as_str()) {
                if !deps[i].contains(&dep) {
                    deps[i].push(dep);
                    dependents[dep.0].push(ServiceId(i));
                }
            }
        }
    }

    let mut in_degree: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut queue: VecDeque<ServiceId> = (0..services.len())
        .filter(|&i| in_degree[i] == 0)
        .map(ServiceId)
        .collect();
    let mut order: Vec<ServiceId> = Vec::with_capacity(services.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        for &next in &dependents[id.0] {
            in_degree[next.0] -= 1;
            if in_degree[next.0] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < services.len() {
        let cycle = find_cycle(&deps, &in_degree)
            .into_iter()
            .map(|id| services[id.0].name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(ContractError::new(
            ErrorCode::IrServiceDependencies,
            "sort services",
            format!("service dependency cycle: {}", cycle),
        ));
    }

    let mut slots: Vec<Option<Service>> = services.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|id| slots[id.0].take())
        .collect())
}

/// Walk `deps` from the first unprocessed service until a node repeats.
/// Every unprocessed node has at least one unprocessed dependency, so the
/// walk always closes a cycle.
fn find_cycle(deps: &[Vec<ServiceId>], in_degree: &[usize]) -> Vec<ServiceId> {
    let Some(start) = (0..deps.len()).find(|&i| in_degree[i] > 0) else {
        return Vec::new();
    };
    let mut path: Vec<ServiceId> = vec![ServiceId(start)];
    loop {
        let Some(&current) = path.last() else {
            return path;
        };
        let Some(&next) = deps[current.0].iter().find(|d| in_degree[d.0] > 0) else {
            return path;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle = path.split_off(pos);
            cycle.push(next);
            return cycle;
        }
        path.push(next);
    }
}
