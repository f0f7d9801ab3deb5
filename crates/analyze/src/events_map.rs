//! Event flow map: who produces and who consumes each event.

use std::collections::{BTreeMap, BTreeSet};

use ang_ir::{FlowAction, Schema};
use serde::Serialize;

use crate::report::{Finding, FindingSeverity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consumer {
    pub service: String,
    pub handler: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFlow {
    pub event: String,
    /// `Service.Method` names.
    pub producers: Vec<String>,
    pub consumers: Vec<Consumer>,
}

impl EventFlow {
    pub fn producer_missing(&self) -> bool {
        self.producers.is_empty()
    }

    pub fn dead_end(&self) -> bool {
        self.consumers.is_empty()
    }
}

/// One entry per published or subscribed event, sorted by name. A method
/// produces an event it lists under `publishes` or emits through an
/// `event.Publish` step.
pub fn events_map(schema: &Schema) -> Vec<EventFlow> {
    let mut producers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut consumers: BTreeMap<String, Vec<Consumer>> = BTreeMap::new();
    for svc in &schema.services {
        for m in &svc.methods {
            let mut names: BTreeSet<String> = m.publishes.iter().cloned().collect();
            ang_ir::flow::walk_steps(&m.flow, &mut |s| {
                if s.action == FlowAction::EventPublish {
                    if let Some(name) = s.arg_str("name") {
                        names.insert(name.to_string());
                    }
                }
            });
            for name in names {
                producers
                    .entry(name)
                    .or_default()
                    .insert(format!("{}.{}", svc.name, m.name));
            }
        }
        for (event, handler) in &svc.subscribes {
            consumers.entry(event.clone()).or_default().push(Consumer {
                service: svc.name.clone(),
                handler: handler.clone(),
            });
        }
    }
    let events: BTreeSet<&String> = producers.keys().chain(consumers.keys()).collect();
    events
        .into_iter()
        .map(|e| EventFlow {
            event: e.clone(),
            producers: producers.get(e).map(|p| p.iter().cloned().collect()).unwrap_or_default(),
            consumers: consumers.get(e).cloned().unwrap_or_default(),
        })
        .collect()
}

/// Missing producers (unless the event is declared external) and dead ends.
pub fn event_findings(schema: &Schema, flows: &[EventFlow]) -> Vec<Finding> {
    let mut out = Vec::new();
    for f in flows {
        let external = schema.event(&f.event).is_some_and(|e| e.external);
        if f.producer_missing() && !external {
            out.push(
                Finding::new("events", FindingSeverity::Warning, format!("event {} has no producer", f.event))
                    .about(&f.event),
            );
        }
        if f.dead_end() {
            out.push(
                Finding::new("events", FindingSeverity::Info, format!("event {} has no subscribers", f.event))
                    .about(&f.event),
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ang_ir::{FlowStep, Method, Service};

    #[test]
    fn producers_and_consumers_are_joined() {
        let mut schema = Schema::default();
        schema.services.push(Service {
            name: "Orders".into(),
            methods: vec![
                Method {
                    name: "Create".into(),
                    publishes: vec!["OrderCreated".into()],
                    ..Method::default()
                },
                Method {
                    name: "Ship".into(),
                    flow: vec![FlowStep::new(FlowAction::EventPublish).with_arg("name", "OrderShipped")],
                    ..Method::default()
                },
            ],
            ..Service::default()
        });
        let mut billing = Service {
            name: "Billing".into(),
            ..Service::default()
        };
        billing.subscribes.insert("OrderCreated".into(), "OnOrderCreated".into());
        billing.subscribes.insert("PaymentFailed".into(), "OnPaymentFailed".into());
        schema.services.push(billing);

        let flows = events_map(&schema);
        let names: Vec<&str> = flows.iter().map(|f| f.event.as_str()).collect();
        assert_eq!(names, vec!["OrderCreated", "OrderShipped", "PaymentFailed"]);
        assert_eq!(flows[0].producers, vec!["Orders.Create"]);
        assert_eq!(flows[0].consumers[0].handler, "OnOrderCreated");
        assert!(flows[1].dead_end());
        assert!(flows[2].producer_missing());

        let findings = event_findings(&schema, &flows);
        assert_eq!(findings.len(), 2);
    }
}
