//! Template catalogue and notification policy checks.

use ang_ir::Schema;

const ENGINES: &[&str] = &["go_template", "plain", "json"];
const CHANNEL_KINDS: &[&str] = &["email", "sms", "push", "slack", "webhook", "in_app"];

fn channel_known(schema: &Schema, channel: &str) -> bool {
    CHANNEL_KINDS.contains(&channel)
        || schema
            .notifications
            .channels
            .iter()
            .any(|c| c.name == channel)
}

fn channel_kind<'a>(schema: &'a Schema, channel: &'a str) -> &'a str {
    schema
        .notifications
        .channels
        .iter()
        .find(|c| c.name == channel)
        .map(|c| c.kind.as_str())
        .unwrap_or(channel)
}

pub(super) fn check_templates(schema: &Schema, errors: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    for t in &schema.templates {
        if !seen.insert(t.name.as_str()) {
            errors.push(format!("template {} is declared more than once", t.name));
        }
        if !ENGINES.contains(&t.engine.as_str()) {
            errors.push(format!(
                "template {} uses unknown engine '{}' (expected {})",
                t.name,
                t.engine,
                ENGINES.join(", ")
            ));
        }
        if !channel_known(schema, &t.channel) {
            errors.push(format!("template {} targets unknown channel '{}'", t.name, t.channel));
            continue;
        }
        let kind = channel_kind(schema, &t.channel);
        if kind == "email" && t.subject.trim().is_empty() {
            errors.push(format!("email template {} has no subject", t.name));
        }
        if kind != "email" && !t.html.is_empty() {
            errors.push(format!(
                "template {} has an html body but channel '{}' is not email",
                t.name, t.channel
            ));
        }
        if t.engine == "json" && kind == "email" {
            errors.push(format!("template {} uses the json engine on an email channel", t.name));
        }
    }
}

pub(super) fn check_notifications(schema: &Schema, errors: &mut Vec<String>) {
    for p in &schema.notifications.policies {
        if schema.event(&p.event).is_none() {
            errors.push(format!(
                "notification policy {} listens to unknown event '{}'",
                p.name, p.event
            ));
        }
        if !channel_known(schema, &p.channel) {
            errors.push(format!(
                "notification policy {} uses unknown channel '{}'",
                p.name, p.channel
            ));
        }
        match schema.templates.iter().find(|t| t.name == p.template) {
            None => errors.push(format!(
                "notification policy {} uses unknown template '{}'",
                p.name, p.template
            )),
            Some(t) if channel_kind(schema, &t.channel) != channel_kind(schema, &p.channel) => {
                errors.push(format!(
                    "notification policy {} sends template {} ({}) over channel '{}'",
                    p.name, t.name, t.channel, p.channel
                ))
            }
            Some(_) => {}
        }
    }
}
