//! Flow action contracts.
//!
//! Each known action declares the arguments and nested lists it needs.
//! [`validate`] walks a flow (nested lists included) and reports every
//! contract violation as an [`Issue`].

use ang_ir::{FlowStep, SourceLoc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// 1-based position within the enclosing list.
    pub step: usize,
    pub action: String,
    pub code: String,
    pub message: String,
    pub hint: String,
    pub loc: SourceLoc,
}

struct Contract {
    action: &'static str,
    args: &'static [&'static str],
    children: &'static [&'static str],
    requires_tx: bool,
}

const fn contract(
    action: &'static str,
    args: &'static [&'static str],
    children: &'static [&'static str],
) -> Contract {
    Contract {
        action,
        args,
        children,
        requires_tx: false,
    }
}

const CONTRACTS: &[Contract] = &[
    contract("repo.Find", &["source", "output"], &[]),
    contract("repo.Get", &["source", "output"], &[]),
    Contract {
        action: "repo.GetForUpdate",
        args: &["source", "output"],
        children: &[],
        requires_tx: true,
    },
    contract("repo.List", &["source", "output"], &[]),
    contract("repo.Save", &["source"], &[]),
    contract("repo.Delete", &["source"], &[]),
    contract("repo.Query", &["source", "method"], &[]),
    contract("mapping.Map", &["output"], &[]),
    contract("mapping.Assign", &["to", "value"], &[]),
    contract("logic.Check", &["condition", "throw"], &[]),
    contract("logic.Call", &["method"], &[]),
    contract("flow.If", &["condition"], &["_then"]),
    contract("flow.For", &["each", "as"], &["_do"]),
    contract("flow.Block", &[], &["_do"]),
    contract("tx.Block", &[], &["_do"]),
    contract("fsm.Transition", &["entity", "to"], &[]),
    contract("event.Publish", &["name"], &[]),
    contract("cache.Get", &["key"], &[]),
    contract("cache.Set", &["key"], &[]),
    contract("rateLimit.Check", &["key"], &[]),
    contract("storage.Upload", &["input", "output"], &[]),
    contract("mailer.Send", &["template", "to"], &[]),
];

/// Namespaces whose unknown members are tolerated (passed through as-is).
const KNOWN_PREFIXES: &[&str] = &[
    "repo.", "mapping.", "logic.", "event.", "fsm.", "flow.", "tx.", "cache.", "rateLimit.",
    "storage.", "mailer.", "list.", "notification.", "audit.", "auth.", "entity.", "field.",
    "str.", "enum.", "time.", "map.",
];

pub fn is_known_prefix(action: &str) -> bool {
    KNOWN_PREFIXES.iter().any(|p| action.starts_with(p))
}

pub fn validate(steps: &[FlowStep]) -> Vec<Issue> {
    let mut out = Vec::new();
    walk(steps, false, &mut out);
    out
}

fn has_arg(step: &FlowStep, arg: &str) -> bool {
    if arg == "condition" {
        step.condition().is_some()
    } else {
        step.arg_str(arg).is_some()
    }
}

fn walk(steps: &[FlowStep], in_tx: bool, out: &mut Vec<Issue>) {
    for (i, step) in steps.iter().enumerate() {
        let action = step.action.as_str();
        let issue = |code: String, message: String, hint: &str| Issue {
            step: i + 1,
            action: action.to_string(),
            code,
            message,
            hint: hint.to_string(),
            loc: step.source.clone(),
        };

        match CONTRACTS.iter().find(|c| c.action == action) {
            Some(c) => {
                for arg in c.args {
                    if !has_arg(step, arg) {
                        out.push(issue(
                            format!("MISSING_{}", arg.to_ascii_uppercase()),
                            format!("{} missing '{}'", action, arg),
                            "see the action contract for required arguments",
                        ));
                    }
                }
                for child in c.children {
                    let present = step.children().any(|(key, _)| key == *child);
                    if !present {
                        let bare = child.trim_start_matches('_');
                        out.push(issue(
                            format!("MISSING_{}", bare.to_ascii_uppercase()),
                            format!("{} missing '{}'", action, child),
                            "nested steps go under _do, _then or _else",
                        ));
                    }
                }
                if c.requires_tx && !in_tx {
                    out.push(issue(
                        "TX_REQUIRED".to_string(),
                        format!("{} outside tx.Block", action),
                        "{\"action\": \"tx.Block\", \"_do\": [ ... ]}",
                    ));
                }
            }
            None if action.is_empty() => out.push(issue(
                "MISSING_ACTION".to_string(),
                "flow step has no action".to_string(),
                "{\"action\": \"repo.Find\", ...}",
            )),
            None if !is_known_prefix(action) => out.push(issue(
                "UNKNOWN_ACTION".to_string(),
                format!("unknown action '{}'", action),
                "{\"action\": \"repo.Find\" | \"mapping.Assign\" | \"flow.If\" ...}",
            )),
            None => {}
        }

        let next_tx = in_tx || step.action == ang_ir::FlowAction::TxBlock;
        for (_, nested) in step.children() {
            walk(nested, next_tx, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ang_ir::FlowAction;

    fn codes(steps: &[FlowStep]) -> Vec<String> {
        validate(steps).into_iter().map(|i| i.code).collect()
    }

    #[test]
    fn get_for_update_requires_transaction() {
        let get = FlowStep::new(FlowAction::RepoGetForUpdate)
            .with_arg("source", "Order")
            .with_arg("output", "order");
        assert_eq!(codes(&[get.clone()]), vec!["TX_REQUIRED"]);

        let mut tx = FlowStep::new(FlowAction::TxBlock);
        tx.do_steps.push(get);
        assert!(codes(&[tx]).is_empty());
    }

    #[test]
    fn reports_missing_args_and_children() {
        let check = FlowStep::new(FlowAction::LogicCheck).with_arg("cond", "x > 0");
        let branch = FlowStep::new(FlowAction::FlowIf).with_arg("condition", "ok");
        assert_eq!(codes(&[check, branch]), vec!["MISSING_THROW", "MISSING_THEN"]);
    }

    #[test]
    fn unknown_namespace_is_flagged_known_one_is_not() {
        let steps = vec![
            FlowStep::new(FlowAction::parse("magic.Do")),
            FlowStep::new(FlowAction::parse("audit.Log")),
        ];
        let issues = validate(&steps);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "UNKNOWN_ACTION");
        assert_eq!(issues[0].step, 1);
    }
}
