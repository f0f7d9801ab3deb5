//! Flow steps.
//!
//! A method flow is an ordered list of steps. Each step carries an action
//! tag, free-form arguments and up to three nested lists (`_do`, `_then`,
//! `_else`). Emitters switch on [`FlowAction`]; actions outside the closed
//! set survive as [`FlowAction::Other`] so newer inputs still round-trip.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::SourceLoc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlowAction {
    RepoFind,
    RepoGet,
    RepoGetForUpdate,
    RepoList,
    RepoSave,
    RepoDelete,
    RepoQuery,
    MappingMap,
    MappingAssign,
    LogicCheck,
    LogicCall,
    FlowIf,
    FlowFor,
    FlowBlock,
    TxBlock,
    FsmTransition,
    EventPublish,
    CacheGet,
    CacheSet,
    RateLimitCheck,
    StorageUpload,
    MailerSend,
    Other(String),
}

/// Every action the emitters know how to translate, in documentation order.
pub const KNOWN_ACTIONS: &[&str] = &[
    "repo.Find",
    "repo.Get",
    "repo.GetForUpdate",
    "repo.List",
    "repo.Save",
    "repo.Delete",
    "repo.Query",
    "mapping.Map",
    "mapping.Assign",
    "logic.Check",
    "logic.Call",
    "flow.If",
    "flow.For",
    "flow.Block",
    "tx.Block",
    "fsm.Transition",
    "event.Publish",
    "cache.Get",
    "cache.Set",
    "rateLimit.Check",
    "storage.Upload",
    "mailer.Send",
];

impl FlowAction {
    pub fn parse(tag: &str) -> FlowAction {
        match tag.trim() {
            "repo.Find" => FlowAction::RepoFind,
            "repo.Get" => FlowAction::RepoGet,
            "repo.GetForUpdate" => FlowAction::RepoGetForUpdate,
            "repo.List" => FlowAction::RepoList,
            "repo.Save" => FlowAction::RepoSave,
            "repo.Delete" => FlowAction::RepoDelete,
            "repo.Query" => FlowAction::RepoQuery,
            "mapping.Map" => FlowAction::MappingMap,
            "mapping.Assign" => FlowAction::MappingAssign,
            "logic.Check" => FlowAction::LogicCheck,
            "logic.Call" => FlowAction::LogicCall,
            "flow.If" => FlowAction::FlowIf,
            "flow.For" => FlowAction::FlowFor,
            "flow.Block" => FlowAction::FlowBlock,
            "tx.Block" => FlowAction::TxBlock,
            "fsm.Transition" => FlowAction::FsmTransition,
            "event.Publish" => FlowAction::EventPublish,
            "cache.Get" => FlowAction::CacheGet,
            "cache.Set" => FlowAction::CacheSet,
            "rateLimit.Check" => FlowAction::RateLimitCheck,
            "storage.Upload" => FlowAction::StorageUpload,
            "mailer.Send" => FlowAction::MailerSend,
            other => FlowAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FlowAction::RepoFind => "repo.Find",
            FlowAction::RepoGet => "repo.Get",
            FlowAction::RepoGetForUpdate => "repo.GetForUpdate",
            FlowAction::RepoList => "repo.List",
            FlowAction::RepoSave => "repo.Save",
            FlowAction::RepoDelete => "repo.Delete",
            FlowAction::RepoQuery => "repo.Query",
            FlowAction::MappingMap => "mapping.Map",
            FlowAction::MappingAssign => "mapping.Assign",
            FlowAction::LogicCheck => "logic.Check",
            FlowAction::LogicCall => "logic.Call",
            FlowAction::FlowIf => "flow.If",
            FlowAction::FlowFor => "flow.For",
            FlowAction::FlowBlock => "flow.Block",
            FlowAction::TxBlock => "tx.Block",
            FlowAction::FsmTransition => "fsm.Transition",
            FlowAction::EventPublish => "event.Publish",
            FlowAction::CacheGet => "cache.Get",
            FlowAction::CacheSet => "cache.Set",
            FlowAction::RateLimitCheck => "rateLimit.Check",
            FlowAction::StorageUpload => "storage.Upload",
            FlowAction::MailerSend => "mailer.Send",
            FlowAction::Other(tag) => tag,
        }
    }

    pub fn is_repo(&self) -> bool {
        self.as_str().starts_with("repo.")
    }

    pub fn namespace(&self) -> &str {
        let tag = self.as_str();
        tag.split_once('.').map(|(ns, _)| ns).unwrap_or(tag)
    }
}

impl fmt::Display for FlowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FlowAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FlowAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(FlowAction::parse(&tag))
    }
}

/// One step of a method flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    pub action: FlowAction,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "_do", default, skip_serializing_if = "Vec::is_empty")]
    pub do_steps: Vec<FlowStep>,
    #[serde(rename = "_then", default, skip_serializing_if = "Vec::is_empty")]
    pub then_steps: Vec<FlowStep>,
    #[serde(rename = "_else", default, skip_serializing_if = "Vec::is_empty")]
    pub else_steps: Vec<FlowStep>,
    #[serde(default)]
    pub source: SourceLoc,
}

impl FlowStep {
    pub fn new(action: FlowAction) -> Self {
        FlowStep {
            action,
            args: BTreeMap::new(),
            do_steps: Vec::new(),
            then_steps: Vec::new(),
            else_steps: Vec::new(),
            source: SourceLoc::default(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    /// String argument, trimmed; empty strings count as absent.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `condition` with the `cond` shorthand as fallback.
    pub fn condition(&self) -> Option<&str> {
        self.arg_str("condition").or_else(|| self.arg_str("cond"))
    }

    /// Nested lists paired with their key, skipping empty ones.
    pub fn children(&self) -> impl Iterator<Item = (&'static str, &[FlowStep])> {
        [
            ("_do", self.do_steps.as_slice()),
            ("_then", self.then_steps.as_slice()),
            ("_else", self.else_steps.as_slice()),
        ]
        .into_iter()
        .filter(|(_, steps)| !steps.is_empty())
    }

    pub fn has_children(&self) -> bool {
        self.children().next().is_some()
    }
}

/// Visit every step depth-first, including nested lists.
pub fn walk_steps<'a>(steps: &'a [FlowStep], visit: &mut dyn FnMut(&'a FlowStep)) {
    for step in steps {
        visit(step);
        for (_, nested) in step.children() {
            walk_steps(nested, visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_actions_survive_round_trip() {
        let step = FlowStep::new(FlowAction::parse("audit.Log")).with_arg("actor", "req.UserID");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["action"], "audit.Log");
        let back: FlowStep = serde_json::from_value(json).unwrap();
        assert_eq!(back.action, FlowAction::Other("audit.Log".into()));
    }

    #[test]
    fn nested_lists_use_underscore_keys() {
        let mut step = FlowStep::new(FlowAction::FlowIf).with_arg("cond", "x > 1");
        step.then_steps.push(FlowStep::new(FlowAction::RepoSave));
        let json = serde_json::to_value(&step).unwrap();
        assert!(json.get("_then").is_some());
        assert!(json.get("_else").is_none());
        assert_eq!(step.condition(), Some("x > 1"));
    }

    #[test]
    fn walk_visits_nested_steps() {
        let mut outer = FlowStep::new(FlowAction::TxBlock);
        outer.do_steps.push(FlowStep::new(FlowAction::RepoSave));
        let steps = vec![outer, FlowStep::new(FlowAction::EventPublish)];
        let mut seen = Vec::new();
        walk_steps(&steps, &mut |s| seen.push(s.action.as_str().to_string()));
        assert_eq!(seen, vec!["tx.Block", "repo.Save", "event.Publish"]);
    }
}
