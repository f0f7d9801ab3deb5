//! OpenAPI compatibility diff.
//!
//! Compares two OpenAPI documents (YAML or JSON) by their endpoints
//! (`"<verb> <path>"`) and the property signatures of
//! `components.schemas`. Removals and type changes are breaking; anything
//! new is an addition.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;
use serde_yaml::Value;

use crate::error::AnalyzeError;

pub const DEFAULT_BASE: &str = "api/openapi.base.yaml";
pub const DEFAULT_CURRENT: &str = "api/openapi.yaml";

const VERBS: &[&str] = &["get", "post", "put", "patch", "delete"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiDoc {
    pub endpoints: BTreeSet<String>,
    /// schema -> field -> `type|format`
    pub schemas: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SemverBump {
    Major,
    Minor,
    Patch,
}

impl SemverBump {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemverBump::Major => "major",
            SemverBump::Minor => "minor",
            SemverBump::Patch => "patch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiDiffReport {
    pub breaking: Vec<String>,
    pub additions: Vec<String>,
    pub semver: SemverBump,
}

fn str_of<'a>(v: &'a Value, key: &str) -> &'a str {
    v.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn field_signature(prop: &Value) -> String {
    let ty = str_of(prop, "type");
    let ty = if ty == "array" {
        match prop.get("items").map(|i| str_of(i, "type")).filter(|t| !t.is_empty()) {
            Some(item) => format!("array:{}", item),
            None => "array".to_string(),
        }
    } else {
        ty.to_string()
    };
    format!("{}|{}", ty, str_of(prop, "format"))
}

fn keys(v: Option<&Value>) -> impl Iterator<Item = (&str, &Value)> {
    v.and_then(Value::as_mapping)
        .into_iter()
        .flat_map(|m| m.iter())
        .filter_map(|(k, v)| k.as_str().map(|k| (k, v)))
}

pub fn parse_openapi(text: &str) -> Result<ApiDoc, serde_yaml::Error> {
    let root: Value = serde_yaml::from_str(text)?;
    let mut doc = ApiDoc::default();
    for (path, item) in keys(root.get("paths")) {
        for (verb, _) in keys(Some(item)) {
            if VERBS.contains(&verb) {
                doc.endpoints.insert(format!("{} {}", verb, path));
            }
        }
    }
    let schemas = root.get("components").and_then(|c| c.get("schemas"));
    for (name, schema) in keys(schemas) {
        let fields = keys(schema.get("properties"))
            .map(|(field, prop)| (field.to_string(), field_signature(prop)))
            .collect();
        doc.schemas.insert(name.to_string(), fields);
    }
    Ok(doc)
}

pub fn read_openapi(path: &Path) -> Result<ApiDoc, AnalyzeError> {
    let text = std::fs::read_to_string(path).map_err(|e| AnalyzeError::io(path, e))?;
    parse_openapi(&text).map_err(|e| AnalyzeError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

pub fn diff_openapi(base: &ApiDoc, current: &ApiDoc) -> ApiDiffReport {
    let mut breaking = Vec::new();
    let mut additions = Vec::new();
    for ep in base.endpoints.difference(&current.endpoints) {
        breaking.push(format!("Removed endpoint: {}", ep));
    }
    for ep in current.endpoints.difference(&base.endpoints) {
        additions.push(format!("Added endpoint: {}", ep));
    }
    for (name, fields) in &base.schemas {
        let Some(curr) = current.schemas.get(name) else {
            breaking.push(format!("Removed schema: {}", name));
            continue;
        };
        for (field, sig) in fields {
            match curr.get(field) {
                None => breaking.push(format!("Removed field: {}.{}", name, field)),
                Some(now) if now != sig => {
                    breaking.push(format!("Changed field type: {}.{} ({} -> {})", name, field, sig, now))
                }
                Some(_) => {}
            }
        }
        for field in curr.keys().filter(|f| !fields.contains_key(*f)) {
            additions.push(format!("Added field: {}.{}", name, field));
        }
    }
    for name in current.schemas.keys().filter(|n| !base.schemas.contains_key(*n)) {
        additions.push(format!("Added schema: {}", name));
    }
    breaking.sort();
    additions.sort();
    let semver = if !breaking.is_empty() {
        SemverBump::Major
    } else if !additions.is_empty() {
        SemverBump::Minor
    } else {
        SemverBump::Patch
    };
    ApiDiffReport {
        breaking,
        additions,
        semver,
    }
}

impl ApiDiffReport {
    pub fn render(&self) -> String {
        let mut out = String::from("API Diff Report\n--------------\n");
        for (title, items) in [("Breaking changes", &self.breaking), ("Additions", &self.additions)] {
            if items.is_empty() {
                let _ = writeln!(out, "{}: none", title);
            } else {
                let _ = writeln!(out, "{}:", title);
                for item in items {
                    let _ = writeln!(out, "  - {}", item);
                }
            }
        }
        let _ = writeln!(out, "Recommended semver bump: {}", self.semver.as_str());
        out
    }
}
