//! Diagnostic code catalogue for `ang explain`.

use ang_core::ErrorCode;
use serde::Serialize;

use crate::doctor::fix_hint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub code: String,
    pub title: String,
    pub description: String,
    pub example: String,
}

impl Explanation {
    pub fn render(&self) -> String {
        format!("{}\n{}\n\nExample:\n{}", self.title, self.description, self.example)
    }
}

const FLOW_CODES: &[(&str, &str, &str, &str)] = &[
    (
        "MISSING_ID",
        "Missing ID assignment before repo.Save",
        "When creating a new entity, an ID must be set before saving. ANG expects an explicit mapping.Assign to ensure deterministic identifiers.",
        r#"{action: "mapping.Assign", to: "newItem.ID", value: "uuid.NewString()"}"#,
    ),
    (
        "MISSING_CREATED_AT",
        "Missing CreatedAt assignment before repo.Save",
        "New entities should set CreatedAt to RFC3339 in UTC so storage is consistent and sortable.",
        r#"{action: "mapping.Assign", to: "newItem.CreatedAt", value: "time.Now().UTC().Format(time.RFC3339)"}"#,
    ),
    (
        "MISSING_OUTPUT",
        "Missing output variable in repo.Find/repo.List",
        "Repo operations must declare an output variable to store the fetched entity or list.",
        r#"{action: "repo.Find", source: "Item", input: "req.ItemID", output: "item"}"#,
    ),
    (
        "MISSING_INPUT",
        "Missing input in repo or mapping step",
        "Repo operations need an input (ID or filter) to identify what to fetch or save.",
        r#"{action: "repo.Find", source: "Item", input: "req.ItemID", output: "item"}"#,
    ),
    (
        "MISSING_SOURCE",
        "Missing source entity in repo step",
        "Repo operations must specify the source entity to select the correct repository.",
        r#"{action: "repo.Save", source: "Item", input: "item"}"#,
    ),
    (
        "MISSING_ENTITY",
        "Missing entity in mapping.Map",
        "mapping.Map requires an entity when creating new domain objects to infer the correct type.",
        r#"{action: "mapping.Map", output: "newItem", entity: "Item"}"#,
    ),
    (
        "UNKNOWN_ACTION",
        "Unknown flow action",
        "Every flow step must use an action the code generator knows. Unknown actions are reported as warnings and produce no code.",
        r#"{action: "repo.Find", source: "Item", input: "req.ItemID", output: "item"}"#,
    ),
    (
        "TX_REQUIRED",
        "Multiple writes outside a transaction",
        "A method that saves or deletes through more than one repository call must wrap those calls in tx.Block so they commit atomically.",
        r#"{action: "tx.Block", _do: [{action: "repo.Save", source: "Order", input: "order"}, {action: "repo.Save", source: "Invoice", input: "invoice"}]}"#,
    ),
    (
        "GO_SYNTAX_ERROR",
        "Embedded Go snippet does not parse",
        "Code inside logic.Call and implementation blocks is checked with gofmt. Fix the snippet so it is valid Go.",
        r#"{action: "logic.Call", code: "total := order.Total()"}"#,
    ),
];

/// The catalogue entry for `code`, case-insensitively.
pub fn explain(code: &str) -> Option<Explanation> {
    let code = code.trim().to_uppercase();
    if let Some((c, title, description, example)) = FLOW_CODES.iter().find(|(c, ..)| *c == code) {
        return Some(Explanation {
            code: c.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            example: example.to_string(),
        });
    }
    let stable = ErrorCode::parse(&code)?;
    Some(Explanation {
        code: code.clone(),
        title: format!("{} stage failure", stable_stage(stable)),
        description: fix_hint(stable).to_string(),
        example: format!("ang doctor --log \"{}\"", code),
    })
}

fn stable_stage(code: ErrorCode) -> &'static str {
    let s = code.as_str();
    if s.starts_with("CUE_") {
        "CUE"
    } else if s.starts_with("IR_") {
        "IR"
    } else {
        "Emitter"
    }
}

/// Every code `explain` knows: flow codes then stable pipeline codes.
pub fn explained_codes() -> Vec<&'static str> {
    FLOW_CODES
        .iter()
        .map(|(c, ..)| *c)
        .chain(ang_core::STABLE_ERROR_CODES.iter().map(|c| c.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_codes_render_title_description_and_example() {
        let e = explain("missing_id").unwrap();
        let text = e.render();
        assert!(text.starts_with("Missing ID assignment before repo.Save\n"));
        assert!(text.contains("\n\nExample:\n{action: \"mapping.Assign\""));
    }

    #[test]
    fn every_listed_code_is_explained() {
        for code in explained_codes() {
            assert!(explain(code).is_some(), "{}", code);
        }
        assert_eq!(explain("CUE_VIEWS_PARSE_ERROR").unwrap().title, "CUE stage failure");
        assert!(explain("NOT_A_CODE").is_none());
    }
}
