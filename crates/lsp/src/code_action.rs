//! Quick fixes that hand a diagnostic over to the doctor.

use std::collections::BTreeSet;

use lsp_types::{CodeAction, CodeActionKind, CodeActionOrCommand, Command, Diagnostic, NumberOrString};
use serde_json::json;

pub const OPEN_DOCTOR: &str = "ang.openDoctor";
pub const SHOW_FIX_HINT: &str = "ang.showFixHint";

pub const COMMANDS: &[&str] = &[OPEN_DOCTOR, SHOW_FIX_HINT];

fn code_of(d: &Diagnostic) -> String {
    match &d.code {
        Some(NumberOrString::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(NumberOrString::Number(n)) => n.to_string(),
        _ => "UNKNOWN".to_string(),
    }
}

fn quickfix(title: String, argument: serde_json::Value) -> CodeActionOrCommand {
    CodeActionOrCommand::CodeAction(CodeAction {
        title: title.clone(),
        kind: Some(CodeActionKind::QUICKFIX),
        command: Some(Command {
            title,
            command: OPEN_DOCTOR.to_string(),
            arguments: Some(vec![argument]),
        }),
        ..Default::default()
    })
}

/// One quick fix per distinct diagnostic code, or a single "run doctor"
/// action when there are no diagnostics in range.
pub fn build_code_actions(uri: &str, diagnostics: &[Diagnostic]) -> Vec<CodeActionOrCommand> {
    let mut seen = BTreeSet::new();
    let mut actions = Vec::new();
    for d in diagnostics {
        let code = code_of(d);
        if !seen.insert(code.clone()) {
            continue;
        }
        actions.push(quickfix(
            format!("ANG: suggest fix for {}", code),
            json!({"uri": uri, "code": code, "message": d.message}),
        ));
    }
    if actions.is_empty() {
        actions.push(quickfix("ANG: run doctor for this file".to_string(), json!({"uri": uri})));
    }
    actions
}

/// Reply to `workspace/executeCommand`.
pub fn command_message(command: &str) -> &'static str {
    match command {
        OPEN_DOCTOR => "Run `ang doctor` in terminal to get concrete fix suggestions.",
        SHOW_FIX_HINT => "Review diagnostic hint and update CUE intent.",
        _ => "ANG command acknowledged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(code: Option<&str>, message: &str) -> Diagnostic {
        Diagnostic {
            code: code.map(|c| NumberOrString::String(c.into())),
            message: message.into(),
            ..Default::default()
        }
    }

    fn title(a: &CodeActionOrCommand) -> &str {
        match a {
            CodeActionOrCommand::CodeAction(a) => &a.title,
            CodeActionOrCommand::Command(c) => &c.title,
        }
    }

    #[test]
    fn one_action_per_distinct_code() {
        let actions = build_code_actions(
            "file:///w/cue/a.json",
            &[
                diag(Some("MISSING_OUTPUT"), "a"),
                diag(Some("MISSING_OUTPUT"), "b"),
                diag(None, "c"),
            ],
        );
        let titles: Vec<&str> = actions.iter().map(title).collect();
        assert_eq!(
            titles,
            vec!["ANG: suggest fix for MISSING_OUTPUT", "ANG: suggest fix for UNKNOWN"]
        );
        let CodeActionOrCommand::CodeAction(first) = &actions[0] else {
            panic!("expected a code action");
        };
        let cmd = first.command.as_ref().unwrap();
        assert_eq!(cmd.command, OPEN_DOCTOR);
        assert_eq!(cmd.arguments.as_ref().unwrap()[0]["message"], "a");
    }

    #[test]
    fn falls_back_to_run_doctor() {
        let actions = build_code_actions("file:///w/cue/a.json", &[]);
        assert_eq!(actions.len(), 1);
        assert_eq!(title(&actions[0]), "ANG: run doctor for this file");
        assert_eq!(command_message(SHOW_FIX_HINT), "Review diagnostic hint and update CUE intent.");
    }
}
