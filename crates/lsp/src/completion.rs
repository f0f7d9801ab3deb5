//! Flow action completion.
//!
//! Documents under a `cue/` directory are offered the flow action
//! vocabulary; anything else gets no completions.

use std::path::Path;

use ang_ir::flow::KNOWN_ACTIONS;
use lsp_types::{CompletionItem, CompletionItemKind};

/// Whether `path` lives inside a `cue/` tree.
pub fn is_intent_document(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == "cue")
}

pub fn compute_completions(path: Option<&Path>) -> Vec<CompletionItem> {
    if !path.is_some_and(is_intent_document) {
        return Vec::new();
    }
    KNOWN_ACTIONS
        .iter()
        .map(|action| CompletionItem {
            label: action.to_string(),
            kind: Some(CompletionItemKind::FUNCTION),
            detail: Some("ANG flow action".to_string()),
            insert_text: Some(action.to_string()),
            ..Default::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offers_actions_for_intent_files_only() {
        let items = compute_completions(Some(Path::new("/w/cue/architecture/auth.json")));
        assert_eq!(items.len(), KNOWN_ACTIONS.len());
        let find = items.iter().find(|i| i.label == "repo.Find").unwrap();
        assert_eq!(find.kind, Some(CompletionItemKind::FUNCTION));
        assert_eq!(find.detail.as_deref(), Some("ANG flow action"));

        assert!(compute_completions(Some(Path::new("/w/internal/main.go"))).is_empty());
        assert!(compute_completions(None).is_empty());
    }
}
