//! Document state management for open files in the editor.

use std::collections::BTreeMap;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Open documents keyed by URI, with their latest full text.
#[derive(Debug, Default)]
pub struct DocumentState {
    documents: BTreeMap<String, String>,
}

impl DocumentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly opened document, or replace the text of an open one.
    pub fn set(&mut self, uri: &str, content: String) {
        self.documents.insert(uri.to_owned(), content);
    }

    /// Remove a closed document from tracking.
    pub fn close(&mut self, uri: &str) {
        self.documents.remove(uri);
    }

    pub fn get(&self, uri: &str) -> Option<&str> {
        self.documents.get(uri).map(String::as_str)
    }

    pub fn all(&self) -> &BTreeMap<String, String> {
        &self.documents
    }

    /// Identity of the workspace as the diagnostics run would see it: the
    /// root plus every open document, in URI order.
    pub fn fingerprint(&self, root: &Path) -> String {
        let mut h = Sha256::new();
        h.update(root.to_string_lossy().as_bytes());
        for (uri, body) in &self.documents {
            h.update(b"\nURI:");
            h.update(uri.as_bytes());
            h.update(b"\n");
            h.update(body.as_bytes());
        }
        format!("{:x}", h.finalize())
    }
}
