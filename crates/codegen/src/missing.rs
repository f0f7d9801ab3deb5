//! Flow actions the emitter could not translate.

use std::fmt::Write as _;

use ang_ir::SourceLoc;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingImpl {
    pub service: String,
    pub method: String,
    /// Flow action tag, or `impl` when the method has neither flow nor code.
    pub action: String,
    pub location: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingImpls {
    entries: Vec<MissingImpl>,
}

impl MissingImpls {
    pub fn record(&mut self, service: &str, method: &str, action: &str, location: &SourceLoc) {
        let entry = MissingImpl {
            service: service.to_string(),
            method: method.to_string(),
            action: action.to_string(),
            location: location.clone(),
        };
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[MissingImpl] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn extend(&mut self, other: MissingImpls) {
        for e in other.entries {
            if !self.entries.contains(&e) {
                self.entries.push(e);
            }
        }
    }

    /// Human-readable "Blind Spots" report; empty when nothing is missing.
    pub fn report(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let mut sorted: Vec<&MissingImpl> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            (&a.service, &a.method, &a.action).cmp(&(&b.service, &b.method, &b.action))
        });
        let mut out = String::new();
        let _ = writeln!(out, "Blind Spots ({} unimplemented):", sorted.len());
        for e in sorted {
            let _ = write!(out, "  - {}.{}: {}", e.service, e.method, e.action);
            if e.location.is_known() {
                let _ = write!(out, " at {}", e.location);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_is_sorted_and_deduplicated() {
        let mut m = MissingImpls::default();
        let loc = SourceLoc {
            file: "cue/architecture/orders.json".into(),
            line: 12,
            column: 9,
            path: String::new(),
        };
        m.record("Orders", "Ship", "audit.Log", &loc);
        m.record("Billing", "Charge", "impl", &SourceLoc::default());
        m.record("Orders", "Ship", "audit.Log", &loc);
        assert_eq!(m.len(), 2);
        assert_eq!(
            m.report(),
            "Blind Spots (2 unimplemented):\n  - Billing.Charge: impl\n  - Orders.Ship: audit.Log at cue/architecture/orders.json:12:9\n"
        );
        assert_eq!(MissingImpls::default().report(), "");
    }
}
