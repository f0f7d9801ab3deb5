//! Endpoint test coverage.
//!
//! Scans TypeScript/JavaScript test files for `/api/...` calls made through
//! `apiClient`, `axios` or `fetch` and matches them against the declared
//! HTTP endpoints. WebSocket endpoints are not counted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ang_ir::Endpoint;
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::AnalyzeError;

const TEST_SUFFIXES: &[&str] = &[".test.ts", ".test.js", ".spec.ts", ".spec.js"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointCoverage {
    pub method: String,
    pub path: String,
    pub rpc: String,
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCoverageReport {
    pub total_endpoints: usize,
    pub tested_endpoints: usize,
    pub coverage_percent: f64,
    pub missing_tests: Vec<EndpointCoverage>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tested_by: BTreeMap<String, Vec<String>>,
}

struct CallPatterns {
    client: Regex,
    axios: Regex,
    fetch: Regex,
    param: Regex,
    template: Regex,
}

impl CallPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(CallPatterns {
            client: Regex::new(r#"apiClient\.(get|post|put|patch|delete)\s*[<(]\s*['"`]([^'"`]+)['"`]"#)?,
            axios: Regex::new(r#"axios\.(get|post|put|patch|delete)\s*\(\s*['"`]([^'"`]+)['"`]"#)?,
            fetch: Regex::new(r#"fetch\s*\(\s*['"`]([^'"`]+)['"`]"#)?,
            param: Regex::new(r"\{[^}]+\}")?,
            template: Regex::new(r"\$\{[^}]+\}")?,
        })
    }

    /// `"<METHOD> <path>"` for every `/api/` call in `text`.
    fn calls(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for line in text.lines() {
            for re in [&self.client, &self.axios] {
                for cap in re.captures_iter(line) {
                    if cap[2].starts_with("/api/") {
                        out.push(format!("{} {}", cap[1].to_uppercase(), &cap[2]));
                    }
                }
            }
            for cap in self.fetch.captures_iter(line) {
                if cap[1].starts_with("/api/") {
                    out.push(format!("GET {}", &cap[1]));
                }
            }
        }
        out
    }

    /// Whether a call `"<METHOD> <path>"` hits the endpoint `method path`.
    fn matches(&self, method: &str, path: &str, call: &str) -> bool {
        let Some((call_method, call_path)) = call.split_once(' ') else {
            return false;
        };
        if call_method != method {
            return false;
        }
        let call_path = call_path.split('?').next().unwrap_or_default();
        let call_path = self.template.replace_all(call_path, "x");
        let pattern = self
            .param
            .split(path)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("[^/]+");
        Regex::new(&format!("^{}$", pattern))
            .map(|re| re.is_match(&call_path))
            .unwrap_or(false)
    }
}

fn find_test_files(dir: &Path) -> Result<Vec<PathBuf>, AnalyzeError> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| AnalyzeError::io(dir, e.into()))?;
        let is_test = {
            let name = entry.file_name().to_string_lossy();
            TEST_SUFFIXES.iter().any(|s| name.ends_with(s))
        };
        if entry.file_type().is_file() && is_test {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Coverage of `endpoints` by the test files under `test_dir`.
pub fn check_test_coverage(endpoints: &[Endpoint], test_dir: &Path) -> Result<TestCoverageReport, AnalyzeError> {
    let patterns = CallPatterns::new().map_err(|e| AnalyzeError::Parse {
        path: test_dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut defined: BTreeMap<String, EndpointCoverage> = BTreeMap::new();
    for ep in endpoints.iter().filter(|e| !e.is_ws()) {
        defined.entry(format!("{} {}", ep.method, ep.path)).or_insert(EndpointCoverage {
            method: ep.method.clone(),
            path: ep.path.clone(),
            rpc: ep.rpc.clone(),
            service: ep.service.clone(),
        });
    }

    let mut calls: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for file in find_test_files(test_dir)? {
        let text = match std::fs::read_to_string(&file) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(file = %file.display(), error = %e, "skipping unreadable test file");
                continue;
            }
        };
        let rel = file
            .strip_prefix(test_dir)
            .unwrap_or(&file)
            .to_string_lossy()
            .replace('\\', "/");
        for call in patterns.calls(&text) {
            let files = calls.entry(call).or_default();
            if !files.contains(&rel) {
                files.push(rel.clone());
            }
        }
    }

    let mut tested_by = BTreeMap::new();
    let mut missing_tests = Vec::new();
    for (key, ep) in &defined {
        match calls.iter().find(|(call, _)| patterns.matches(&ep.method, &ep.path, call)) {
            Some((_, files)) => {
                tested_by.insert(key.clone(), files.clone());
            }
            None => missing_tests.push(ep.clone()),
        }
    }
    missing_tests.sort_by(|a, b| (&a.service, &a.path).cmp(&(&b.service, &b.path)));

    let total = defined.len();
    let tested = tested_by.len();
    Ok(TestCoverageReport {
        total_endpoints: total,
        tested_endpoints: tested,
        coverage_percent: if total == 0 {
            0.0
        } else {
            tested as f64 / total as f64 * 100.0
        },
        missing_tests,
        tested_by,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(method: &str, path: &str, rpc: &str) -> Endpoint {
        Endpoint {
            method: method.into(),
            path: path.into(),
            service: "Orders".into(),
            rpc: rpc.into(),
            ..Endpoint::default()
        }
    }

    #[test]
    fn matches_params_queries_and_template_literals() {
        let p = CallPatterns::new().unwrap();
        assert!(p.matches("GET", "/api/orders/{id}", "GET /api/orders/42?expand=1"));
        assert!(p.matches("GET", "/api/orders/{id}", "GET /api/orders/${order.id}"));
        assert!(!p.matches("POST", "/api/orders/{id}", "GET /api/orders/42"));
        assert!(!p.matches("GET", "/api/orders/{id}", "GET /api/orders/42/items"));
    }

    #[test]
    fn reports_missing_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("e2e")).unwrap();
        std::fs::write(
            dir.path().join("e2e/orders.test.ts"),
            "await apiClient.get(`/api/orders/${id}`);\nawait fetch('/api/health');\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("e2e/notes.md"), "apiClient.post('/api/orders')").unwrap();

        let endpoints = vec![
            ep("GET", "/api/orders/{id}", "GetOrder"),
            ep("POST", "/api/orders", "CreateOrder"),
            ep("WS", "/api/orders/{id}/live", "Live"),
        ];
        let report = check_test_coverage(&endpoints, dir.path()).unwrap();
        assert_eq!(report.total_endpoints, 2);
        assert_eq!(report.tested_endpoints, 1);
        assert_eq!(report.coverage_percent, 50.0);
        assert_eq!(report.missing_tests[0].rpc, "CreateOrder");
        assert_eq!(report.tested_by["GET /api/orders/{id}"], vec!["e2e/orders.test.ts"]);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("coveragePercent").is_some());
    }
}
