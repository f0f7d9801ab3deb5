//! Protocol-level tests over an in-memory connection.
//!
//! The server runs on its own thread against `Connection::memory()`; the
//! test plays the editor. Diagnostics come from a provider that echoes each
//! open document's text back as a diagnostic, so publishes can be matched
//! to the edits that caused them.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ang_lsp::uri::path_to_uri;
use ang_lsp::{serve, DiagnosticsByUri, DiagnosticsProvider, LspResult, PipelineDiagnostics, ServerOptions};
use lsp_server::{Connection, Message, Notification, Request, RequestId};
use lsp_types::Diagnostic;
use serde_json::{json, Value};

const DOC: &str = "file:///work/cue/architecture/auth.json";

#[derive(Clone, Default)]
struct EchoDiagnostics {
    runs: Arc<AtomicUsize>,
}

impl DiagnosticsProvider for EchoDiagnostics {
    fn collect(&self, _root: &Path, docs: &BTreeMap<String, String>) -> io::Result<DiagnosticsByUri> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(docs
            .iter()
            .filter(|(_, text)| !text.is_empty())
            .map(|(uri, text)| {
                let d = Diagnostic {
                    message: text.clone(),
                    ..Default::default()
                };
                (uri.clone(), vec![d])
            })
            .collect())
    }
}

struct Client {
    conn: Connection,
    server: JoinHandle<LspResult<()>>,
    next_id: i32,
}

impl Client {
    fn start<P: DiagnosticsProvider + Send + 'static>(provider: P, debounce: Duration, root: &str) -> Client {
        let (server_conn, conn) = Connection::memory();
        let server = thread::spawn(move || serve(&server_conn, provider, ServerOptions { debounce }));
        let mut client = Client {
            conn,
            server,
            next_id: 1,
        };
        let resp = client.request("initialize", json!({"capabilities": {}, "rootUri": root}));
        assert_eq!(resp["serverInfo"]["name"], "ang-lsp");
        client.notify("initialized", json!({}));
        client
    }

    fn notify(&self, method: &str, params: Value) {
        self.conn
            .sender
            .send(Message::Notification(Notification::new(method.to_string(), params)))
            .unwrap();
    }

    fn request(&mut self, method: &str, params: Value) -> Value {
        let id = RequestId::from(self.next_id);
        self.next_id += 1;
        self.conn
            .sender
            .send(Message::Request(Request::new(id.clone(), method.to_string(), params)))
            .unwrap();
        loop {
            match self.conn.receiver.recv_timeout(Duration::from_secs(5)).unwrap() {
                Message::Response(resp) if resp.id == id => {
                    return resp.result.unwrap_or_else(|| json!({"error": resp.error.unwrap().message}));
                }
                _ => continue,
            }
        }
    }

    /// Next `publishDiagnostics` params within `wait`, if any.
    fn next_publish(&self, wait: Duration) -> Option<Value> {
        loop {
            match self.conn.receiver.recv_timeout(wait) {
                Ok(Message::Notification(n)) if n.method == "textDocument/publishDiagnostics" => {
                    return Some(n.params);
                }
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    fn open(&self, uri: &str, text: &str) {
        self.notify(
            "textDocument/didOpen",
            json!({"textDocument": {"uri": uri, "languageId": "json", "version": 1, "text": text}}),
        );
    }

    fn change(&self, uri: &str, version: i32, text: &str) {
        self.notify(
            "textDocument/didChange",
            json!({"textDocument": {"uri": uri, "version": version}, "contentChanges": [{"text": text}]}),
        );
    }

    fn shutdown(mut self) -> LspResult<()> {
        self.request("shutdown", Value::Null);
        self.notify("exit", Value::Null);
        self.server.join().unwrap()
    }
}

fn messages(params: &Value) -> Vec<String> {
    params["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["message"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn rapid_changes_publish_once_after_the_quiet_period() {
    let provider = EchoDiagnostics::default();
    let runs = provider.runs.clone();
    let client = Client::start(provider, Duration::from_millis(150), "file:///work");

    client.open(DOC, "v0");
    let first = client.next_publish(Duration::from_secs(2)).unwrap();
    assert_eq!(first["uri"], DOC);
    assert_eq!(messages(&first), vec!["v0"]);

    client.change(DOC, 2, "v1");
    client.change(DOC, 3, "v2");
    client.change(DOC, 4, "v3");
    let debounced = client.next_publish(Duration::from_secs(2)).unwrap();
    assert_eq!(messages(&debounced), vec!["v3"]);
    assert!(client.next_publish(Duration::from_millis(500)).is_none());
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    client.shutdown().unwrap();
}

#[test]
fn save_publishes_without_waiting_for_the_debounce() {
    let client = Client::start(EchoDiagnostics::default(), Duration::from_secs(30), "file:///work");
    client.open(DOC, "a");
    client.next_publish(Duration::from_secs(2)).unwrap();

    client.change(DOC, 2, "b");
    client.notify("textDocument/didSave", json!({"textDocument": {"uri": DOC}, "text": "c"}));
    let saved = client.next_publish(Duration::from_secs(2)).unwrap();
    assert_eq!(messages(&saved), vec!["c"]);

    client.shutdown().unwrap();
}

#[test]
fn unchanged_diagnostics_are_not_republished() {
    let client = Client::start(EchoDiagnostics::default(), Duration::from_millis(100), "file:///work");
    client.open(DOC, "same");
    client.next_publish(Duration::from_secs(2)).unwrap();

    client.change(DOC, 2, "same");
    assert!(client.next_publish(Duration::from_millis(600)).is_none());

    client.shutdown().unwrap();
}

#[test]
fn disk_edits_to_unopened_files_invalidate_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("cue/domain")).unwrap();
    std::fs::write(root.join("cue/domain/user.json"), r#"{User: {fields: {id: "string"}}}"#).unwrap();
    let doc = path_to_uri(&root.join("cue/architecture/auth.json"));

    let provider = EchoDiagnostics::default();
    let runs = provider.runs.clone();
    let client = Client::start(provider, Duration::from_millis(100), &path_to_uri(root));
    client.open(&doc, "same");
    client.next_publish(Duration::from_secs(2)).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    client.change(&doc, 2, "same");
    assert!(client.next_publish(Duration::from_millis(600)).is_none());
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    std::fs::write(
        root.join("cue/domain/user.json"),
        r#"{User: {fields: {id: "string", email: "string"}}}"#,
    )
    .unwrap();
    client.change(&doc, 3, "same");
    assert!(client.next_publish(Duration::from_millis(600)).is_none());
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    client.shutdown().unwrap();
}

#[test]
fn close_clears_the_document_diagnostics() {
    let client = Client::start(EchoDiagnostics::default(), Duration::from_millis(100), "file:///work");
    client.open(DOC, "broken");
    client.next_publish(Duration::from_secs(2)).unwrap();

    client.notify("textDocument/didClose", json!({"textDocument": {"uri": DOC}}));
    let cleared = client.next_publish(Duration::from_secs(2)).unwrap();
    assert_eq!(cleared["uri"], DOC);
    assert!(messages(&cleared).is_empty());

    client.shutdown().unwrap();
}

#[test]
fn completion_code_actions_and_commands() {
    let mut client = Client::start(EchoDiagnostics::default(), Duration::from_millis(100), "file:///work");

    let list = client.request(
        "textDocument/completion",
        json!({"textDocument": {"uri": DOC}, "position": {"line": 0, "character": 0}}),
    );
    let items = list["items"].as_array().unwrap();
    assert!(items.iter().any(|i| i["label"] == "flow.If" && i["detail"] == "ANG flow action"));

    let actions = client.request(
        "textDocument/codeAction",
        json!({
            "textDocument": {"uri": DOC},
            "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 1}},
            "context": {"diagnostics": [{
                "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 1}},
                "code": "MISSING_OUTPUT",
                "message": "repo.Find missing 'output'"
            }]}
        }),
    );
    assert_eq!(actions[0]["title"], "ANG: suggest fix for MISSING_OUTPUT");
    assert_eq!(actions[0]["command"]["command"], "ang.openDoctor");

    let reply = client.request("workspace/executeCommand", json!({"command": "ang.openDoctor", "arguments": []}));
    assert_eq!(reply["message"], "Run `ang doctor` in terminal to get concrete fix suggestions.");

    let unknown = client.request("textDocument/hover", json!({}));
    assert!(unknown["error"].as_str().unwrap().starts_with("method not found"));

    client.shutdown().unwrap();
}

#[test]
fn exit_without_shutdown_is_an_error() {
    let client = Client::start(EchoDiagnostics::default(), Duration::from_millis(100), "file:///work");
    client.notify("exit", Value::Null);
    let err = client.server.join().unwrap().unwrap_err();
    assert_eq!(err.to_string(), "received exit before shutdown");
}

// ── Pipeline-backed diagnostics ─────────────────────────────────────────────

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

const AUTH_BROKEN: &str = r#"{
  Auth: {
    methods: {
      Login: {
        input: {email: "string"},
        flow: [
          {action: "repo.Find", source: "User", input: "req.Email"},
        ],
      },
    },
  },
}"#;

const AUTH_FIXED: &str = r#"{
  Auth: {
    methods: {
      Login: {
        input: {email: "string"},
        flow: [
          {action: "repo.Find", source: "User", input: "req.Email", output: "user"},
        ],
      },
    },
  },
}"#;

#[test]
fn pipeline_diagnostics_land_on_workspace_files_and_honor_overlays() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "cue/domain/user.json", r#"{User: {fields: {id: "string", email: "string"}}}"#);
    write(root, "cue/architecture/auth.json", AUTH_BROKEN);

    let on_disk = PipelineDiagnostics.collect(root, &BTreeMap::new()).unwrap();
    let auth_uri = ang_lsp::uri::path_to_uri(&root.join("cue/architecture/auth.json"));
    let diags = on_disk.get(&auth_uri).unwrap();
    assert!(diags
        .iter()
        .any(|d| d.code == Some(lsp_types::NumberOrString::String("MISSING_OUTPUT".into()))));

    let mut docs = BTreeMap::new();
    docs.insert(auth_uri.clone(), AUTH_FIXED.to_string());
    let overlaid = PipelineDiagnostics.collect(root, &docs).unwrap();
    let remaining = overlaid.get(&auth_uri).map(Vec::len).unwrap_or(0);
    assert!(remaining < diags.len());
    // The workspace itself is never touched.
    assert_eq!(std::fs::read_to_string(root.join("cue/architecture/auth.json")).unwrap(), AUTH_BROKEN);
}
