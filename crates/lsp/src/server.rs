//! LSP server main loop with request/notification dispatch.
//!
//! Uses `lsp-server` (synchronous, crossbeam-based) for the transport. The
//! loop is single-threaded: `didChange` only moves a debounce deadline, and
//! the loop waits on the channel with `recv_timeout` until that deadline,
//! so at most one diagnostics run is ever in flight.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use ang_core::COMPILER_VERSION;
use lsp_server::{Connection, ErrorCode, Message, Notification, Request, Response};
use lsp_types::notification::{
    DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument, DidSaveTextDocument, Exit,
    Notification as _, PublishDiagnostics,
};
use lsp_types::request::{CodeActionRequest, Completion, ExecuteCommand, Request as _};
use lsp_types::{
    CodeActionProviderCapability, CompletionList, CompletionOptions, CompletionResponse, Diagnostic,
    ExecuteCommandOptions, SaveOptions, ServerCapabilities, TextDocumentSyncCapability,
    TextDocumentSyncKind, TextDocumentSyncOptions, TextDocumentSyncSaveOptions,
};
use serde_json::{json, Value};

use crate::code_action;
use crate::completion;
use crate::diagnostics::{diagnostics_hash, DiagnosticsByUri, DiagnosticsProvider, PipelineDiagnostics};
use crate::document::DocumentState;
use crate::uri::uri_to_path;

pub type LspResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Quiet period after the last `didChange` before diagnostics run.
    pub debounce: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Run the LSP server over stdio until shutdown.
pub fn run() -> LspResult<()> {
    let (connection, io_threads) = Connection::stdio();
    serve(&connection, PipelineDiagnostics, ServerOptions::default())?;
    io_threads.join()?;
    Ok(())
}

/// Initialize handshake, then the main loop. Returns `Ok` after
/// `shutdown` + `exit` or when the client goes away; an `exit` without a
/// prior `shutdown` is an error.
pub fn serve<P: DiagnosticsProvider>(connection: &Connection, provider: P, options: ServerOptions) -> LspResult<()> {
    let (id, params) = connection.initialize_start()?;
    let root = workspace_root(&params);
    let result = json!({
        "capabilities": serde_json::to_value(build_capabilities())?,
        "serverInfo": {"name": "ang-lsp", "version": COMPILER_VERSION},
    });
    connection.initialize_finish(id, result)?;
    tracing::info!(root = %root.display(), "ang-lsp initialized");

    let mut server = Server {
        root,
        docs: DocumentState::new(),
        last_hash: BTreeMap::new(),
        cache: None,
        deadline: None,
        debounce: options.debounce,
        provider,
    };
    server.main_loop(connection)
}

/// `workspaceFolders[0]`, then `rootUri`, then `rootPath`, then the cwd.
fn workspace_root(params: &Value) -> PathBuf {
    let from_uri = |v: &Value| v.as_str().and_then(uri_to_path);
    let root = params
        .get("workspaceFolders")
        .and_then(|f| f.get(0))
        .and_then(|f| f.get("uri"))
        .and_then(from_uri)
        .or_else(|| params.get("rootUri").and_then(from_uri))
        .or_else(|| {
            params
                .get("rootPath")
                .and_then(Value::as_str)
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from("."));
    std::path::absolute(&root).unwrap_or(root)
}

fn build_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            open_close: Some(true),
            change: Some(TextDocumentSyncKind::FULL),
            save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                include_text: Some(true),
            })),
            ..Default::default()
        })),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec!["\"".into(), ".".into()]),
            resolve_provider: Some(false),
            ..Default::default()
        }),
        code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
        execute_command_provider: Some(ExecuteCommandOptions {
            commands: code_action::COMMANDS.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

struct Server<P> {
    root: PathBuf,
    docs: DocumentState,
    /// Hash of the diagnostics last published per URI.
    last_hash: BTreeMap<String, String>,
    /// Diagnostics of the last run, keyed by [`Self::cache_key`].
    cache: Option<(String, DiagnosticsByUri)>,
    deadline: Option<Instant>,
    debounce: Duration,
    provider: P,
}

impl<P: DiagnosticsProvider> Server<P> {
    fn main_loop(&mut self, connection: &Connection) -> LspResult<()> {
        loop {
            let msg = match self.deadline {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match connection.receiver.recv_timeout(wait) {
                        Ok(msg) => msg,
                        Err(e) if e.is_timeout() => {
                            self.publish_now(connection)?;
                            continue;
                        }
                        Err(_) => return Ok(()),
                    }
                }
                None => match connection.receiver.recv() {
                    Ok(msg) => msg,
                    Err(_) => return Ok(()),
                },
            };
            match msg {
                Message::Request(req) => {
                    if connection.handle_shutdown(&req)? {
                        return Ok(());
                    }
                    self.handle_request(connection, req)?;
                }
                Message::Notification(not) => {
                    if not.method == Exit::METHOD {
                        return Err("received exit before shutdown".into());
                    }
                    self.handle_notification(connection, not)?;
                }
                Message::Response(_) => {
                    // Ignore responses (we don't send requests to the client)
                }
            }
        }
    }

    fn handle_request(&mut self, connection: &Connection, req: Request) -> LspResult<()> {
        let resp = match dispatch(&req) {
            Ok(Some(result)) => Response::new_ok(req.id, result),
            Ok(None) => Response::new_err(
                req.id,
                ErrorCode::MethodNotFound as i32,
                format!("method not found: {}", req.method),
            ),
            Err(e) => Response::new_err(req.id, ErrorCode::InternalError as i32, e.to_string()),
        };
        connection.sender.send(Message::Response(resp))?;
        Ok(())
    }

    fn handle_notification(&mut self, connection: &Connection, not: Notification) -> LspResult<()> {
        match not.method.as_str() {
            m if m == DidOpenTextDocument::METHOD => {
                let params: lsp_types::DidOpenTextDocumentParams = serde_json::from_value(not.params)?;
                self.docs.set(params.text_document.uri.as_str(), params.text_document.text);
                self.publish_now(connection)?;
            }
            m if m == DidChangeTextDocument::METHOD => {
                let params: lsp_types::DidChangeTextDocumentParams = serde_json::from_value(not.params)?;
                // FULL sync: last content change has the entire document
                if let Some(change) = params.content_changes.into_iter().last() {
                    self.docs.set(params.text_document.uri.as_str(), change.text);
                }
                self.deadline = Some(Instant::now() + self.debounce);
            }
            m if m == DidSaveTextDocument::METHOD => {
                let params: lsp_types::DidSaveTextDocumentParams = serde_json::from_value(not.params)?;
                if let Some(text) = params.text.filter(|t| !t.is_empty()) {
                    self.docs.set(params.text_document.uri.as_str(), text);
                }
                // Files that are not open may have changed on disk too.
                self.cache = None;
                self.publish_now(connection)?;
            }
            m if m == DidCloseTextDocument::METHOD => {
                let params: lsp_types::DidCloseTextDocumentParams = serde_json::from_value(not.params)?;
                let uri = params.text_document.uri.as_str();
                self.docs.close(uri);
                publish(connection, uri, Vec::new())?;
                self.last_hash.remove(uri);
            }
            _ => {
                // Unknown notification -- ignore
            }
        }
        Ok(())
    }

    /// Open documents plus the on-disk inputs, so edits to unopened files
    /// invalidate the cache too.
    fn cache_key(&self) -> String {
        let disk = ang_core::compute_project_hash(&self.root).unwrap_or_default();
        format!("{}:{}", self.docs.fingerprint(&self.root), disk)
    }

    fn collect(&mut self) -> Option<DiagnosticsByUri> {
        let fingerprint = self.cache_key();
        if let Some((cached, diags)) = &self.cache {
            if *cached == fingerprint {
                return Some(diags.clone());
            }
        }
        match self.provider.collect(&self.root, self.docs.all()) {
            Ok(diags) => {
                self.cache = Some((fingerprint, diags.clone()));
                Some(diags)
            }
            Err(e) => {
                tracing::warn!(error = %e, "diagnostics run failed");
                None
            }
        }
    }

    /// Publish every URI whose diagnostics changed since the last publish,
    /// and an empty list for URIs that no longer have any.
    fn publish_now(&mut self, connection: &Connection) -> LspResult<()> {
        self.deadline = None;
        let Some(by_uri) = self.collect() else {
            return Ok(());
        };
        for (uri, list) in &by_uri {
            let hash = diagnostics_hash(list);
            if self.last_hash.get(uri) == Some(&hash) {
                continue;
            }
            publish(connection, uri, list.clone())?;
            self.last_hash.insert(uri.clone(), hash);
        }
        let stale: Vec<String> = self
            .last_hash
            .keys()
            .filter(|uri| !by_uri.contains_key(*uri))
            .cloned()
            .collect();
        for uri in stale {
            publish(connection, &uri, Vec::new())?;
            self.last_hash.remove(&uri);
        }
        Ok(())
    }
}

fn dispatch(req: &Request) -> Result<Option<Value>, serde_json::Error> {
    match req.method.as_str() {
        m if m == Completion::METHOD => {
            let params: lsp_types::CompletionParams = serde_json::from_value(req.params.clone())?;
            let path = uri_to_path(params.text_document_position.text_document.uri.as_str());
            let items = completion::compute_completions(path.as_deref());
            serde_json::to_value(CompletionResponse::List(CompletionList {
                is_incomplete: false,
                items,
            }))
            .map(Some)
        }
        m if m == CodeActionRequest::METHOD => {
            let params: lsp_types::CodeActionParams = serde_json::from_value(req.params.clone())?;
            let actions =
                code_action::build_code_actions(params.text_document.uri.as_str(), &params.context.diagnostics);
            serde_json::to_value(actions).map(Some)
        }
        m if m == ExecuteCommand::METHOD => {
            let params: lsp_types::ExecuteCommandParams = serde_json::from_value(req.params.clone())?;
            Ok(Some(json!({"message": code_action::command_message(&params.command)})))
        }
        _ => Ok(None),
    }
}

/// Send `textDocument/publishDiagnostics` notification to the client.
fn publish(connection: &Connection, uri: &str, diagnostics: Vec<Diagnostic>) -> LspResult<()> {
    let not = Notification::new(
        PublishDiagnostics::METHOD.to_string(),
        json!({"uri": uri, "diagnostics": diagnostics}),
    );
    connection.sender.send(Message::Notification(not))?;
    Ok(())
}
