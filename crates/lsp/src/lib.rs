//! ANG Language Server Protocol implementation for IDE integration.
//!
//! Publishes compiler diagnostics for the `cue/` intent tree (debounced on
//! change, immediate on open and save), completes flow actions, and offers
//! quick fixes that point at `ang doctor`. Connects to editors via the
//! `ang lsp --stdio` CLI subcommand.

pub mod code_action;
pub mod completion;
pub mod diagnostics;
pub mod document;
pub mod server;
pub mod uri;

pub use diagnostics::{DiagnosticsByUri, DiagnosticsProvider, PipelineDiagnostics};
pub use server::{run, serve, LspResult, ServerOptions, DEFAULT_DEBOUNCE};
