//! Post-formatting of generated sources.

use std::cell::Cell;

use ang_core::process::{ProcessError, ProcessRunner, ProcessSpec, SystemRunner};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("formatter '{0}' is not installed")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
}

pub trait SourceFormatter {
    /// Format Go source. Callers fall back to the raw bytes on error.
    fn format_go(&self, src: &[u8]) -> Result<Vec<u8>, FormatError>;
}

/// Leaves sources untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFormat;

impl SourceFormatter for NoFormat {
    fn format_go(&self, src: &[u8]) -> Result<Vec<u8>, FormatError> {
        Ok(src.to_vec())
    }
}

/// Pipes Go sources through `gofmt`. A missing binary is detected once and
/// reported as [`FormatError::Unavailable`] afterwards without spawning.
pub struct Gofmt<R: ProcessRunner = SystemRunner> {
    runner: R,
    missing: Cell<bool>,
}

impl Default for Gofmt<SystemRunner> {
    fn default() -> Self {
        Gofmt::new(SystemRunner)
    }
}

impl<R: ProcessRunner> Gofmt<R> {
    pub fn new(runner: R) -> Self {
        Gofmt {
            runner,
            missing: Cell::new(false),
        }
    }
}

impl<R: ProcessRunner> SourceFormatter for Gofmt<R> {
    fn format_go(&self, src: &[u8]) -> Result<Vec<u8>, FormatError> {
        if self.missing.get() {
            return Err(FormatError::Unavailable("gofmt".into()));
        }
        match self.runner.run(&ProcessSpec::new("gofmt").stdin(src.to_vec())) {
            Ok(out) if out.success() => Ok(out.stdout),
            Ok(out) => Err(FormatError::Failed(out.stderr_str().trim().to_string())),
            Err(ProcessError::NotFound { program }) => {
                self.missing.set(true);
                Err(FormatError::Unavailable(program))
            }
            Err(e) => Err(FormatError::Failed(e.to_string())),
        }
    }
}
