//! Error reporting for the whole pipeline.
//!
//! Two layers exist: recoverable diagnostics, collected in a [`Diagnostics`]
//! sink that is threaded through every stage, and [`FatalError`]s, which
//! abort the current invocation (unreadable files, malformed tokens,
//! recursive includes/macros).

use std::fmt;
use std::path::PathBuf;

use snafu::Snafu;

use crate::syntax::Token;

#[derive(Debug, Snafu)]
pub enum FatalError {
    #[snafu(display("cannot read '{}': {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("{}:{line}:{column}: {message}", path.display()))]
    Tokenize {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },
    #[snafu(display("{}:{line}:{column}: {message}", path.display()))]
    Preprocess {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },
}

impl FatalError {
    pub(crate) fn preprocess(token: &Token, message: impl Into<String>) -> FatalError {
        FatalError::Preprocess {
            path: token.origin.as_ref().clone(),
            line: token.span.start.line,
            column: token.span.start.column,
            message: message.into(),
        }
    }
}

/// One recoverable error, anchored to a source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
    pub message: String,
    /// Free-form follow-up lines (overload listings and the like).
    pub notes: Vec<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.path.display(),
            self.line,
            self.column,
            self.message
        )?;
        for note in &self.notes {
            write!(f, "\n  {note}")?;
        }
        Ok(())
    }
}

/// Process-wide error sink, passed by `&mut` through the pipeline.
///
/// The count is what the driver's stage gates compare; any increase across a
/// stage aborts the remaining stages.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    pub fn emit(&mut self, message: impl Into<String>, token: &Token) {
        self.emit_with_notes(message, token, Vec::new());
    }

    pub fn emit_with_notes(
        &mut self,
        message: impl Into<String>,
        token: &Token,
        notes: Vec<String>,
    ) {
        self.entries.push(Diagnostic {
            path: token.origin.as_ref().clone(),
            line: token.span.start.line,
            column: token.span.start.column,
            message: message.into(),
            notes,
        });
    }

    pub fn error_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Renders every entry the way the CLI prints them to stderr.
    pub fn render(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        for entry in &self.entries {
            writeln!(out, "{entry}").unwrap();
        }
        out
    }
}
