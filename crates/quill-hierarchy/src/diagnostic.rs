//! Diagnostic rendering for hierarchy errors
//!
//! Turns recorded [`HierarchyError`]s into codespan diagnostics with source
//! context, for terminal output or JSON.

use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, LabelStyle, Severity};
use codespan_reporting::files::{Files, SimpleFiles};
use codespan_reporting::term;
use serde::{Deserialize, Serialize};
use termcolor::{ColorChoice, StandardStream};

use crate::error::HierarchyError;
use crate::span::Span;

/// Stable code for each hierarchy error kind
pub fn error_code(error: &HierarchyError) -> &'static str {
    match error {
        HierarchyError::InvalidDerivation { .. } => "E4001",
        HierarchyError::UnknownBaseClass { .. } => "E4002",
        HierarchyError::DeclaredFunctionTwice { .. } => "E4003",
    }
}

fn label(style: LabelStyle, file_id: usize, span: Span, message: &str) -> Label<usize> {
    Label::new(style, file_id, span.start..span.end).with_message(message)
}

/// A hierarchy error with source context
pub struct Diagnostic {
    inner: CsDiagnostic<usize>,
}

impl Diagnostic {
    /// Describe a recorded error against the file `file_id`
    pub fn from_hierarchy_error(error: &HierarchyError, file_id: usize) -> Self {
        use HierarchyError::*;

        let (severity, message, labels, notes) = match error {
            InvalidDerivation { class, base, span } => (
                Severity::Error,
                format!("Class '{}' cannot derive from '{}'", class, base),
                vec![label(LabelStyle::Primary, file_id, *span, "cyclic or repeated base")],
                vec![format!("the edge to '{}' was removed", base)],
            ),
            // Still resolvable at runtime through autoloading
            UnknownBaseClass { class, base, span } => (
                Severity::Warning,
                format!("Unknown base class '{}' for '{}'", base, class),
                vec![label(LabelStyle::Primary, file_id, *span, "base never declared")],
                vec![format!("'{}' will be resolved dynamically", class)],
            ),
            DeclaredFunctionTwice {
                class,
                method,
                span,
                original,
            } => (
                Severity::Error,
                format!("Method '{}' declared twice in '{}'", method, class),
                vec![
                    label(LabelStyle::Primary, file_id, *span, "duplicate declaration"),
                    label(LabelStyle::Secondary, file_id, *original, "first declaration here"),
                ],
                vec!["help: calls resolve to the later declaration".to_string()],
            ),
        };

        Diagnostic {
            inner: CsDiagnostic::new(severity)
                .with_message(message)
                .with_code(error_code(error))
                .with_labels(labels)
                .with_notes(notes),
        }
    }

    pub fn severity(&self) -> Severity {
        self.inner.severity
    }

    pub fn code(&self) -> Option<&str> {
        self.inner.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }

    pub fn labels(&self) -> &[Label<usize>] {
        &self.inner.labels
    }

    /// Emit the diagnostic to stderr with colors
    pub fn emit(&self, files: &SimpleFiles<String, String>) -> Result<(), codespan_reporting::files::Error> {
        let mut writer = StandardStream::stderr(ColorChoice::Auto);
        term::emit(&mut writer, &term::Config::default(), files, &self.inner)
    }

    /// Convert to JSON representation for tooling
    pub fn to_json(&self, files: &SimpleFiles<String, String>) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&JsonDiagnostic::from_diagnostic(self, files))
    }
}

/// JSON representation of a diagnostic
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonDiagnostic {
    pub code: Option<String>,
    /// "error" or "warning"
    pub severity: String,
    pub message: String,
    pub labels: Vec<JsonLabel>,
    pub notes: Vec<String>,
}

/// A labelled source range; lines and columns are 1-indexed
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLabel {
    pub file: String,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub message: String,
    pub primary: bool,
}

impl JsonDiagnostic {
    /// Labels whose file or range is unknown to `files` are dropped
    pub fn from_diagnostic(diag: &Diagnostic, files: &SimpleFiles<String, String>) -> Self {
        let severity = match diag.inner.severity {
            Severity::Warning => "warning",
            Severity::Note | Severity::Help => "note",
            Severity::Error | Severity::Bug => "error",
        };

        let labels = diag
            .inner
            .labels
            .iter()
            .filter_map(|label| {
                let file = files.get(label.file_id).ok()?;
                let start = file.location((), label.range.start).ok()?;
                let end = file.location((), label.range.end).ok()?;
                Some(JsonLabel {
                    file: file.name().to_string(),
                    start_line: start.line_number,
                    start_column: start.column_number,
                    end_line: end.line_number,
                    end_column: end.column_number,
                    message: label.message.clone(),
                    primary: label.style == LabelStyle::Primary,
                })
            })
            .collect();

        JsonDiagnostic {
            code: diag.inner.code.clone(),
            severity: severity.to_string(),
            message: diag.inner.message.clone(),
            labels,
            notes: diag.inner.notes.clone(),
        }
    }
}

/// A file set holding a single source
pub fn create_files(path: impl Into<PathBuf>, source: impl Into<String>) -> SimpleFiles<String, String> {
    let mut files = SimpleFiles::new();
    files.add(path.into().display().to_string(), source.into());
    files
}
