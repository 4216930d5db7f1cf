//! Error types for the docforge library.
//!
//! Three independent engines fail in three different ways: LibreOffice hangs
//! or exits 0 without writing anything, Ghostscript prints PostScript errors
//! and exits non-zero, ImageMagick complains about delegates. Every one of
//! those ends up as a [`ConvertError`] whose [`ErrorKind`] comes from a small
//! closed set, so the HTTP layer in front of the orchestrator can map kinds
//! to status codes without parsing engine output.
//!
//! * [`ConvertError`] — returned from every `Converter` entry point.
//! * [`ErrorKind`] — the closed taxonomy, with a suggested HTTP status.
//! * [`ErrorReport`] — serialisable `{ kind, detail, truncated }` handed to
//!   callers that cross a process boundary.

use crate::engine::EngineKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Upper bound on the `detail` string of an [`ErrorReport`].
pub const MAX_REPORT_DETAIL: usize = 8 * 1024;

/// All errors returned by the docforge library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Request errors (no engine runs) ───────────────────────────────────
    /// Neither content sniffing nor the declared name identified a known format.
    #[error("Unsupported input format{}: {detail}", declared_suffix(.declared_name))]
    UnsupportedFormat {
        declared_name: Option<String>,
        detail: String,
    },

    /// No route exists for the requested (source, target) pair.
    #[error("Conversion from '{from}' to '{to}' is not supported")]
    UnsupportedConversion { from: String, to: String },

    /// Options or configuration failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Admission / lifecycle ─────────────────────────────────────────────
    /// The in-flight limit was reached and the request could not be queued.
    #[error("Converter overloaded: {in_flight} jobs in flight (limit {limit}){}", queued_suffix(*.waited_ms))]
    Overloaded {
        in_flight: usize,
        limit: usize,
        waited_ms: Option<u64>,
    },

    /// The caller cancelled the job.
    #[error("Job cancelled during {stage}")]
    Cancelled { stage: String },

    // ── Workspace errors (job-fatal, never retried) ───────────────────────
    /// Creating, writing, reading or listing the job workspace failed.
    #[error("Workspace {operation} failed for '{}': {source}", .path.display())]
    Workspace {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The engine did not finish within its per-hop timeout and was killed.
    #[error("{engine} engine timed out after {}s", .timeout_ms / 1000)]
    EngineTimeout { engine: EngineKind, timeout_ms: u64 },

    /// The engine could not be launched or exited with a non-zero status.
    #[error("{engine} engine failed ({}): {diagnostic}", exit_label(*.exit_code))]
    EngineExecution {
        engine: EngineKind,
        exit_code: Option<i32>,
        diagnostic: Diagnostic,
    },

    /// The engine reported success but the expected output is absent or empty.
    #[error("{engine} engine produced no output at '{}': {detail}", .expected.display())]
    EngineOutputMissing {
        engine: EngineKind,
        expected: PathBuf,
        detail: String,
    },
}

fn declared_suffix(name: &Option<String>) -> String {
    name.as_ref()
        .map(|n| format!(" for '{n}'"))
        .unwrap_or_default()
}

fn queued_suffix(waited_ms: Option<u64>) -> String {
    waited_ms
        .map(|ms| format!(" after waiting {ms}ms"))
        .unwrap_or_default()
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "no exit code".to_string(),
    }
}

impl ConvertError {
    /// The taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            ConvertError::UnsupportedConversion { .. } => ErrorKind::UnsupportedConversion,
            ConvertError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ConvertError::Overloaded { .. } => ErrorKind::Overloaded,
            ConvertError::Cancelled { .. } => ErrorKind::Cancelled,
            ConvertError::Workspace { .. } => ErrorKind::WorkspaceError,
            ConvertError::EngineTimeout { .. } => ErrorKind::EngineTimeout,
            ConvertError::EngineExecution { .. } => ErrorKind::EngineExecutionError,
            ConvertError::EngineOutputMissing { .. } => ErrorKind::EngineOutputMissing,
        }
    }

    /// Whether a single retry is allowed.
    ///
    /// Only an Office-engine timeout qualifies: LibreOffice occasionally hangs
    /// on first launch while it initialises a fresh user profile.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConvertError::EngineTimeout {
                engine: EngineKind::Office,
                ..
            }
        )
    }

    /// Build the caller-facing report, truncating the detail to
    /// [`MAX_REPORT_DETAIL`] bytes.
    pub fn report(&self) -> ErrorReport {
        let full = self.to_string();
        let engine_truncated = matches!(
            self,
            ConvertError::EngineExecution { diagnostic, .. } if diagnostic.truncated
        );
        let (detail, cut) = truncate_utf8(&full, MAX_REPORT_DETAIL);
        ErrorReport {
            kind: self.kind(),
            detail: detail.to_string(),
            truncated: cut || engine_truncated,
        }
    }

    pub(crate) fn workspace(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        ConvertError::Workspace {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn cancelled(stage: impl Into<String>) -> Self {
        ConvertError::Cancelled {
            stage: stage.into(),
        }
    }
}

// ── Kinds ────────────────────────────────────────────────────────────────

/// Closed error taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedFormat,
    UnsupportedConversion,
    WorkspaceError,
    EngineTimeout,
    EngineExecutionError,
    EngineOutputMissing,
    Overloaded,
    Cancelled,
    InvalidRequest,
}

impl ErrorKind {
    /// Suggested HTTP status for the router layer.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::UnsupportedFormat => 415,
            ErrorKind::UnsupportedConversion => 422,
            ErrorKind::WorkspaceError => 500,
            ErrorKind::EngineTimeout => 504,
            ErrorKind::EngineExecutionError => 502,
            ErrorKind::EngineOutputMissing => 502,
            ErrorKind::Overloaded => 503,
            // nginx's "client closed request"
            ErrorKind::Cancelled => 499,
            ErrorKind::InvalidRequest => 400,
        }
    }

    /// True for kinds caused by the request itself rather than the service.
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Structured error handed across the orchestrator boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub detail: String,
    /// Engine output or the detail string was cut to its size bound.
    pub truncated: bool,
}

// ── Diagnostics ──────────────────────────────────────────────────────────

/// Captured engine output attached to an execution failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub text: String,
    /// The engine wrote more than the configured bound.
    pub truncated: bool,
}

impl Diagnostic {
    /// Build a diagnostic from raw text, keeping at most `limit` bytes.
    pub fn bounded(text: &str, limit: usize, already_truncated: bool) -> Self {
        let (kept, cut) = truncate_utf8(text.trim(), limit);
        Diagnostic {
            text: kept.to_string(),
            truncated: cut || already_truncated,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            f.write_str("<no output>")?;
        } else {
            f.write_str(&self.text)?;
        }
        if self.truncated {
            f.write_str(" …[truncated]")?;
        }
        Ok(())
    }
}

/// Cut `s` to at most `limit` bytes without splitting a UTF-8 sequence.
pub(crate) fn truncate_utf8(s: &str, limit: usize) -> (&str, bool) {
    if s.len() <= limit {
        return (s, false);
    }
    let mut end = limit;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    (&s[..end], true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_conversion_display() {
        let e = ConvertError::UnsupportedConversion {
            from: "pdf".into(),
            to: "xyz".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("'pdf'"), "got: {msg}");
        assert!(msg.contains("'xyz'"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::UnsupportedConversion);
    }

    #[test]
    fn engine_timeout_display() {
        let e = ConvertError::EngineTimeout {
            engine: EngineKind::Pdf,
            timeout_ms: 5000,
        };
        assert!(e.to_string().contains("5s"));
        assert_eq!(e.kind().http_status(), 504);
    }

    #[test]
    fn only_office_timeouts_are_transient() {
        let office = ConvertError::EngineTimeout {
            engine: EngineKind::Office,
            timeout_ms: 1000,
        };
        let gs = ConvertError::EngineTimeout {
            engine: EngineKind::Pdf,
            timeout_ms: 1000,
        };
        let failed = ConvertError::EngineExecution {
            engine: EngineKind::Office,
            exit_code: Some(1),
            diagnostic: Diagnostic::default(),
        };
        assert!(office.is_transient());
        assert!(!gs.is_transient());
        assert!(!failed.is_transient());
    }

    #[test]
    fn execution_display_carries_exit_code_and_output() {
        let e = ConvertError::EngineExecution {
            engine: EngineKind::Image,
            exit_code: Some(3),
            diagnostic: Diagnostic::bounded("no decode delegate", 100, false),
        };
        let msg = e.to_string();
        assert!(msg.contains("exit code 3"), "got: {msg}");
        assert!(msg.contains("no decode delegate"), "got: {msg}");
    }

    #[test]
    fn diagnostic_truncates_on_char_boundary() {
        let d = Diagnostic::bounded("ééééé", 3, false);
        assert_eq!(d.text, "é");
        assert!(d.truncated);
        assert!(d.to_string().ends_with("[truncated]"));
    }

    #[test]
    fn report_flags_truncated_engine_output() {
        let e = ConvertError::EngineExecution {
            engine: EngineKind::Pdf,
            exit_code: Some(1),
            diagnostic: Diagnostic::bounded(&"x".repeat(50), 10, false),
        };
        let report = e.report();
        assert_eq!(report.kind, ErrorKind::EngineExecutionError);
        assert!(report.truncated);
    }

    #[test]
    fn report_bounds_detail() {
        let e = ConvertError::InvalidRequest("y".repeat(MAX_REPORT_DETAIL * 2));
        let report = e.report();
        assert!(report.detail.len() <= MAX_REPORT_DETAIL);
        assert!(report.truncated);
    }

    #[test]
    fn report_serialises_kind_by_name() {
        let report = ConvertError::Overloaded {
            in_flight: 4,
            limit: 4,
            waited_ms: None,
        }
        .report();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"Overloaded\""), "got: {json}");
    }

    #[test]
    fn client_error_split() {
        assert!(ErrorKind::UnsupportedFormat.is_client_error());
        assert!(ErrorKind::Cancelled.is_client_error());
        assert!(!ErrorKind::EngineTimeout.is_client_error());
        assert!(!ErrorKind::Overloaded.is_client_error());
    }
}
