//! Per-job identity and lifecycle.
//!
//! ```text
//! Pending ──▶ Staged ──▶ Converting{1} ──▶ … ──▶ Converting{n} ──▶ Succeeded
//!    │          │              │                      │
//!    └──────────┴──────────────┴──────────────────────┴──────────▶ Failed
//! ```
//!
//! Terminal states are final. Illegal transitions are refused and logged; they
//! indicate a bug in the orchestrator, not a bad request.

use crate::config::ConversionOptions;
use crate::error::ErrorKind;
use crate::format::Format;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;
use uuid::Uuid;

/// Opaque, unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Staged,
    /// Running hop `hop` (1-indexed).
    Converting { hop: usize },
    Succeeded,
    Failed { kind: ErrorKind },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed { .. })
    }

    fn can_become(&self, next: &JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (_, Failed { .. }) => !self.is_terminal(),
            (Pending, Staged) => true,
            (Staged, Converting { hop: 1 }) => true,
            (Converting { hop: a }, Converting { hop: b }) => *b == a + 1,
            (Converting { .. }, Succeeded) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => f.write_str("pending"),
            JobStatus::Staged => f.write_str("staged"),
            JobStatus::Converting { hop } => write!(f, "converting (hop {hop})"),
            JobStatus::Succeeded => f.write_str("succeeded"),
            JobStatus::Failed { kind } => write!(f, "failed ({kind})"),
        }
    }
}

/// One entry of a job's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: JobStatus,
    pub at: DateTime<Utc>,
}

/// A conversion job as tracked by the orchestrator.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: JobId,
    pub declared_name: Option<String>,
    pub target: Format,
    pub options: ConversionOptions,
    pub input_bytes: usize,
    history: Vec<StatusChange>,
}

impl ConversionJob {
    pub fn new(
        declared_name: Option<String>,
        target: Format,
        options: ConversionOptions,
        input_bytes: usize,
    ) -> Self {
        Self {
            id: JobId::new(),
            declared_name,
            target,
            options,
            input_bytes,
            history: vec![StatusChange {
                status: JobStatus::Pending,
                at: Utc::now(),
            }],
        }
    }

    pub fn status(&self) -> JobStatus {
        // history always holds at least the initial Pending entry
        self.history
            .last()
            .map(|c| c.status)
            .unwrap_or(JobStatus::Pending)
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    /// Move to `next` if the state machine allows it. Returns whether the
    /// transition happened.
    pub fn transition(&mut self, next: JobStatus) -> bool {
        let current = self.status();
        if !current.can_become(&next) {
            error!(job = %self.id, "Refused job transition {} → {}", current, next);
            return false;
        }
        self.history.push(StatusChange {
            status: next,
            at: Utc::now(),
        });
        true
    }

    /// Record a failure unless the job is already terminal.
    pub fn fail(&mut self, kind: ErrorKind) {
        if !self.status().is_terminal() {
            self.transition(JobStatus::Failed { kind });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ConversionJob {
        ConversionJob::new(Some("a.docx".into()), Format::Pdf, ConversionOptions::default(), 10)
    }

    #[test]
    fn happy_path() {
        let mut j = job();
        assert_eq!(j.status(), JobStatus::Pending);
        assert!(j.transition(JobStatus::Staged));
        assert!(j.transition(JobStatus::Converting { hop: 1 }));
        assert!(j.transition(JobStatus::Converting { hop: 2 }));
        assert!(j.transition(JobStatus::Succeeded));
        assert_eq!(j.history().len(), 5);
        assert!(j.history().windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[test]
    fn terminal_states_are_final() {
        let mut j = job();
        j.fail(ErrorKind::Overloaded);
        assert!(j.status().is_terminal());
        assert!(!j.transition(JobStatus::Staged));
        assert!(!j.transition(JobStatus::Failed {
            kind: ErrorKind::Cancelled
        }));
        j.fail(ErrorKind::Cancelled);
        assert_eq!(
            j.status(),
            JobStatus::Failed {
                kind: ErrorKind::Overloaded
            }
        );
    }

    #[test]
    fn hops_cannot_be_skipped() {
        let mut j = job();
        assert!(!j.transition(JobStatus::Converting { hop: 1 }));
        assert!(j.transition(JobStatus::Staged));
        assert!(!j.transition(JobStatus::Converting { hop: 2 }));
        assert!(!j.transition(JobStatus::Succeeded));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
        assert_eq!(JobId::new().to_string().len(), 32);
    }

    #[test]
    fn status_serialises_with_tag() {
        let json = serde_json::to_string(&JobStatus::Converting { hop: 2 }).unwrap();
        assert_eq!(json, r#"{"state":"converting","hop":2}"#);
    }
}
