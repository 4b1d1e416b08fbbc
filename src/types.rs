use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::executor::types::{CraftscriptResult, ErrorKind, StepFailure, TraceEvent};
use crate::parser::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Canceled
        )
    }
}

/// Structured error recorded on a failed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<JsonValue>,
}

impl JobFailure {
    pub fn from_step(step: &StepFailure) -> Self {
        Self {
            kind: step.error,
            message: step.message.clone(),
            op: step.op.clone(),
            op_index: Some(step.op_index),
            line: step.loc.map(|loc| loc.line),
            column: step.loc.map(|loc| loc.column),
            notes: step.notes.clone(),
        }
    }

    pub fn from_parse(err: &ParseError) -> Self {
        let loc = err.location();
        Self {
            kind: ErrorKind::CompileError,
            message: err.message().to_string(),
            op: None,
            op_index: None,
            line: loc.map(|loc| loc.line),
            column: loc.map(|loc| loc.column),
            notes: None,
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::RuntimeError,
            message: message.into(),
            op: None,
            op_index: None,
            line: None,
            column: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_step: Option<CraftscriptResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

impl Job {
    pub fn queued(id: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: JobState::Queued,
            script: script.into(),
            started_at: None,
            ended_at: None,
            last_step: None,
            error: None,
        }
    }

    /// Wall time between start and end, zero if the job never started
    pub fn duration_ms(&self) -> u64 {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
            _ => 0,
        }
    }
}

/// Terminal status event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub id: String,
    pub state: JobState,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

/// Everything a job publishes on its event channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Step {
        job_id: String,
        result: CraftscriptResult,
    },
    Trace {
        job_id: String,
        trace: TraceEvent,
    },
    Status(StatusEvent),
    /// Best-effort user-facing message for parse and runtime failures
    Notice {
        job_id: String,
        message: String,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Step { job_id, .. }
            | JobEvent::Trace { job_id, .. }
            | JobEvent::Notice { job_id, .. } => job_id,
            JobEvent::Status(status) => &status.id,
        }
    }
}
