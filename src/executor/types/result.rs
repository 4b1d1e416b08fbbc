//! Step results, failure kinds and trace events

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ast::{Location, Span};
use crate::world::sensing::Hazard;
use crate::world::{BlockInfo, BlockPos, WorldError};

/* ===================== Error Kinds ===================== */

/// Closed failure taxonomy reported in results and job errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CompileError,
    InvariantViolation,
    MoveBlocked,
    Unavailable,
    Blocked,
    NoPath,
    OpLimitExceeded,
    LoopLimitExceeded,
    RuntimeError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CompileError => "compile_error",
            ErrorKind::InvariantViolation => "invariant_violation",
            ErrorKind::MoveBlocked => "move_blocked",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Blocked => "blocked",
            ErrorKind::NoPath => "no_path",
            ErrorKind::OpLimitExceeded => "op_limit_exceeded",
            ErrorKind::LoopLimitExceeded => "loop_limit_exceeded",
            ErrorKind::RuntimeError => "runtime_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ===================== Execution Errors ===================== */

/// A failure raised while executing a statement. Converted into a
/// [`StepFailure`] by the executor once the op index is known.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ExecError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
    /// Command that raised the error
    pub op: Option<String>,
    pub notes: Option<JsonValue>,
}

impl ExecError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            op: None,
            notes: None,
        }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CompileError, message)
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvariantViolation, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeError, message)
    }

    /// Attach a span unless a more precise one is already set
    pub fn at(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn for_op(mut self, op: &str) -> Self {
        if self.op.is_none() {
            self.op = Some(op.to_string());
        }
        self
    }

    pub fn with_notes(mut self, notes: JsonValue) -> Self {
        self.notes = Some(notes);
        self
    }
}

impl From<WorldError> for ExecError {
    fn from(err: WorldError) -> Self {
        ExecError::runtime(err.to_string())
    }
}

/* ===================== Results ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSuccess {
    pub op: String,
    pub ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub error: ErrorKind,
    pub message: String,
    pub op_index: usize,
    /// Unix epoch milliseconds
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<JsonValue>,
}

/// Outcome of one executed command (or of the statement that aborted the run)
#[derive(Debug, Clone, PartialEq)]
pub enum CraftscriptResult {
    Success(StepSuccess),
    Failure(StepFailure),
}

impl CraftscriptResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CraftscriptResult::Success(_))
    }

    pub fn op(&self) -> Option<&str> {
        match self {
            CraftscriptResult::Success(s) => Some(&s.op),
            CraftscriptResult::Failure(f) => f.op.as_deref(),
        }
    }

    pub fn as_failure(&self) -> Option<&StepFailure> {
        match self {
            CraftscriptResult::Failure(f) => Some(f),
            CraftscriptResult::Success(_) => None,
        }
    }
}

#[derive(Serialize)]
struct Tagged<'a, T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    inner: &'a T,
}

impl Serialize for CraftscriptResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CraftscriptResult::Success(inner) => Tagged { ok: true, inner }.serialize(serializer),
            CraftscriptResult::Failure(inner) => Tagged { ok: false, inner }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CraftscriptResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Failure(StepFailure),
            Success(StepSuccess),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Failure(f) => CraftscriptResult::Failure(f),
            Raw::Success(s) => CraftscriptResult::Success(s),
        })
    }
}

/// Return value of [`crate::executor::Executor::run`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub ok: bool,
    pub results: Vec<CraftscriptResult>,
}

impl RunOutcome {
    /// The failing result that aborted the run, if any
    pub fn failure(&self) -> Option<&StepFailure> {
        self.results.iter().find_map(CraftscriptResult::as_failure)
    }
}

/* ===================== Trace Events ===================== */

/// Fine-grained interpreter trace, streamed next to step results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    If {
        value: bool,
        loc: Location,
    },
    Repeat {
        count: u64,
        loc: Location,
    },
    WhileIter {
        iteration: u64,
        loc: Location,
    },
    Predicate {
        name: String,
        value: bool,
        loc: Location,
    },
    Command {
        op: String,
        op_index: usize,
        loc: Location,
    },
    Macro {
        name: String,
        loc: Location,
    },
    Hazards {
        op: String,
        hazards: Vec<Hazard>,
    },
    /// Text from a `log` command
    Log {
        text: String,
        loc: Location,
    },
    BlockInfo {
        at: BlockPos,
        info: BlockInfo,
    },
}
