//! CraftScript interpreter
//!
//! Walks a parsed [`Program`] statement by statement against the sensing
//! facade, enforcing safety checks before every irreversible world action
//! and a global operation budget. Execution is fail-fast: the first failing
//! command aborts the run and becomes the last entry in the result list.
//!
//! ```ignore
//! let mut executor = Executor::new(sensing, waypoints, ExecutorOptions::default());
//! let outcome = executor.run(&parse("move F1; dig F1")?).await;
//! assert!(outcome.ok);
//! ```

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::parser::{macros, MacroTable};
use crate::waypoints::WaypointStore;
use crate::world::Sensing;

pub mod commands;
pub mod expressions;
pub mod statements;
pub mod types;

pub use types::{
    CraftscriptResult, ErrorKind, ExecError, Program, RunOutcome, StepFailure, StepSuccess,
    TraceEvent, Val,
};

#[cfg(test)]
mod tests;

/* ===================== Options ===================== */

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorOptions {
    /// Maximum statements per run; also bounds while-loop iterations
    pub op_limit: usize,
    pub default_scan_radius: i32,
    pub max_scan_radius: i32,
    /// Maximum distance to a dig target or placement reference
    pub reach: f64,
    /// Trace hazards before move/dig/place
    pub auto_scan: bool,
    pub nav_timeout: Duration,
    pub default_tolerance: i32,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            op_limit: 10_000,
            default_scan_radius: 2,
            max_scan_radius: 8,
            reach: 4.5,
            auto_scan: true,
            nav_timeout: Duration::from_millis(10_000),
            default_tolerance: 1,
        }
    }
}

/* ===================== Events ===================== */

/// Streamed while a run is in progress
#[derive(Debug, Clone, PartialEq)]
pub enum ExecEvent {
    Step(CraftscriptResult),
    Trace(TraceEvent),
}

/// Why statement execution stopped early
#[derive(Debug)]
pub(crate) enum Interrupt {
    Failed(ExecError),
    Canceled,
}

impl From<ExecError> for Interrupt {
    fn from(err: ExecError) -> Self {
        Interrupt::Failed(err)
    }
}

pub(crate) type ExecResult<T = ()> = Result<T, Interrupt>;

/* ===================== Executor ===================== */

pub struct Executor {
    sensing: Sensing,
    waypoints: Arc<dyn WaypointStore>,
    options: ExecutorOptions,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<ExecEvent>>,
    ops: usize,
    macros: Arc<MacroTable>,
    results: Vec<CraftscriptResult>,
}

impl Executor {
    pub fn new(
        sensing: Sensing,
        waypoints: Arc<dyn WaypointStore>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            sensing,
            waypoints,
            options,
            cancel: CancellationToken::new(),
            events: None,
            ops: 0,
            macros: Arc::new(MacroTable::default()),
            results: Vec::new(),
        }
    }

    /// Stop at the next statement boundary once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Operations consumed by the current or last run
    pub fn ops(&self) -> usize {
        self.ops
    }

    /// Execute a program to completion, failure or cancellation
    pub async fn run(&mut self, program: &Program) -> RunOutcome {
        self.ops = 0;
        self.results.clear();

        // Pre-pass: macro table plus explicit MacroCall nodes, also for
        // programs that did not come from `parse` (e.g. deserialized ASTs).
        let mut program = program.clone();
        let prepared = MacroTable::collect(&program)
            .and_then(|table| macros::resolve_calls(&mut program, &table))
            // collect again so macro bodies hold the rewritten calls
            .and_then(|_| MacroTable::collect(&program));
        let table = match prepared {
            Ok(table) => table,
            Err(err) => {
                let failure = ExecError::compile(err.message().to_string());
                let failure = match err.span() {
                    Some(span) => failure.at(span),
                    None => failure,
                };
                let result = CraftscriptResult::Failure(self.failure(failure));
                self.push(result);
                return self.outcome(false);
            }
        };
        self.macros = Arc::new(table);

        let ok = match self.exec_statements(&program.body).await {
            Ok(()) => true,
            Err(Interrupt::Failed(err)) => {
                debug!(kind = %err.kind, message = %err.message, op_index = self.ops, "Run failed");
                let result = CraftscriptResult::Failure(self.failure(err));
                self.push(result);
                false
            }
            Err(Interrupt::Canceled) => {
                info!(op_index = self.ops, "Run canceled");
                false
            }
        };

        self.outcome(ok)
    }

    /// Like [`Executor::run`], streaming steps and traces to `events` as
    /// they happen. The sender is dropped when the run ends.
    pub async fn run_streaming(
        &mut self,
        program: &Program,
        events: mpsc::UnboundedSender<ExecEvent>,
    ) -> RunOutcome {
        self.events = Some(events);
        let outcome = self.run(program).await;
        self.events = None;
        outcome
    }

    fn outcome(&mut self, ok: bool) -> RunOutcome {
        RunOutcome {
            ok,
            results: std::mem::take(&mut self.results),
        }
    }

    /// Count one statement against the budget. The counter never exceeds
    /// `op_limit`, so a budget of N reports N on overflow.
    fn bump_ops(&mut self) -> Result<(), ExecError> {
        if self.ops >= self.options.op_limit {
            return Err(ExecError::new(
                ErrorKind::OpLimitExceeded,
                format!("op_limit_exceeded: budget of {} operations used", self.options.op_limit),
            ));
        }
        self.ops += 1;
        Ok(())
    }

    fn failure(&self, err: ExecError) -> StepFailure {
        StepFailure {
            error: err.kind,
            message: err.message,
            op_index: self.ops,
            ts: Utc::now().timestamp_millis(),
            loc: err.span.map(|span| span.location()),
            op: err.op,
            notes: err.notes,
        }
    }

    fn push(&mut self, result: CraftscriptResult) {
        self.emit(ExecEvent::Step(result.clone()));
        self.results.push(result);
    }

    fn emit(&self, event: ExecEvent) {
        if let Some(events) = &self.events {
            // the receiver may have gone away; the run continues regardless
            let _ = events.send(event);
        }
    }

    fn trace(&self, event: TraceEvent) {
        self.emit(ExecEvent::Trace(event));
    }
}
