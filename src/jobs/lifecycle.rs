use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::JobManager;
use crate::executor::{ExecEvent, Executor, Program, RunOutcome};
use crate::parser;
use crate::types::{Job, JobEvent, JobFailure, JobState, StatusEvent};

impl JobManager {
    /// Drive one job from `queued` to a terminal state
    pub(super) async fn run_job(self, id: String) {
        let _slot = self.slot.lock().await;

        let Some(job) = self.store.update_live(&id, |job| {
            job.state = JobState::Running;
            job.started_at = Some(Utc::now());
        }) else {
            // canceled while waiting for the slot
            return;
        };
        info!(job_id = %id, "Job started");

        let program = match parser::parse(&job.script) {
            Ok(program) => program,
            Err(err) => {
                warn!(job_id = %id, error = %err, "Job script did not parse");
                self.store.publish(JobEvent::Notice {
                    job_id: id.clone(),
                    message: format!("parse error: {}", err.message()),
                });
                self.finish(&id, JobState::Failed, Some(JobFailure::from_parse(&err)));
                return;
            }
        };

        let run = AssertUnwindSafe(self.execute(&id, &program)).catch_unwind().await;
        match run {
            Ok(outcome) if outcome.ok => self.finish(&id, JobState::Completed, None),
            Ok(outcome) => match outcome.failure() {
                Some(step) => {
                    self.finish(&id, JobState::Failed, Some(JobFailure::from_step(step)))
                }
                // stopped without a failure: the token was cancelled
                None => self.finish(&id, JobState::Canceled, None),
            },
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(job_id = %id, %message, "Job panicked");
                self.store.publish(JobEvent::Notice {
                    job_id: id.clone(),
                    message: format!("runtime error: {}", message),
                });
                self.finish(&id, JobState::Failed, Some(JobFailure::runtime(message)));
            }
        }
    }

    /// Run the program while forwarding executor events to subscribers
    async fn execute(&self, id: &str, program: &Program) -> RunOutcome {
        let cancel = self.store.cancel_token(id).unwrap_or_default();
        let mut executor = Executor::new(
            self.sensing.clone(),
            self.waypoints.clone(),
            self.options.clone(),
        )
        .with_cancellation(cancel);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = executor.run_streaming(program, tx);

        let pump = async {
            while let Some(event) = rx.recv().await {
                let forwarded = match event {
                    ExecEvent::Step(result) => {
                        let updated = self.store.update_live(id, |job| {
                            job.last_step = Some(result.clone());
                        });
                        updated.map(|_| JobEvent::Step {
                            job_id: id.to_string(),
                            result,
                        })
                    }
                    ExecEvent::Trace(trace) => self
                        .store
                        .get(id)
                        .filter(|job| !job.state.is_terminal())
                        .map(|_| JobEvent::Trace {
                            job_id: id.to_string(),
                            trace,
                        }),
                };
                match forwarded {
                    Some(event) => self.store.publish(event),
                    // job ended underneath us; nothing more is surfaced
                    None => break,
                }
            }
        };

        let (outcome, ()) = tokio::join!(run, pump);
        outcome
    }

    /// Move a live job to a terminal state and announce it
    fn finish(&self, id: &str, state: JobState, failure: Option<JobFailure>) {
        let Some(job) = self.store.update_live(id, |job| {
            job.state = state;
            job.ended_at = Some(Utc::now());
            job.error = failure;
        }) else {
            return;
        };

        info!(job_id = %id, state = ?state, duration_ms = job.duration_ms(), "Job finished");
        self.publish_status(&job);
    }

    /// Cancel a queued or running job. The command in flight is left to
    /// finish; the run stops at the next statement boundary. Terminal jobs
    /// are returned unchanged and an unknown id is ignored.
    pub fn cancel(&self, id: &str) -> Option<Job> {
        let Some(job) = self.store.update_live(id, |job| {
            job.state = JobState::Canceled;
            job.ended_at = Some(Utc::now());
        }) else {
            return self.status(id).ok();
        };

        if let Some(token) = self.store.cancel_token(id) {
            token.cancel();
        }
        info!(job_id = %id, "Job canceled");
        self.publish_status(&job);
        Some(job)
    }

    fn publish_status(&self, job: &Job) {
        self.store.publish(JobEvent::Status(StatusEvent {
            id: job.id.clone(),
            state: job.state,
            duration_ms: job.duration_ms(),
            error: job.error.clone(),
        }));
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}
