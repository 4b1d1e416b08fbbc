//! Job registry owned by a manager
//!
//! One record per job id. The record's `state_tx` mirrors the job state so
//! waiters can block on a terminal state without polling, and `events` is
//! the job's single outbound channel.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::types::{Job, JobEvent, JobState};

struct JobRecord {
    seq: u64,
    job: Job,
    events: broadcast::Sender<JobEvent>,
    state_tx: watch::Sender<JobState>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    records: HashMap<String, JobRecord>,
}

pub struct JobStore {
    inner: Mutex<Inner>,
    event_capacity: usize,
}

impl JobStore {
    pub fn new(event_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            event_capacity: event_capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a job and hand back a receiver subscribed before any event
    pub fn insert(&self, job: Job) -> broadcast::Receiver<JobEvent> {
        let (events, rx) = broadcast::channel(self.event_capacity);
        let (state_tx, _) = watch::channel(job.state);

        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.records.insert(
            job.id.clone(),
            JobRecord {
                seq,
                job,
                events,
                state_tx,
                cancel: CancellationToken::new(),
            },
        );
        rx
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.lock().records.get(id).map(|r| r.job.clone())
    }

    /// Apply `f` to a job and return the updated copy
    pub fn update(&self, id: &str, f: impl FnOnce(&mut Job)) -> Option<Job> {
        let mut inner = self.lock();
        let record = inner.records.get_mut(id)?;
        f(&mut record.job);
        record.state_tx.send_if_modified(|state| {
            let changed = *state != record.job.state;
            *state = record.job.state;
            changed
        });
        Some(record.job.clone())
    }

    /// Like [`JobStore::update`], but leaves terminal jobs untouched
    pub fn update_live(&self, id: &str, f: impl FnOnce(&mut Job)) -> Option<Job> {
        let mut applied = false;
        self.update(id, |job| {
            if !job.state.is_terminal() {
                f(job);
                applied = true;
            }
        })
        .filter(|_| applied)
    }

    pub fn publish(&self, event: JobEvent) {
        if let Some(record) = self.lock().records.get(event.job_id()) {
            // no subscribers is fine
            let _ = record.events.send(event);
        }
    }

    pub fn subscribe(&self, id: &str) -> Option<broadcast::Receiver<JobEvent>> {
        self.lock().records.get(id).map(|r| r.events.subscribe())
    }

    pub fn watch_state(&self, id: &str) -> Option<watch::Receiver<JobState>> {
        self.lock().records.get(id).map(|r| r.state_tx.subscribe())
    }

    pub fn cancel_token(&self, id: &str) -> Option<CancellationToken> {
        self.lock().records.get(id).map(|r| r.cancel.clone())
    }

    /// All jobs in submission order
    pub fn list(&self) -> Vec<Job> {
        let inner = self.lock();
        let mut records: Vec<&JobRecord> = inner.records.values().collect();
        records.sort_by_key(|r| r.seq);
        records.into_iter().map(|r| r.job.clone()).collect()
    }

    pub fn remove_terminal(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.records.len();
        inner.records.retain(|_, r| !r.job.state.is_terminal());
        before - inner.records.len()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
