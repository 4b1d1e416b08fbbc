//! Job lifecycle management
//!
//! A [`JobManager`] wraps one parse+execute run per job in an observable
//! state machine:
//!
//! ```text
//! queued ──▶ running ──▶ completed
//!   │           │
//!   │           └──────▶ failed
//!   └──────────┴───────▶ canceled
//! ```
//!
//! One manager drives one agent. Jobs share a single execution slot, so at
//! most one job touches the world at a time; later jobs wait in `queued`.
//!
//! - Creating jobs (fire-and-forget, optionally pre-subscribed to events)
//! - Running and finishing jobs, including cancellation
//! - Querying, waiting on and pruning jobs

mod create;
mod lifecycle;
mod query;
pub mod store;


use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use crate::executor::ExecutorOptions;
use crate::waypoints::WaypointStore;
use crate::world::Sensing;

pub use store::JobStore;

/// Default capacity of each job's event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(String),
}

#[derive(Clone)]
pub struct JobManager {
    sensing: Sensing,
    waypoints: Arc<dyn WaypointStore>,
    options: ExecutorOptions,
    store: Arc<JobStore>,
    slot: Arc<AsyncMutex<()>>,
}

impl JobManager {
    pub fn new(sensing: Sensing, waypoints: Arc<dyn WaypointStore>, options: ExecutorOptions) -> Self {
        Self {
            sensing,
            waypoints,
            options,
            store: Arc::new(JobStore::new(DEFAULT_EVENT_CAPACITY)),
            slot: Arc::new(AsyncMutex::new(())),
        }
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.store = Arc::new(JobStore::new(capacity));
        self
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    pub fn sensing(&self) -> &Sensing {
        &self.sensing
    }
}
