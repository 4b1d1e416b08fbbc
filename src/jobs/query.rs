use tokio::sync::broadcast;

use super::{JobError, JobManager};
use crate::types::{Job, JobEvent};

impl JobManager {
    pub fn status(&self, id: &str) -> Result<Job, JobError> {
        self.store
            .get(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Every known job in submission order
    pub fn list(&self) -> Vec<Job> {
        self.store.list()
    }

    /// Events published from now on. Earlier events are not replayed.
    pub fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<JobEvent>, JobError> {
        self.store
            .subscribe(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Resolve once the job reaches a terminal state
    pub async fn wait(&self, id: &str) -> Result<Job, JobError> {
        let mut rx = self
            .store
            .watch_state(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        // Err only if the record was pruned meanwhile, which status() reports
        let _ = rx.wait_for(|state| state.is_terminal()).await;
        self.status(id)
    }

    /// Forget finished jobs, returning how many were removed
    pub fn prune_finished(&self) -> usize {
        self.store.remove_terminal()
    }
}
