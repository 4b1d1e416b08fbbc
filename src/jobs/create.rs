use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use super::JobManager;
use crate::types::{Job, JobEvent};

impl JobManager {
    /// Register a job and start running it in the background
    pub fn create(&self, script: impl Into<String>) -> String {
        self.create_with_events(script).0
    }

    /// Like [`JobManager::create`], returning a receiver subscribed before
    /// the run starts so no event is missed
    pub fn create_with_events(
        &self,
        script: impl Into<String>,
    ) -> (String, broadcast::Receiver<JobEvent>) {
        let id = format!("cs_{}", Uuid::new_v4());
        let events = self.store.insert(Job::queued(id.clone(), script));

        info!(job_id = %id, "Job queued");
        tokio::spawn(self.clone().run_job(id.clone()));

        (id, events)
    }
}
