use std::{future::Future, sync::Arc};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Progress,
    Success,
    Failure,
}

/// Last thing a job reported about itself, shaped for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

impl JobSnapshot {
    pub fn new(kind: &str, content: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub state: JobState,
    pub info: Option<JobSnapshot>,
}

/// In-process registry of background jobs, keyed by job id. Submitted work
/// receives a [`JobHandle`] to publish progress; callers poll by id.
#[derive(Clone, Default)]
pub struct JobTracker {
    jobs: Arc<DashMap<Uuid, JobStatus>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the work on tokio and starts tracking it as PROGRESS. The
    /// future's result decides the terminal state.
    pub fn submit<F, Fut>(&self, work: F) -> Uuid
    where
        F: FnOnce(JobHandle) -> Fut,
        Fut: Future<Output = Result<JobSnapshot, anyhow::Error>> + Send + 'static,
    {
        let job_id = Uuid::new_v4();
        self.jobs.insert(
            job_id,
            JobStatus {
                state: JobState::Progress,
                info: None,
            },
        );

        let handle = JobHandle {
            job_id,
            jobs: self.jobs.clone(),
        };
        let fut = work(handle.clone());
        tokio::spawn(async move {
            match fut.await {
                Ok(snapshot) => handle.set(JobState::Success, Some(snapshot)),
                Err(err) => {
                    tracing::error!(job_id = %handle.job_id, error = %err, "background job failed");
                    handle.set(
                        JobState::Failure,
                        Some(JobSnapshot::new("error", err.to_string())),
                    );
                }
            }
        });

        job_id
    }

    pub fn poll(&self, job_id: Uuid) -> Option<JobStatus> {
        self.jobs.get(&job_id).map(|status| status.clone())
    }
}

#[derive(Clone)]
pub struct JobHandle {
    job_id: Uuid,
    jobs: Arc<DashMap<Uuid, JobStatus>>,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn report(&self, snapshot: JobSnapshot) {
        self.set(JobState::Progress, Some(snapshot));
    }

    fn set(&self, state: JobState, info: Option<JobSnapshot>) {
        self.jobs.insert(self.job_id, JobStatus { state, info });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn wait_for_terminal(tracker: &JobTracker, job_id: Uuid) -> JobStatus {
        for _ in 0..100 {
            if let Some(status) = tracker.poll(job_id)
                && status.state != JobState::Progress
            {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn successful_job_keeps_its_final_snapshot() {
        let tracker = JobTracker::new();
        let job_id = tracker.submit(|handle| async move {
            handle.report(JobSnapshot::new("extracting", "50.00% - 1/2"));
            Ok(JobSnapshot::new("completed", "Extraction process completed"))
        });

        let status = wait_for_terminal(&tracker, job_id).await;
        assert_eq!(status.state, JobState::Success);
        assert_eq!(status.info.map(|s| s.kind).as_deref(), Some("completed"));
    }

    #[tokio::test]
    async fn failing_job_records_the_error() {
        let tracker = JobTracker::new();
        let job_id =
            tracker.submit(|_handle| async move { Err(anyhow::anyhow!("boom")) });

        let status = wait_for_terminal(&tracker, job_id).await;
        assert_eq!(status.state, JobState::Failure);
        assert_eq!(status.info.map(|s| s.content).as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn unknown_job_polls_as_none() {
        let tracker = JobTracker::new();
        assert!(tracker.poll(Uuid::new_v4()).is_none());
    }
}
