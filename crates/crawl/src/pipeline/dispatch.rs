//! Trigger interface: create a job and run it in the background.

use std::sync::Arc;

use gleaner_core::Error;
use tokio::task::JoinHandle;

use super::controller::{JobController, JobSummary};
use crate::error::JobError;

/// A job that has been created and handed to the runtime.
#[derive(Debug)]
pub struct Submission {
    pub job_id: i64,
    pub handle: JoinHandle<Result<JobSummary, JobError>>,
}

#[derive(Clone)]
pub struct JobDispatcher {
    controller: Arc<JobController>,
}

impl JobDispatcher {
    pub fn new(controller: JobController) -> Self {
        Self { controller: Arc::new(controller) }
    }

    /// Create a pending job for an active source and spawn its run.
    ///
    /// Returns as soon as the job row exists; progress is visible through the
    /// job row or by awaiting the handle.
    pub async fn submit(&self, source_id: i64) -> Result<Submission, Error> {
        let store = self.controller.store();
        let source = store.require_source(source_id).await?;
        if !source.is_active {
            return Err(Error::InvalidInput(format!("source {source_id} is not active")));
        }

        let job = store.create_job(source_id).await?;
        tracing::info!(job_id = job.id, source_id, "job submitted");

        let controller = Arc::clone(&self.controller);
        let job_id = job.id;
        let handle = tokio::spawn(async move { controller.run(job_id).await });

        Ok(Submission { job_id, handle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticSource;
    use gleaner_core::models::{JobStatus, NewSource};
    use gleaner_core::{AppConfig, Store};

    #[tokio::test]
    async fn test_submit_runs_job() {
        let store = Store::open_in_memory().await.unwrap();
        let mut new = NewSource::new("Example", "https://x.com/");
        new.follow_links = false;
        new.delay_between_requests = 0.0;
        let source = store.insert_source(&new).await.unwrap();

        let pages = StaticSource::new().page("https://x.com/", "<html><body><p>nothing yet</p></body></html>");
        let dispatcher = JobDispatcher::new(JobController::new(store.clone(), Arc::new(pages), AppConfig::default()));

        let submission = dispatcher.submit(source.id).await.unwrap();
        let summary = submission.handle.await.unwrap().unwrap();
        assert_eq!(summary.job_id, submission.job_id);
        assert_eq!(summary.status, JobStatus::Completed);
        assert_eq!(store.require_job(submission.job_id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_submit_rejects_inactive_or_missing_source() {
        let store = Store::open_in_memory().await.unwrap();
        let mut new = NewSource::new("Paused", "https://x.com/");
        new.is_active = false;
        let source = store.insert_source(&new).await.unwrap();
        let dispatcher =
            JobDispatcher::new(JobController::new(store.clone(), Arc::new(StaticSource::new()), AppConfig::default()));

        assert!(matches!(dispatcher.submit(source.id).await, Err(Error::InvalidInput(_))));
        assert!(matches!(dispatcher.submit(999).await, Err(Error::NotFound(_))));
        assert!(store.list_jobs_for_source(source.id).await.unwrap().is_empty());
    }
}
