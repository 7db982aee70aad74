use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::Instrument;

use crate::core::config::JobSettings;
use crate::services::errors::ServiceError;

/// Bounded executor for detached background jobs.
///
/// `admission` caps jobs that are running or waiting; `execution` caps jobs
/// running at once. A slot is reserved before a handler writes any state, so a
/// full queue is reported to the caller instead of leaving orphaned entries.
#[derive(Clone)]
pub(crate) struct JobRunner {
    admission: Arc<Semaphore>,
    execution: Arc<Semaphore>,
    max_queued: usize,
}

/// An admitted but not yet started job.
pub(crate) struct JobSlot {
    admitted: OwnedSemaphorePermit,
    execution: Arc<Semaphore>,
}

impl JobRunner {
    pub(crate) fn new(settings: &JobSettings) -> Self {
        Self {
            admission: Arc::new(Semaphore::new(settings.max_queued)),
            execution: Arc::new(Semaphore::new(settings.max_concurrent)),
            max_queued: settings.max_queued,
        }
    }

    pub(crate) fn reserve(&self) -> Result<JobSlot, ServiceError> {
        let admitted = self.admission.clone().try_acquire_owned().map_err(|_| {
            metrics::counter!("job_queue_rejections_total").increment(1);
            ServiceError::Busy
        })?;
        Ok(JobSlot { admitted, execution: self.execution.clone() })
    }

    /// Jobs admitted and not finished yet.
    pub(crate) fn in_flight(&self) -> usize {
        self.max_queued - self.admission.available_permits()
    }

    /// Waits until every admitted job has finished or `timeout` elapses.
    pub(crate) async fn drain(&self, timeout: Duration) -> bool {
        let Ok(total) = u32::try_from(self.max_queued) else {
            return false;
        };
        match tokio::time::timeout(timeout, self.admission.acquire_many(total)).await {
            Ok(Ok(_all)) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                tracing::warn!(in_flight = self.in_flight(), "Background jobs still running at shutdown");
                false
            }
        }
    }
}

impl JobSlot {
    pub(crate) fn spawn<F>(self, name: &'static str, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let JobSlot { admitted, execution } = self;
        let span = tracing::info_span!("background_job", job = name);

        tokio::spawn(
            async move {
                let _admitted = admitted;
                let Ok(_running) = execution.acquire_owned().await else {
                    tracing::error!("Job executor closed before the job could start");
                    return;
                };
                job.await;
            }
            .instrument(span),
        );
    }
}
