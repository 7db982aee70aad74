use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::alias::AliasAllocator;
use crate::services::content_generation::ContentGenerator;
use crate::services::record_store::RecordStore;
use crate::services::status_cache::StatusCache;
use crate::tasks::evaluation::SubmissionWorker;
use crate::tasks::generation::GenerationWorker;
use crate::tasks::runner::JobRunner;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    redis: RedisHandle,
    records: Arc<dyn RecordStore>,
    statuses: Arc<dyn StatusCache>,
    generator: Arc<dyn ContentGenerator>,
    jobs: JobRunner,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        redis: RedisHandle,
        records: Arc<dyn RecordStore>,
        statuses: Arc<dyn StatusCache>,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        let jobs = JobRunner::new(settings.jobs());
        Self { inner: Arc::new(InnerState { settings, redis, records, statuses, generator, jobs }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn records(&self) -> &Arc<dyn RecordStore> {
        &self.inner.records
    }

    pub(crate) fn statuses(&self) -> &Arc<dyn StatusCache> {
        &self.inner.statuses
    }

    pub(crate) fn jobs(&self) -> &JobRunner {
        &self.inner.jobs
    }

    pub(crate) fn aliases(&self) -> AliasAllocator {
        AliasAllocator::new(
            self.inner.records.clone(),
            self.inner.statuses.clone(),
            self.inner.settings.generation().alias_max_attempts,
        )
    }

    pub(crate) fn generation_worker(&self) -> GenerationWorker {
        GenerationWorker::new(
            self.inner.records.clone(),
            self.inner.statuses.clone(),
            self.inner.generator.clone(),
        )
    }

    pub(crate) fn submission_worker(&self) -> SubmissionWorker {
        SubmissionWorker::new(self.inner.records.clone(), self.inner.generator.clone())
    }
}
