use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::services::errors::ServiceError;
use crate::services::record_store::RecordStore;
use crate::services::status_cache::{StatusCache, TaskStatus};

/// Hands out short URL-safe aliases that are unused in the record store.
///
/// A candidate is accepted only after the status cache lets it claim the
/// initial `Processing` entry, so two concurrent requests cannot leave with
/// the same alias before either task is committed.
#[derive(Clone)]
pub(crate) struct AliasAllocator {
    records: Arc<dyn RecordStore>,
    statuses: Arc<dyn StatusCache>,
    max_attempts: u32,
}

impl AliasAllocator {
    pub(crate) fn new(
        records: Arc<dyn RecordStore>,
        statuses: Arc<dyn StatusCache>,
        max_attempts: u32,
    ) -> Self {
        Self { records, statuses, max_attempts }
    }

    /// Returns a fresh alias whose status is already `Processing`.
    pub(crate) async fn allocate(&self, length: usize) -> Result<String, ServiceError> {
        for attempt in 1..=self.max_attempts {
            let candidate = random_alias(length);

            if self.records.alias_exists(&candidate).await? {
                tracing::debug!(attempt, "Alias collided with a stored task");
                continue;
            }

            if self.statuses.set_if_absent(&candidate, &TaskStatus::Processing).await? {
                return Ok(candidate);
            }
            tracing::debug!(attempt, "Alias already reserved by a concurrent request");
        }

        tracing::error!(attempts = self.max_attempts, length, "Alias space exhausted");
        Err(ServiceError::AllocationExhausted { attempts: self.max_attempts })
    }
}

pub(crate) fn random_alias(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    let mut alias = URL_SAFE_NO_PAD.encode(&bytes);
    alias.truncate(length);
    alias
}
