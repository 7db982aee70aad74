use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::redis::RedisHandle;
use crate::services::errors::CacheError;

const KEY_PREFIX: &str = "task_status:";

/// Progress of a generation job as seen by a polling client.
///
/// Serialized as `{"status": "...", "result"?: "...", "error"?: "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub(crate) enum TaskStatus {
    Processing,
    Done { result: String },
    Error { error: String },
}

impl TaskStatus {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            TaskStatus::Processing => "Processing",
            TaskStatus::Done { .. } => "Done",
            TaskStatus::Error { .. } => "Error",
        }
    }
}

/// Ephemeral alias -> status store. Last write wins, entries expire.
#[async_trait]
pub(crate) trait StatusCache: Send + Sync {
    async fn set(&self, alias: &str, status: &TaskStatus) -> Result<(), CacheError>;

    async fn get(&self, alias: &str) -> Result<Option<TaskStatus>, CacheError>;

    /// Writes `status` only if no entry exists for `alias`.
    async fn set_if_absent(&self, alias: &str, status: &TaskStatus) -> Result<bool, CacheError>;
}

#[derive(Clone)]
pub(crate) struct RedisStatusCache {
    redis: RedisHandle,
    ttl_seconds: u64,
}

impl RedisStatusCache {
    pub(crate) fn new(redis: RedisHandle, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }
}

fn status_key(alias: &str) -> String {
    format!("{KEY_PREFIX}{alias}")
}

#[async_trait]
impl StatusCache for RedisStatusCache {
    async fn set(&self, alias: &str, status: &TaskStatus) -> Result<(), CacheError> {
        let payload = serde_json::to_string(status)?;
        self.redis.set_with_ttl(&status_key(alias), &payload, self.ttl_seconds).await?;
        Ok(())
    }

    async fn get(&self, alias: &str) -> Result<Option<TaskStatus>, CacheError> {
        let Some(payload) = self.redis.get(&status_key(alias)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&payload)?))
    }

    async fn set_if_absent(&self, alias: &str, status: &TaskStatus) -> Result<bool, CacheError> {
        let payload = serde_json::to_string(status)?;
        Ok(self.redis.set_if_absent(&status_key(alias), &payload, self.ttl_seconds).await?)
    }
}
