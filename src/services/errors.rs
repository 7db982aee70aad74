use thiserror::Error;

/// Failures of the durable record store.
#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the ephemeral status cache.
#[derive(Debug, Error)]
pub(crate) enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("malformed status payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("status cache unavailable: {0}")]
    Unavailable(String),
}

/// Failures talking to the content-generation service or reading what it sent back.
#[derive(Debug, Error)]
pub(crate) enum UpstreamError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("content service answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("content service returned an empty answer")]
    EmptyAnswer,
    #[error("unreadable content service response: {0}")]
    UnreadableBody(String),
    #[error("malformed generated content: {0}")]
    MalformedContent(String),
}

#[derive(Debug, Error)]
pub(crate) enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("alias allocation exhausted after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },
    #[error("job queue is full")]
    Busy,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Persistence(#[from] StoreError),
    #[error(transparent)]
    StatusCache(#[from] CacheError),
}

impl StoreError {
    /// Maps a unique-constraint violation to `Duplicate`, keeping other errors intact.
    pub(crate) fn from_insert(err: sqlx::Error, what: &'static str) -> Self {
        let unique_violation = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "23505");
        if unique_violation {
            StoreError::Duplicate(what)
        } else {
            StoreError::Database(err)
        }
    }
}
