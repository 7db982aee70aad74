use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::time::now_utc;
use crate::db::models::{ProgrammingLanguage, Submission, Task, User};
use crate::db::types::{SubmissionStatus, TaskKind};
use crate::repositories;
use crate::services::errors::StoreError;

#[derive(Debug, Clone)]
pub(crate) struct NewTask {
    pub(crate) user_id: String,
    pub(crate) kind: TaskKind,
    pub(crate) task_code: String,
    pub(crate) original_code: String,
    pub(crate) answers: Vec<String>,
    pub(crate) language_id: i32,
    pub(crate) description: Option<String>,
}

/// Output of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GeneratedContent {
    pub(crate) task_code: String,
    pub(crate) answers: Vec<String>,
    pub(crate) description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubmissionOutcome {
    pub(crate) status: SubmissionStatus,
    pub(crate) score: Option<i32>,
    pub(crate) hints: Vec<String>,
}

impl SubmissionOutcome {
    pub(crate) fn failed() -> Self {
        Self { status: SubmissionStatus::Failed, score: None, hints: Vec::new() }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Page<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total: i64,
}

/// Durable storage for tasks, aliases, submissions and the users that own them.
#[async_trait]
pub(crate) trait RecordStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn alias_exists(&self, alias: &str) -> Result<bool, StoreError>;

    async fn find_language(&self, name: &str) -> Result<Option<ProgrammingLanguage>, StoreError>;

    /// Inserts the task and its alias in one transaction.
    async fn save_task_with_alias(&self, task: NewTask, alias: &str) -> Result<i64, StoreError>;

    /// Replaces code, answers and description of an existing task in one statement.
    async fn replace_task_content(
        &self,
        alias: &str,
        content: &GeneratedContent,
    ) -> Result<bool, StoreError>;

    async fn find_task(&self, alias: &str) -> Result<Option<Task>, StoreError>;

    async fn set_task_public(&self, alias: &str, public: bool) -> Result<bool, StoreError>;

    async fn list_public_tasks(
        &self,
        kind: Option<TaskKind>,
        offset: i64,
        limit: i64,
    ) -> Result<Page<Task>, StoreError>;

    async fn list_user_tasks(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Page<Task>, StoreError>;

    async fn random_public_alias(&self) -> Result<Option<String>, StoreError>;

    async fn create_pending_submission(
        &self,
        alias: &str,
        answers: &[String],
    ) -> Result<i64, StoreError>;

    async fn find_submission(&self, id: i64) -> Result<Option<Submission>, StoreError>;

    /// Writes the terminal state of a `Pending` submission. Returns `false` if
    /// the submission was already terminal.
    async fn complete_submission(
        &self,
        id: i64,
        outcome: &SubmissionOutcome,
    ) -> Result<bool, StoreError>;

    /// Minimal `Pending -> Failed` transition used when the full write failed.
    async fn force_fail_submission(&self, id: i64) -> Result<bool, StoreError>;

    async fn fail_stale_submissions(&self, submitted_before: OffsetDateTime)
        -> Result<u64, StoreError>;

    async fn create_user(&self, email: &str, hashed_password: String) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn save_refresh_token(
        &self,
        id: &str,
        user_id: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Removes an unexpired refresh token and returns its owner. Each token
    /// can be consumed once.
    async fn consume_refresh_token(&self, id: &str) -> Result<Option<String>, StoreError>;

    async fn revoke_refresh_token(&self, id: &str) -> Result<bool, StoreError>;

    async fn purge_expired_refresh_tokens(&self) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub(crate) struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn ping(&self) -> Result<(), StoreError> {
        repositories::health::ping(&self.pool).await?;
        Ok(())
    }

    async fn alias_exists(&self, alias: &str) -> Result<bool, StoreError> {
        Ok(repositories::aliases::exists(&self.pool, alias).await?)
    }

    async fn find_language(&self, name: &str) -> Result<Option<ProgrammingLanguage>, StoreError> {
        Ok(repositories::languages::find_by_name(&self.pool, name).await?)
    }

    async fn save_task_with_alias(&self, task: NewTask, alias: &str) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let task_id = repositories::tasks::insert(
            &mut *tx,
            repositories::tasks::InsertTask {
                user_id: &task.user_id,
                kind: task.kind,
                task_code: &task.task_code,
                original_code: &task.original_code,
                answers: &task.answers,
                language_id: task.language_id,
                description: task.description.as_deref(),
                created_at: now_utc(),
            },
        )
        .await?;

        repositories::aliases::insert(&mut *tx, alias, task_id)
            .await
            .map_err(|err| StoreError::from_insert(err, "alias"))?;

        tx.commit().await?;
        Ok(task_id)
    }

    async fn replace_task_content(
        &self,
        alias: &str,
        content: &GeneratedContent,
    ) -> Result<bool, StoreError> {
        Ok(repositories::tasks::replace_content(
            &self.pool,
            alias,
            &content.task_code,
            &content.answers,
            content.description.as_deref(),
        )
        .await?)
    }

    async fn find_task(&self, alias: &str) -> Result<Option<Task>, StoreError> {
        Ok(repositories::tasks::find_by_alias(&self.pool, alias).await?)
    }

    async fn set_task_public(&self, alias: &str, public: bool) -> Result<bool, StoreError> {
        Ok(repositories::tasks::set_public(&self.pool, alias, public).await?)
    }

    async fn list_public_tasks(
        &self,
        kind: Option<TaskKind>,
        offset: i64,
        limit: i64,
    ) -> Result<Page<Task>, StoreError> {
        let items = repositories::tasks::list_public(&self.pool, kind, offset, limit).await?;
        let total = repositories::tasks::count_public(&self.pool, kind).await?;
        Ok(Page { items, total })
    }

    async fn list_user_tasks(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Page<Task>, StoreError> {
        let items = repositories::tasks::list_by_user(&self.pool, user_id, offset, limit).await?;
        let total = repositories::tasks::count_by_user(&self.pool, user_id).await?;
        Ok(Page { items, total })
    }

    async fn random_public_alias(&self) -> Result<Option<String>, StoreError> {
        Ok(repositories::aliases::random_public(&self.pool).await?)
    }

    async fn create_pending_submission(
        &self,
        alias: &str,
        answers: &[String],
    ) -> Result<i64, StoreError> {
        Ok(repositories::submissions::insert_pending(&self.pool, alias, answers, now_utc()).await?)
    }

    async fn find_submission(&self, id: i64) -> Result<Option<Submission>, StoreError> {
        Ok(repositories::submissions::find_by_id(&self.pool, id).await?)
    }

    async fn complete_submission(
        &self,
        id: i64,
        outcome: &SubmissionOutcome,
    ) -> Result<bool, StoreError> {
        Ok(repositories::submissions::complete(
            &self.pool,
            id,
            outcome.status,
            outcome.score,
            &outcome.hints,
            now_utc(),
        )
        .await?)
    }

    async fn force_fail_submission(&self, id: i64) -> Result<bool, StoreError> {
        Ok(repositories::submissions::force_fail(&self.pool, id).await?)
    }

    async fn fail_stale_submissions(
        &self,
        submitted_before: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        Ok(repositories::submissions::fail_stale(&self.pool, submitted_before, now_utc()).await?)
    }

    async fn create_user(&self, email: &str, hashed_password: String) -> Result<User, StoreError> {
        repositories::users::create(
            &self.pool,
            repositories::users::CreateUser {
                id: &Uuid::new_v4().to_string(),
                email,
                hashed_password,
                created_at: now_utc(),
            },
        )
        .await
        .map_err(|err| StoreError::from_insert(err, "email"))
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(repositories::users::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(repositories::users::find_by_email(&self.pool, email).await?)
    }

    async fn save_refresh_token(
        &self,
        id: &str,
        user_id: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        Ok(repositories::refresh_tokens::insert(&self.pool, id, user_id, expires_at, now_utc())
            .await?)
    }

    async fn consume_refresh_token(&self, id: &str) -> Result<Option<String>, StoreError> {
        Ok(repositories::refresh_tokens::consume(&self.pool, id, now_utc()).await?)
    }

    async fn revoke_refresh_token(&self, id: &str) -> Result<bool, StoreError> {
        Ok(repositories::refresh_tokens::delete(&self.pool, id).await?)
    }

    async fn purge_expired_refresh_tokens(&self) -> Result<u64, StoreError> {
        Ok(repositories::refresh_tokens::delete_expired(&self.pool, now_utc()).await?)
    }
}
