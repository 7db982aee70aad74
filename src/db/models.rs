use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::types::{SubmissionStatus, TaskKind};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ProgrammingLanguage {
    pub(crate) id: i32,
    pub(crate) name: String,
}

/// A task joined with its alias and language name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Task {
    pub(crate) id: i64,
    pub(crate) alias: String,
    pub(crate) user_id: String,
    #[sqlx(rename = "type")]
    pub(crate) kind: TaskKind,
    pub(crate) task_code: String,
    pub(crate) original_code: String,
    pub(crate) answers: Vec<String>,
    pub(crate) language: String,
    pub(crate) description: Option<String>,
    pub(crate) public: bool,
    pub(crate) created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: i64,
    pub(crate) task_alias: String,
    pub(crate) submission_code: Vec<String>,
    pub(crate) status: SubmissionStatus,
    pub(crate) score: Option<i32>,
    pub(crate) hints: Vec<String>,
    pub(crate) submitted_at: OffsetDateTime,
    pub(crate) completed_at: Option<OffsetDateTime>,
}
