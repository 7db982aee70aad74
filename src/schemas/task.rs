use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_offset;
use crate::db::models::Task;
use crate::db::types::TaskKind;
use crate::services::status_cache::TaskStatus;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateSkipsRequest {
    #[validate(length(min = 1, message = "sourceCode must not be empty"))]
    pub(crate) source_code: String,
    #[validate(range(min = 1, message = "skipsNumber must be positive"))]
    pub(crate) skips_number: u32,
    #[validate(length(min = 1, message = "programmingLanguage must not be empty"))]
    pub(crate) programming_language: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateNoisesRequest {
    #[validate(length(min = 1, message = "sourceCode must not be empty"))]
    pub(crate) source_code: String,
    #[validate(range(max = 10, message = "noiseLevel must be in range 0..10"))]
    pub(crate) noise_level: u8,
    #[validate(length(min = 1, message = "programmingLanguage must not be empty"))]
    pub(crate) programming_language: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationAccepted {
    pub(crate) status: &'static str,
    pub(crate) task_alias: String,
}

impl GenerationAccepted {
    pub(crate) fn new(task_alias: String) -> Self {
        Self { status: "OK", task_alias }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegenerateRequest {
    #[serde(default)]
    #[validate(range(min = 1, message = "skipsNumber must be positive"))]
    pub(crate) skips_number: Option<u32>,
    #[serde(default)]
    #[validate(range(max = 10, message = "noiseLevel must be in range 0..10"))]
    pub(crate) noise_level: Option<u8>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SetPublicRequest {
    pub(crate) public: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TaskKindFilter {
    Skips,
    Noises,
    #[default]
    Any,
}

impl TaskKindFilter {
    pub(crate) fn kind(self) -> Option<TaskKind> {
        match self {
            TaskKindFilter::Skips => Some(TaskKind::Skips),
            TaskKindFilter::Noises => Some(TaskKind::Noises),
            TaskKindFilter::Any => None,
        }
    }
}

/// Task as shown to clients. Canonical answers and the original source stay private.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskResponse {
    pub(crate) alias: String,
    #[serde(rename = "type")]
    pub(crate) kind: TaskKind,
    pub(crate) task_code: String,
    pub(crate) description: Option<String>,
    pub(crate) programming_language: String,
    pub(crate) public: bool,
    pub(crate) created_at: String,
}

impl TaskResponse {
    pub(crate) fn from_db(task: Task) -> Self {
        Self {
            alias: task.alias,
            kind: task.kind,
            task_code: task.task_code,
            description: task.description,
            programming_language: task.language,
            public: task.public,
            created_at: format_offset(task.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TaskStatusResponse {
    pub(crate) status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl From<TaskStatus> for TaskStatusResponse {
    fn from(status: TaskStatus) -> Self {
        let label = status.label();
        match status {
            TaskStatus::Processing => Self { status: label, result: None, error: None },
            TaskStatus::Done { result } => Self { status: label, result: Some(result), error: None },
            TaskStatus::Error { error } => Self { status: label, result: None, error: Some(error) },
        }
    }
}
