use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::Submission;
use crate::db::types::SubmissionStatus;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SolveSkipsRequest {
    #[validate(length(min = 1, message = "taskAlias must not be empty"))]
    pub(crate) task_alias: String,
    pub(crate) answers: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SolveNoisesRequest {
    #[validate(length(min = 1, message = "taskAlias must not be empty"))]
    pub(crate) task_alias: String,
    pub(crate) answer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionAccepted {
    pub(crate) status: &'static str,
    pub(crate) submission_id: i64,
}

impl SubmissionAccepted {
    pub(crate) fn new(submission_id: i64) -> Self {
        Self { status: "OK", submission_id }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionStatusResponse {
    pub(crate) status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) score: Option<i32>,
    pub(crate) hints: Vec<String>,
}

impl SubmissionStatusResponse {
    pub(crate) fn from_db(submission: Submission) -> Self {
        Self { status: submission.status, score: submission.score, hints: submission.hints }
    }
}
