use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::validation::parse_id;
use crate::core::state::AppState;
use crate::schemas::submission::SubmissionStatusResponse;
use crate::schemas::task::TaskStatusResponse;
use crate::services::exercises;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/task-status/:alias", get(task_status))
        .route("/submission-status/:submission_id", get(submission_status))
}

async fn task_status(
    State(state): State<AppState>,
    Path(alias): Path<String>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let status = exercises::task_status(&state, &alias).await?;
    Ok(Json(status.into()))
}

async fn submission_status(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> Result<Json<SubmissionStatusResponse>, ApiError> {
    let id = parse_id(&submission_id, "submissionId")?;
    let submission = exercises::submission(&state, id).await?;
    Ok(Json(SubmissionStatusResponse::from_db(submission)))
}
