use axum::{extract::State, routing::post, Json, Router};

use crate::api::errors::ApiError;
use crate::api::validation::ValidJson;
use crate::core::state::AppState;
use crate::schemas::submission::{SolveNoisesRequest, SolveSkipsRequest, SubmissionAccepted};
use crate::services::exercises::{self, SolutionAnswer};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/skips/solve", post(solve_skips))
        .route("/noises/solve", post(solve_noises))
}

async fn solve_skips(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<SolveSkipsRequest>,
) -> Result<Json<SubmissionAccepted>, ApiError> {
    let id = exercises::submit_solution(
        &state,
        &payload.task_alias,
        SolutionAnswer::Skips(payload.answers),
    )
    .await?;
    Ok(Json(SubmissionAccepted::new(id)))
}

async fn solve_noises(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<SolveNoisesRequest>,
) -> Result<Json<SubmissionAccepted>, ApiError> {
    let id = exercises::submit_solution(
        &state,
        &payload.task_alias,
        SolutionAnswer::Noises(payload.answer),
    )
    .await?;
    Ok(Json(SubmissionAccepted::new(id)))
}
