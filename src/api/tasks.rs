use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{PageQuery, PaginatedResponse, TaskListQuery};
use crate::api::validation::ValidJson;
use crate::core::state::AppState;
use crate::schemas::task::{RegenerateRequest, SetPublicRequest, TaskResponse};
use crate::services::errors::ServiceError;
use crate::services::exercises::{self, RegenerationRequest};
use crate::services::record_store::Page;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_public_tasks))
        .route("/user/tasks", get(list_user_tasks))
        .route("/task/random", get(random_task))
        .route("/task/:alias", get(get_task))
        .route("/task/:alias/regenerate", patch(regenerate_task))
        .route("/task/:alias/set-public", patch(set_public))
}

async fn get_task(
    State(state): State<AppState>,
    Path(alias): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = exercises::find_task(&state, &alias).await?;
    Ok(Json(TaskResponse::from_db(task)))
}

async fn regenerate_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(alias): Path<String>,
    ValidJson(payload): ValidJson<RegenerateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = RegenerationRequest {
        skips_number: payload.skips_number,
        noise_level: payload.noise_level,
    };
    exercises::start_regeneration(&state, &user, &alias, request).await?;
    Ok(Json(serde_json::json!({ "status": "OK", "taskAlias": alias })))
}

async fn set_public(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(alias): Path<String>,
    ValidJson(payload): ValidJson<SetPublicRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = exercises::find_task(&state, &alias).await?;
    if task.user_id != user.id {
        return Err(ApiError::Forbidden("Only the task owner can change its visibility"));
    }

    let updated = state
        .records()
        .set_task_public(&alias, payload.public)
        .await
        .map_err(ServiceError::from)?;
    if !updated {
        return Err(ServiceError::NotFound("task").into());
    }

    tracing::info!(task_alias = %alias, public = payload.public, "Task visibility changed");
    let task = exercises::find_task(&state, &alias).await?;
    Ok(Json(TaskResponse::from_db(task)))
}

async fn list_public_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<PaginatedResponse<TaskResponse>>, ApiError> {
    query.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let page = state
        .records()
        .list_public_tasks(query.kind.kind(), query.offset, query.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list tasks"))?;

    Ok(Json(paginate(page, query.offset, query.limit)))
}

async fn list_user_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<TaskResponse>>, ApiError> {
    query.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let page = state
        .records()
        .list_user_tasks(&user.id, query.offset, query.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list user tasks"))?;

    Ok(Json(paginate(page, query.offset, query.limit)))
}

async fn random_task(State(state): State<AppState>) -> Result<Response, ApiError> {
    let alias = state
        .records()
        .random_public_alias()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to pick a random task"))?
        .ok_or_else(|| ApiError::NotFound("No public tasks yet".to_string()))?;

    let location = format!("{}/task/{alias}", state.settings().api().api_v1_str);
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

fn paginate(page: Page<crate::db::models::Task>, offset: i64, limit: i64) -> PaginatedResponse<TaskResponse> {
    PaginatedResponse {
        items: page.items.into_iter().map(TaskResponse::from_db).collect(),
        total_count: page.total,
        offset,
        limit,
    }
}
