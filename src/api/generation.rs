use axum::{extract::State, routing::post, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::ValidJson;
use crate::core::state::AppState;
use crate::schemas::task::{GenerateNoisesRequest, GenerateSkipsRequest, GenerationAccepted};
use crate::services::exercises::{self, GenerationRequest};
use crate::tasks::generation::GenerationParams;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/skips/generate", post(generate_skips))
        .route("/noises/generate", post(generate_noises))
}

async fn generate_skips(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<GenerateSkipsRequest>,
) -> Result<Json<GenerationAccepted>, ApiError> {
    let request = GenerationRequest {
        source_code: payload.source_code,
        language: payload.programming_language,
        params: GenerationParams::Skips { count: payload.skips_number },
    };
    let alias = exercises::start_generation(&state, &user, request).await?;
    Ok(Json(GenerationAccepted::new(alias)))
}

async fn generate_noises(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<GenerateNoisesRequest>,
) -> Result<Json<GenerationAccepted>, ApiError> {
    let request = GenerationRequest {
        source_code: payload.source_code,
        language: payload.programming_language,
        params: GenerationParams::Noises { level: payload.noise_level },
    };
    let alias = exercises::start_generation(&state, &user, request).await?;
    Ok(Json(GenerationAccepted::new(alias)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::services::errors::UpstreamError;
    use crate::services::status_cache::TaskStatus;
    use crate::test_support::{self, bearer_token, json_request, read_json, wait_until};

    #[tokio::test]
    async fn skips_generation_is_polled_to_done() {
        let ctx = test_support::setup_test_context().await;
        let user = ctx.records.seed_user("author@example.com");
        let token = bearer_token(&user.id, ctx.state.settings());
        ctx.generator.push_ok(r#"{"skipsCode": "a___b", "answers": ["+"], "description": "sum"}"#);

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/skips/generate",
                Some(&token),
                Some(json!({"sourceCode": "a+b", "skipsNumber": 1, "programmingLanguage": "python"})),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "OK");
        let alias = body["taskAlias"].as_str().expect("alias").to_string();

        wait_until(|| matches!(ctx.statuses.peek(&alias), Some(TaskStatus::Done { .. }))).await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, &format!("/api/v1/task-status/{alias}"), None, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body, json!({"status": "Done", "result": "a___b"}));
        assert_eq!(ctx.records.task(&alias).expect("task").answers, vec!["+".to_string()]);
    }

    #[tokio::test]
    async fn garbage_from_the_content_service_ends_in_error_status() {
        let ctx = test_support::setup_test_context().await;
        let user = ctx.records.seed_user("author@example.com");
        let token = bearer_token(&user.id, ctx.state.settings());
        ctx.generator.push_err(UpstreamError::EmptyAnswer);

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/noises/generate",
                Some(&token),
                Some(json!({"sourceCode": "x = 1", "noiseLevel": 3, "programmingLanguage": "go"})),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let alias = read_json(response).await["taskAlias"].as_str().unwrap().to_string();

        wait_until(|| matches!(ctx.statuses.peek(&alias), Some(TaskStatus::Error { .. }))).await;
        assert_eq!(ctx.records.task_count(), 0);
    }

    #[tokio::test]
    async fn generation_requires_authentication() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/skips/generate",
                None,
                Some(json!({"sourceCode": "a+b", "skipsNumber": 1, "programmingLanguage": "python"})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(ctx.statuses.is_empty());
    }

    #[tokio::test]
    async fn invalid_payloads_are_bad_requests() {
        let ctx = test_support::setup_test_context().await;
        let user = ctx.records.seed_user("author@example.com");
        let token = bearer_token(&user.id, ctx.state.settings());

        for (uri, body) in [
            (
                "/api/v1/skips/generate",
                json!({"sourceCode": "a+b", "skipsNumber": 1, "programmingLanguage": "cobol"}),
            ),
            (
                "/api/v1/skips/generate",
                json!({"sourceCode": "a+b", "skipsNumber": 0, "programmingLanguage": "python"}),
            ),
            (
                "/api/v1/noises/generate",
                json!({"sourceCode": "a+b", "noiseLevel": 11, "programmingLanguage": "python"}),
            ),
            ("/api/v1/noises/generate", json!({"sourceCode": "a+b"})),
        ] {
            let response = ctx
                .app
                .clone()
                .oneshot(json_request(Method::POST, uri, Some(&token), Some(body.clone())))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }
        assert!(ctx.statuses.is_empty());
    }
}
