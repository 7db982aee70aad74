use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::ValidJson;
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::schemas::auth::{LoginRequest, RegisterRequest, TokenResponse, UserResponse};
use crate::services::errors::StoreError;

/// Max attempts per window for auth endpoints (login/register).
const AUTH_RATE_LIMIT: u64 = 10;
/// Rate limit window in seconds.
const AUTH_RATE_WINDOW_SECONDS: u64 = 60;

const REFRESH_COOKIE: &str = "refresh_token";
const INVALID_REFRESH: &str = "Invalid or expired refresh token";

/// Access token body plus the `Set-Cookie` carrying the refresh token.
type SessionResponse = ([(HeaderName, HeaderValue); 1], Json<TokenResponse>);

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, SessionResponse), ApiError> {
    let email = normalize_email(&payload.email);
    check_rate_limit(&state, "register", &email).await?;

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let user = match state.records().create_user(&email, hashed_password).await {
        Ok(user) => user,
        Err(StoreError::Duplicate(_)) => {
            return Err(ApiError::Conflict("User with this email already exists".to_string()));
        }
        Err(err) => return Err(ApiError::internal(err, "Failed to create user")),
    };

    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, start_session(&state, &user.id).await?))
}

async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<SessionResponse, ApiError> {
    let email = normalize_email(&payload.email);
    check_rate_limit(&state, "login", &email).await?;

    let user = state
        .records()
        .find_user_by_email(&email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("Incorrect email or password"))?;

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized("Incorrect email or password"))?;

    if !verified {
        return Err(ApiError::Unauthorized("Incorrect email or password"));
    }

    start_session(&state, &user.id).await
}

/// Trades the refresh cookie for a new access token and rotates the cookie.
async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<SessionResponse, ApiError> {
    let token = read_refresh_cookie(&headers)
        .ok_or_else(|| ApiError::BadRequest("Missing refresh token cookie".to_string()))?;

    let claims = security::verify_refresh_token(token, state.settings())
        .map_err(|_| ApiError::Unauthorized(INVALID_REFRESH))?;

    let owner = state
        .records()
        .consume_refresh_token(&claims.jti)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load refresh token"))?
        .filter(|owner| *owner == claims.sub)
        .ok_or(ApiError::Unauthorized(INVALID_REFRESH))?;

    let session = start_session(&state, &owner).await?;
    tracing::info!(user_id = %owner, "Access token refreshed");
    Ok(session)
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, [(HeaderName, HeaderValue); 1]), ApiError> {
    let token = read_refresh_cookie(&headers)
        .ok_or_else(|| ApiError::BadRequest("Missing refresh token cookie".to_string()))?;

    if let Ok(claims) = security::verify_refresh_token(token, state.settings()) {
        state
            .records()
            .revoke_refresh_token(&claims.jti)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to revoke refresh token"))?;
        tracing::info!(user_id = %claims.sub, "User logged out");
    }

    let cleared = refresh_cookie(&state, "", 0)?;
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cleared)]))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from_db(user))
}

async fn start_session(state: &AppState, user_id: &str) -> Result<SessionResponse, ApiError> {
    let access = security::create_access_token(user_id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;
    let refresh = security::create_refresh_token(user_id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create refresh token"))?;

    state
        .records()
        .save_refresh_token(&refresh.id, user_id, refresh.expires_at)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to save refresh token"))?;

    let max_age = (refresh.expires_at - now_utc()).whole_seconds().max(0);
    let cookie = refresh_cookie(state, &refresh.token, max_age)?;
    Ok(([(header::SET_COOKIE, cookie)], Json(TokenResponse::bearer(access))))
}

fn refresh_cookie(state: &AppState, value: &str, max_age: i64) -> Result<HeaderValue, ApiError> {
    let path = format!("{}/auth", state.settings().api().api_v1_str);
    HeaderValue::from_str(&format!(
        "{REFRESH_COOKIE}={value}; Path={path}; Max-Age={max_age}; HttpOnly; Secure; SameSite=Strict"
    ))
    .map_err(|e| ApiError::internal(e, "Failed to build refresh cookie"))
}

fn read_refresh_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == REFRESH_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

async fn check_rate_limit(state: &AppState, action: &str, email: &str) -> Result<(), ApiError> {
    let rate_key = format!("rl:{action}:{email}");
    let allowed = state
        .redis()
        .rate_limit(&rate_key, AUTH_RATE_LIMIT, AUTH_RATE_WINDOW_SECONDS)
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many attempts, try again later"));
    }
    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
