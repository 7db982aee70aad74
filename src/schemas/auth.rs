use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_offset;
use crate::db::models::User;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RegisterRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters long"))]
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LoginRequest {
    #[validate(length(min = 1, message = "email must not be empty"))]
    pub(crate) email: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: String,
}

impl TokenResponse {
    pub(crate) fn bearer(access_token: String) -> Self {
        Self { access_token, token_type: "bearer".to_string() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self { id: user.id, email: user.email, created_at: format_offset(user.created_at) }
    }
}
