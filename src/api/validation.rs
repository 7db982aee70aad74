use async_trait::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::api::errors::ApiError;

/// JSON body that is deserialized and validated before the handler runs.
/// Both malformed bodies and failed validation are reported as 400.
pub(crate) struct ValidJson<T>(pub(crate) T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(payload) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(Self(payload))
    }
}

/// Parses a numeric path id, reporting garbage as a bad request.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    raw.trim().parse::<i64>().map_err(|_| ApiError::BadRequest(format!("{what} must be a number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_rejects_non_numeric() {
        assert_eq!(parse_id("42", "submissionId").unwrap(), 42);
        assert!(matches!(parse_id("abc", "submissionId"), Err(ApiError::BadRequest(_))));
    }
}
