use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Validation};
use rand::rngs::OsRng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::core::config::Settings;

const ARGON2_MEMORY_KIB: u32 = 19_456;
const ARGON2_TIME: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("password hashing failed")]
    Hashing,
    #[error("password verification failed")]
    Verification,
    #[error("jwt encoding failed")]
    JwtEncoding,
    #[error("jwt decoding failed")]
    JwtDecoding,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Access token claims; `sub` carries the user id.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) typ: Option<String>,
}

/// Refresh token claims. `jti` names the stored row that makes the token usable.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RefreshClaims {
    pub(crate) sub: String,
    pub(crate) jti: String,
    pub(crate) typ: String,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

#[derive(Debug)]
pub(crate) struct RefreshToken {
    pub(crate) token: String,
    pub(crate) id: String,
    pub(crate) expires_at: OffsetDateTime,
}

fn hasher() -> Result<Argon2<'static>, argon2::Error> {
    let params = argon2::Params::new(ARGON2_MEMORY_KIB, ARGON2_TIME, ARGON2_PARALLELISM, None)?;
    Ok(Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params))
}

pub(crate) fn hash_password(password: &str) -> Result<String, SecurityError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = hasher().map_err(|_| SecurityError::Hashing)?;

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| SecurityError::Hashing)
}

pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool, SecurityError> {
    let parsed = PasswordHash::new(hash).map_err(|_| SecurityError::Verification)?;
    let argon2 = hasher().map_err(|_| SecurityError::Verification)?;

    match argon2.verify_password(password.as_bytes(), &parsed) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(SecurityError::Verification),
    }
}

pub(crate) fn create_access_token(
    user_id: &str,
    settings: &Settings,
    expires_in: Option<Duration>,
) -> Result<String, SecurityError> {
    let now = OffsetDateTime::now_utc();
    let lifetime = expires_in
        .unwrap_or_else(|| Duration::minutes(settings.security().access_token_expire_minutes as i64));

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.unix_timestamp(),
        exp: (now + lifetime).unix_timestamp(),
        typ: None,
    };

    sign(&claims, settings)
}

/// Verifies an access token. Refresh tokens are rejected.
pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let claims: Claims = verify(token, settings)?;
    if claims.typ.is_some() {
        return Err(SecurityError::JwtDecoding);
    }
    Ok(claims)
}

pub(crate) fn create_refresh_token(
    user_id: &str,
    settings: &Settings,
    expires_in: Option<Duration>,
) -> Result<RefreshToken, SecurityError> {
    let now = OffsetDateTime::now_utc();
    let lifetime = expires_in
        .unwrap_or_else(|| Duration::days(settings.security().refresh_token_expire_days as i64));
    let expires_at = now + lifetime;

    let claims = RefreshClaims {
        sub: user_id.to_string(),
        jti: Uuid::new_v4().to_string(),
        typ: REFRESH_TOKEN_TYPE.to_string(),
        iat: now.unix_timestamp(),
        exp: expires_at.unix_timestamp(),
    };

    let token = sign(&claims, settings)?;
    Ok(RefreshToken { token, id: claims.jti, expires_at })
}

pub(crate) fn verify_refresh_token(
    token: &str,
    settings: &Settings,
) -> Result<RefreshClaims, SecurityError> {
    let claims: RefreshClaims = verify(token, settings)?;
    if claims.typ != REFRESH_TOKEN_TYPE {
        return Err(SecurityError::JwtDecoding);
    }
    Ok(claims)
}

fn sign<T: Serialize>(claims: &T, settings: &Settings) -> Result<String, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    encode(
        &jsonwebtoken::Header::new(algorithm),
        claims,
        &EncodingKey::from_secret(settings.security().secret_key.as_bytes()),
    )
    .map_err(|_| SecurityError::JwtEncoding)
}

fn verify<T: DeserializeOwned>(token: &str, settings: &Settings) -> Result<T, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = true;
    validation.required_spec_claims.insert("exp".to_string());
    validation.required_spec_claims.insert("sub".to_string());

    decode::<T>(
        token,
        &DecodingKey::from_secret(settings.security().secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| SecurityError::JwtDecoding)
}

fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}
