// src/utils/jwt.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::Config, error::AppError};

/// JWT Claims structure of an identity token.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    pub email: String,
    /// Expiration time as Unix timestamp.
    pub exp: i64,
}

/// Signs a new identity token for the user.
pub fn sign_jwt(
    user_id: Uuid,
    email: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let lifetime = i64::try_from(expiration_seconds)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_owned(),
        exp: Utc::now().timestamp() + lifetime,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes an identity token.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Verified caller identity.
///
/// Extracting it resolves `Authorization: Bearer <token>`; a missing, malformed or
/// expired token rejects the request with 401 before the handler body runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
}

impl<S> FromRequestParts<S> for AuthUser
where
    Config: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::AuthError("No token, authorization denied".to_string()))?;

        let config = Config::from_ref(state);
        let claims = verify_jwt(token.trim(), &config.jwt_secret)?;
        let id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

        Ok(Self { id })
    }
}

/// Claims of an attempt token: binds one user to one quiz until the time limit runs out.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AttemptClaims {
    pub sub: String,
    pub quiz_id: Uuid,
    /// Start of the attempt as Unix timestamp.
    pub iat: i64,
    /// Deadline including the grace period.
    pub exp: i64,
}

/// Signs an attempt token valid for `time_limit_minutes` plus `grace_seconds` from `started_at`.
/// Returns the token with its deadline.
pub fn sign_attempt_token(
    user_id: Uuid,
    quiz_id: Uuid,
    started_at: DateTime<Utc>,
    time_limit_minutes: i32,
    grace_seconds: i64,
    secret: &str,
) -> Result<(String, DateTime<Utc>), AppError> {
    let expires_at = started_at
        + Duration::minutes(i64::from(time_limit_minutes))
        + Duration::seconds(grace_seconds);

    let claims = AttemptClaims {
        sub: user_id.to_string(),
        quiz_id,
        iat: started_at.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok((token, expires_at))
}

/// Checks that an attempt token belongs to `user_id` and `quiz_id` and is still running.
/// The deadline is exact: the grace period is already part of `exp`.
pub fn verify_attempt_token(
    token: &str,
    user_id: Uuid,
    quiz_id: Uuid,
    secret: &str,
) -> Result<AttemptClaims, AppError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let claims = decode::<AttemptClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::BadRequest("Time limit exceeded".to_string()),
        _ => AppError::BadRequest("Invalid attempt token".to_string()),
    })?
    .claims;

    if claims.quiz_id != quiz_id || claims.sub != user_id.to_string() {
        return Err(AppError::BadRequest("Invalid attempt token".to_string()));
    }

    Ok(claims)
}
