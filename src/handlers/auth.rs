// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        MessageResponse,
        user::{AuthResponse, CredentialsRequest, UserInfo},
    },
    store::SharedStore,
    utils::{
        extract::AppJson,
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created with the public user and an identity token.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = CredentialsRequest,
    responses(
        (status = CREATED, body = AuthResponse, description = "User registered"),
        (status = BAD_REQUEST, body = MessageResponse, description = "Invalid input or email already registered"),
    ),
    tag = "auth"
)]
pub async fn register(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    AppJson(mut payload): AppJson<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.email = payload.email.trim().to_string();
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;
    let user = store.insert_user(&payload.email, &hashed_password).await?;

    let token = sign_jwt(user.id, &user.email, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!("User {} registered", user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            user: UserInfo::from(&user),
            token,
        }),
    ))
}

/// Authenticates a user and returns an identity token.
///
/// Unknown email and wrong password are indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = OK, body = AuthResponse, description = "Login successful"),
        (status = BAD_REQUEST, body = MessageResponse, description = "Email or password missing"),
        (status = UNAUTHORIZED, body = MessageResponse, description = "Invalid credentials"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    AppJson(payload): AppJson<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let user = store
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid credentials".to_string()))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::AuthError("Invalid credentials".to_string()));
    }

    let token = sign_jwt(user.id, &user.email, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        user: UserInfo::from(&user),
        token,
    }))
}
