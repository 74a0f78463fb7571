// src/handlers/attempt.rs

use axum::{Json, extract::State};

use crate::{
    error::AppError,
    models::{MessageResponse, attempt::AttemptSummary},
    services::delivery,
    store::SharedStore,
    utils::jwt::AuthUser,
};

/// Attempt history of the caller, most recent first.
#[utoipa::path(
    get,
    path = "/api/attempts/my-attempts",
    responses(
        (status = OK, body = Vec<AttemptSummary>),
        (status = UNAUTHORIZED, body = MessageResponse),
    ),
    tag = "attempts",
    security(("token" = []))
)]
pub async fn my_attempts(
    State(store): State<SharedStore>,
    user: AuthUser,
) -> Result<Json<Vec<AttemptSummary>>, AppError> {
    Ok(Json(
        delivery::list_my_attempts(store.as_ref(), user.id).await?,
    ))
}
