// src/handlers/quiz.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    models::{
        MessageResponse,
        attempt::{StartAttemptResponse, SubmitRequest, SubmitResponse},
        quiz::{PublishedQuiz, QuizCreatedResponse, QuizDetail, QuizForTaking, QuizRequest, QuizSummary},
    },
    services::{authoring, delivery},
    store::SharedStore,
    utils::{
        extract::{AppJson, AppPath},
        jwt::AuthUser,
    },
};

/// Creates a quiz with its questions. Status defaults to draft.
#[utoipa::path(
    post,
    path = "/api/quizzes",
    request_body = QuizRequest,
    responses(
        (status = CREATED, body = QuizCreatedResponse, description = "Quiz created"),
        (status = BAD_REQUEST, body = MessageResponse, description = "Validation failed"),
        (status = UNAUTHORIZED, body = MessageResponse),
    ),
    tag = "quizzes",
    security(("token" = []))
)]
pub async fn create_quiz(
    State(store): State<SharedStore>,
    user: AuthUser,
    AppJson(req): AppJson<QuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = authoring::create_quiz(store.as_ref(), user.id, req).await?;

    Ok((
        StatusCode::CREATED,
        Json(QuizCreatedResponse {
            message: "Quiz created successfully".to_string(),
            quiz,
        }),
    ))
}

/// Lists the caller's quizzes (drafts included), newest first.
#[utoipa::path(
    get,
    path = "/api/quizzes/my-quizzes",
    responses(
        (status = OK, body = Vec<QuizSummary>),
        (status = UNAUTHORIZED, body = MessageResponse),
    ),
    tag = "quizzes",
    security(("token" = []))
)]
pub async fn my_quizzes(
    State(store): State<SharedStore>,
    user: AuthUser,
) -> Result<Json<Vec<QuizSummary>>, AppError> {
    Ok(Json(authoring::list_mine(store.as_ref(), user.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/quizzes/published",
    responses((status = OK, body = Vec<PublishedQuiz>)),
    tag = "quizzes"
)]
pub async fn published_quizzes(
    State(store): State<SharedStore>,
) -> Result<Json<Vec<PublishedQuiz>>, AppError> {
    Ok(Json(authoring::list_published(store.as_ref()).await?))
}

/// Taker view: questions without their correct option.
#[utoipa::path(
    get,
    path = "/api/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = OK, body = QuizForTaking),
        (status = NOT_FOUND, body = MessageResponse),
    ),
    tag = "quizzes"
)]
pub async fn get_quiz(
    State(store): State<SharedStore>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<QuizForTaking>, AppError> {
    let detail = delivery::get_for_taking(store.as_ref(), id).await?;
    Ok(Json(QuizForTaking::from(detail)))
}

/// Author view including correct options.
#[utoipa::path(
    get,
    path = "/api/quizzes/{id}/full",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = OK, body = QuizDetail),
        (status = FORBIDDEN, body = MessageResponse, description = "Caller is not the author"),
        (status = NOT_FOUND, body = MessageResponse),
    ),
    tag = "quizzes",
    security(("token" = []))
)]
pub async fn get_quiz_full(
    State(store): State<SharedStore>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<QuizDetail>, AppError> {
    Ok(Json(
        authoring::get_for_editing(store.as_ref(), user.id, id).await?,
    ))
}

/// Replaces the quiz fields and its complete question set.
#[utoipa::path(
    put,
    path = "/api/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz id")),
    request_body = QuizRequest,
    responses(
        (status = OK, body = MessageResponse, description = "Quiz updated"),
        (status = BAD_REQUEST, body = MessageResponse),
        (status = FORBIDDEN, body = MessageResponse),
        (status = NOT_FOUND, body = MessageResponse),
    ),
    tag = "quizzes",
    security(("token" = []))
)]
pub async fn update_quiz(
    State(store): State<SharedStore>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<QuizRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    authoring::update_quiz(store.as_ref(), user.id, id, req).await?;
    Ok(Json(MessageResponse::new("Quiz updated successfully")))
}

/// Deletes the quiz, its questions and every attempt made on it.
#[utoipa::path(
    delete,
    path = "/api/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = OK, body = MessageResponse, description = "Quiz deleted"),
        (status = FORBIDDEN, body = MessageResponse),
        (status = NOT_FOUND, body = MessageResponse),
    ),
    tag = "quizzes",
    security(("token" = []))
)]
pub async fn delete_quiz(
    State(store): State<SharedStore>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    authoring::delete_quiz(store.as_ref(), user.id, id).await?;
    Ok(Json(MessageResponse::new("Quiz deleted successfully")))
}

/// Starts a timed attempt.
///
/// The returned `attempt_token` expires with the quiz time limit (plus a grace period)
/// and makes the submit endpoint enforce that deadline.
#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/start",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = OK, body = StartAttemptResponse),
        (status = NOT_FOUND, body = MessageResponse),
    ),
    tag = "quizzes",
    security(("token" = []))
)]
pub async fn start_quiz(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<StartAttemptResponse>, AppError> {
    Ok(Json(
        delivery::start_attempt(store.as_ref(), &config, user.id, id).await?,
    ))
}

/// Scores the answers against the current questions and records an attempt.
#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/submit",
    params(("id" = Uuid, Path, description = "Quiz id")),
    request_body = SubmitRequest,
    responses(
        (status = OK, body = SubmitResponse),
        (status = BAD_REQUEST, body = MessageResponse, description = "Time limit exceeded or invalid attempt token"),
        (status = NOT_FOUND, body = MessageResponse),
    ),
    tag = "quizzes",
    security(("token" = []))
)]
pub async fn submit_quiz(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<SubmitRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    Ok(Json(
        delivery::submit(store.as_ref(), &config, user.id, id, req).await?,
    ))
}
