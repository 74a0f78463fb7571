// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Represents the 'attempts' table in the database.
/// Append-only: an attempt is never updated once written.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Attempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    pub score: i32,
    pub submitted_at: DateTime<Utc>,
}

/// Aggregated struct for the "my attempts" history.
/// `total_questions` counts the quiz's current questions.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct AttemptSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub attempt: Attempt,
    pub quiz_title: String,
    pub total_questions: i64,
}

/// One selected option. `selected_option` is 1-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct AnswerInput {
    pub question_id: Uuid,
    pub selected_option: i32,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SubmitRequest {
    /// At most one answer per question is meaningful; a repeated question id keeps the last one.
    pub answers: Vec<AnswerInput>,

    /// Token received from the start endpoint. Enforces the time limit when present.
    pub attempt_token: Option<String>,
}

/// Result of scoring a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Score {
    pub score: i32,
    /// Number of questions in the quiz at scoring time.
    pub total: i32,
}

/// DTO returned by the submit endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmitResponse {
    pub message: String,
    pub attempt_id: Uuid,
    #[serde(flatten)]
    pub score: Score,
}

/// DTO returned by the start endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StartAttemptResponse {
    pub attempt_token: String,
    pub expires_at: DateTime<Utc>,
    pub quiz: crate::models::quiz::QuizForTaking,
}
