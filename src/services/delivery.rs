// src/services/delivery.rs

//! Quiz Delivery & Scoring Engine.
//!
//! Scoring always reads the quiz's current answer key; there is no snapshot taken at
//! publish time. Reading the key and inserting the attempt are separate statements,
//! so an edit landing between them is scored against the new question set.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    models::{
        attempt::{AnswerInput, AttemptSummary, Score, StartAttemptResponse, SubmitRequest, SubmitResponse},
        question::AnswerKey,
        quiz::{QuizDetail, QuizForTaking},
    },
    store::QuizStore,
    utils::jwt::{sign_attempt_token, verify_attempt_token},
};

/// Counts questions whose correct option matches the submitted one.
///
/// The total is the number of questions in the key, not the number answered.
/// Unknown question ids are ignored; a repeated question id keeps its last answer.
pub fn score_answers(keys: &[AnswerKey], answers: &[AnswerInput]) -> Score {
    let selected: HashMap<Uuid, i32> = answers
        .iter()
        .map(|a| (a.question_id, a.selected_option))
        .collect();

    let score = keys
        .iter()
        .filter(|k| selected.get(&k.id) == Some(&k.correct_option))
        .count();

    Score {
        score: score as i32,
        total: keys.len() as i32,
    }
}

/// Quiz with its full question data. Callers serving takers must redact it.
pub async fn get_for_taking(store: &dyn QuizStore, quiz_id: Uuid) -> Result<QuizDetail, AppError> {
    store
        .get_quiz(quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

/// Opens a timed attempt: redacted quiz plus a token that expires with the time limit.
pub async fn start_attempt(
    store: &dyn QuizStore,
    config: &Config,
    user_id: Uuid,
    quiz_id: Uuid,
) -> Result<StartAttemptResponse, AppError> {
    let detail = get_for_taking(store, quiz_id).await?;

    let (attempt_token, expires_at) = sign_attempt_token(
        user_id,
        quiz_id,
        Utc::now(),
        detail.quiz.time_limit,
        config.submit_grace_seconds,
        &config.jwt_secret,
    )?;

    tracing::info!("User {} started quiz {}", user_id, quiz_id);

    Ok(StartAttemptResponse {
        attempt_token,
        expires_at,
        quiz: QuizForTaking::from(detail),
    })
}

/// Scores a submission and appends one attempt. Every call writes a new attempt.
pub async fn submit(
    store: &dyn QuizStore,
    config: &Config,
    user_id: Uuid,
    quiz_id: Uuid,
    req: SubmitRequest,
) -> Result<SubmitResponse, AppError> {
    if let Some(token) = req.attempt_token.as_deref() {
        verify_attempt_token(token, user_id, quiz_id, &config.jwt_secret)?;
    }

    let keys = store
        .answer_key(quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    let score = score_answers(&keys, &req.answers);
    let attempt = store.insert_attempt(quiz_id, user_id, score.score).await?;

    tracing::info!(
        "Attempt {} on quiz {} by {}: {}/{}",
        attempt.id,
        quiz_id,
        user_id,
        score.score,
        score.total
    );

    Ok(SubmitResponse {
        message: "Quiz submitted successfully".to_string(),
        attempt_id: attempt.id,
        score,
    })
}

pub async fn list_my_attempts(
    store: &dyn QuizStore,
    user_id: Uuid,
) -> Result<Vec<AttemptSummary>, AppError> {
    store.list_attempts_by_user(user_id).await
}
