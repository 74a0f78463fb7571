// src/services/authoring.rs

//! Quiz Authoring Service.
//!
//! Validation happens before the store is written. Ownership of existing quizzes is
//! decided by the store inside the mutating transaction. A rejected update body is
//! reported as 404 or 403 first when the quiz is missing or foreign.

use uuid::Uuid;

use crate::{
    error::AppError,
    models::quiz::{PublishedQuiz, QuizDetail, QuizDraft, QuizRequest, QuizSummary},
    store::{QuizStore, check_owner},
};

pub async fn create_quiz(
    store: &dyn QuizStore,
    author_id: Uuid,
    req: QuizRequest,
) -> Result<QuizSummary, AppError> {
    let draft = QuizDraft::try_from(req)?;
    let created = store.insert_quiz(author_id, &draft).await?;

    tracing::info!(
        "Quiz {} created by {} with {} questions",
        created.quiz.id,
        author_id,
        created.question_count
    );
    Ok(created)
}

/// Replaces the scalar fields and the complete question set of an owned quiz.
pub async fn update_quiz(
    store: &dyn QuizStore,
    caller_id: Uuid,
    quiz_id: Uuid,
    req: QuizRequest,
) -> Result<(), AppError> {
    let draft = match QuizDraft::try_from(req) {
        Ok(draft) => draft,
        Err(invalid) => {
            let author_id = store.get_quiz(quiz_id).await?.map(|d| d.quiz.author_id);
            check_owner(author_id, caller_id, "update")?;
            return Err(invalid);
        }
    };
    store.update_quiz(caller_id, quiz_id, &draft).await?;

    tracing::info!("Quiz {} updated by {}", quiz_id, caller_id);
    Ok(())
}

/// Deletes an owned quiz together with its questions and attempts.
pub async fn delete_quiz(
    store: &dyn QuizStore,
    caller_id: Uuid,
    quiz_id: Uuid,
) -> Result<(), AppError> {
    store.delete_quiz_cascade(caller_id, quiz_id).await?;

    tracing::info!("Quiz {} deleted by {}", quiz_id, caller_id);
    Ok(())
}

pub async fn list_mine(store: &dyn QuizStore, author_id: Uuid) -> Result<Vec<QuizSummary>, AppError> {
    store.list_by_author(author_id).await
}

pub async fn list_published(store: &dyn QuizStore) -> Result<Vec<PublishedQuiz>, AppError> {
    store.list_published().await
}

/// Author view including correct options. Only the author may read it.
pub async fn get_for_editing(
    store: &dyn QuizStore,
    caller_id: Uuid,
    quiz_id: Uuid,
) -> Result<QuizDetail, AppError> {
    let detail = store
        .get_quiz(quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    check_owner(Some(detail.quiz.author_id), caller_id, "view")?;
    Ok(detail)
}
