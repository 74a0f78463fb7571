//! Quiz Repository.
//!
//! Durable storage of users, quizzes, questions and attempts behind the [`QuizStore`] trait.
//! Backends (`postgres`, `sqlite`) run every multi-statement mutation inside one
//! transaction and roll it back explicitly on failure, so readers never see a quiz
//! with a half-replaced question set.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptSummary},
        question::AnswerKey,
        quiz::{PublishedQuiz, Quiz, QuizDetail, QuizDraft, QuizSummary},
        user::User,
    },
};

pub mod postgres;
pub mod sqlite;

pub use postgres::PgQuizStore;
pub use sqlite::SqliteQuizStore;

/// Store handle shared by every request.
pub type SharedStore = Arc<dyn QuizStore>;

#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Inserts a user. A duplicate email yields `AppError::Conflict`.
    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<User, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Atomically inserts the quiz row and its ordered questions with fresh ids.
    async fn insert_quiz(&self, author_id: Uuid, draft: &QuizDraft) -> Result<QuizSummary, AppError>;

    /// Updates the scalar fields and replaces the full question set in one transaction.
    ///
    /// Ownership is decided inside that transaction: `NotFound` when the quiz is gone,
    /// `Forbidden` when `caller_id` is not the author. Neither case writes anything.
    async fn update_quiz(
        &self,
        caller_id: Uuid,
        quiz_id: Uuid,
        draft: &QuizDraft,
    ) -> Result<(), AppError>;

    /// Removes the quiz with its questions and attempts, same ownership rules as `update_quiz`.
    async fn delete_quiz_cascade(&self, caller_id: Uuid, quiz_id: Uuid) -> Result<(), AppError>;

    /// Quiz plus questions in their stored order, read from one consistent snapshot.
    async fn get_quiz(&self, quiz_id: Uuid) -> Result<Option<QuizDetail>, AppError>;

    /// Published quizzes, newest first, with author email and question count.
    async fn list_published(&self) -> Result<Vec<PublishedQuiz>, AppError>;

    /// Every quiz of one author regardless of status, newest first.
    async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<QuizSummary>, AppError>;

    /// Current answer key of a quiz. `None` when the quiz does not exist.
    async fn answer_key(&self, quiz_id: Uuid) -> Result<Option<Vec<AnswerKey>>, AppError>;

    /// Records a scored attempt. `NotFound` when the quiz was deleted meanwhile.
    async fn insert_attempt(
        &self,
        quiz_id: Uuid,
        user_id: Uuid,
        score: i32,
    ) -> Result<Attempt, AppError>;

    /// Attempts of one user, most recent first, with quiz title and current question count.
    async fn list_attempts_by_user(&self, user_id: Uuid) -> Result<Vec<AttemptSummary>, AppError>;
}

/// Opens the store selected by the URL scheme and applies its migrations.
pub async fn connect(database_url: &str) -> Result<SharedStore, AppError> {
    if database_url.starts_with("sqlite:") {
        let store = SqliteQuizStore::open(database_url).await?;
        Ok(Arc::new(store))
    } else {
        let store = PgQuizStore::connect(database_url).await?;
        Ok(Arc::new(store))
    }
}

/// Maps a unique-constraint violation to `Conflict`, anything else to a storage error.
pub(crate) fn unique_violation_as(err: sqlx::Error, conflict: &str) -> AppError {
    let is_unique = err
        .as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation());

    if is_unique {
        AppError::Conflict(conflict.to_string())
    } else {
        tracing::error!("Database error: {:?}", err);
        AppError::from(err)
    }
}

/// Maps a foreign-key violation to `NotFound`, anything else to a storage error.
pub(crate) fn foreign_key_violation_as(err: sqlx::Error, missing: &str) -> AppError {
    let is_foreign_key = err
        .as_database_error()
        .is_some_and(|db_err| db_err.is_foreign_key_violation());

    if is_foreign_key {
        AppError::NotFound(missing.to_string())
    } else {
        tracing::error!("Database error: {:?}", err);
        AppError::from(err)
    }
}

/// Builds the summary returned after a successful insert without another round trip.
pub(crate) fn summary_of(quiz: Quiz, draft: &QuizDraft) -> QuizSummary {
    QuizSummary {
        quiz,
        question_count: draft.questions.len() as i64,
    }
}

/// Ownership decision shared by update and delete.
pub(crate) fn check_owner(author_id: Option<Uuid>, caller_id: Uuid, action: &str) -> Result<(), AppError> {
    match author_id {
        None => Err(AppError::NotFound("Quiz not found".to_string())),
        Some(author_id) if author_id != caller_id => Err(AppError::Forbidden(format!(
            "Unauthorized to {} this quiz",
            action
        ))),
        Some(_) => Ok(()),
    }
}

/// Rolls back explicitly; a failed rollback is logged and the original error is kept.
pub(crate) async fn rollback<DB: sqlx::Database>(tx: sqlx::Transaction<'_, DB>) {
    if let Err(e) = tx.rollback().await {
        tracing::error!("Failed to roll back transaction: {:?}", e);
    }
}
