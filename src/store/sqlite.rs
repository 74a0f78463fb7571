// src/store/sqlite.rs

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    QueryBuilder, Sqlite, SqliteConnection, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptSummary},
        question::{AnswerKey, NewQuestion, Question},
        quiz::{PublishedQuiz, Quiz, QuizDetail, QuizDraft, QuizSummary},
        user::User,
    },
    store::{
        QuizStore, check_owner, foreign_key_violation_as, rollback, summary_of,
        unique_violation_as,
    },
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// Embedded store for local development and tests.
///
/// SQLite has no `SELECT ... FOR UPDATE`. Update and delete therefore start with a
/// conditional write (`WHERE id = ? AND author_id = ?`): it takes the write lock and
/// proves ownership in one statement, and a zero row count is classified afterwards.
#[derive(Clone)]
pub struct SqliteQuizStore {
    pool: SqlitePool,
}

impl SqliteQuizStore {
    pub async fn open_in_memory() -> Result<Self, AppError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, AppError> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database lives and dies with its single connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;

        MIGRATOR.run(&pool).await?;

        Ok(Self { pool })
    }
}

const QUIZ_COLUMNS: &str = "id, title, description, time_limit, status, author_id, created_at";

async fn insert_questions(
    conn: &mut SqliteConnection,
    quiz_id: Uuid,
    questions: &[NewQuestion],
) -> Result<(), AppError> {
    if questions.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO questions \
         (id, quiz_id, position, question_text, option1, option2, option3, option4, correct_option) ",
    );
    builder.push_values(questions.iter().enumerate(), |mut row, (position, q)| {
        row.push_bind(Uuid::new_v4())
            .push_bind(quiz_id)
            .push_bind(position as i32)
            .push_bind(q.question_text.clone())
            .push_bind(q.options[0].clone())
            .push_bind(q.options[1].clone())
            .push_bind(q.options[2].clone())
            .push_bind(q.options[3].clone())
            .push_bind(q.correct.one_based());
    });

    builder.build().execute(&mut *conn).await?;
    Ok(())
}

async fn insert_quiz_tx(
    conn: &mut SqliteConnection,
    author_id: Uuid,
    draft: &QuizDraft,
) -> Result<Quiz, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        r#"
        INSERT INTO quizzes (id, title, description, time_limit, status, author_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {QUIZ_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(&draft.fields.title)
    .bind(&draft.fields.description)
    .bind(draft.fields.time_limit)
    .bind(draft.fields.status.as_str())
    .bind(author_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    insert_questions(conn, quiz.id, &draft.questions).await?;
    Ok(quiz)
}

/// Explains a conditional write that touched no row: missing quiz or foreign author.
async fn classify_miss(
    conn: &mut SqliteConnection,
    caller_id: Uuid,
    quiz_id: Uuid,
    action: &str,
) -> AppError {
    let author_id = sqlx::query_scalar::<_, Uuid>("SELECT author_id FROM quizzes WHERE id = ?")
        .bind(quiz_id)
        .fetch_optional(&mut *conn)
        .await;

    match author_id {
        Ok(author_id) => match check_owner(author_id, caller_id, action) {
            Err(e) => e,
            // The row matched on re-read; treat the earlier miss as a storage anomaly.
            Ok(()) => AppError::InternalServerError(format!(
                "conditional {} of quiz {} matched no row",
                action, quiz_id
            )),
        },
        Err(e) => AppError::from(e),
    }
}

async fn update_quiz_tx(
    conn: &mut SqliteConnection,
    caller_id: Uuid,
    quiz_id: Uuid,
    draft: &QuizDraft,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE quizzes SET title = ?, description = ?, time_limit = ?, status = ?
        WHERE id = ? AND author_id = ?
        "#,
    )
    .bind(&draft.fields.title)
    .bind(&draft.fields.description)
    .bind(draft.fields.time_limit)
    .bind(draft.fields.status.as_str())
    .bind(quiz_id)
    .bind(caller_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(classify_miss(conn, caller_id, quiz_id, "update").await);
    }

    // Full replacement: prior question ids are discarded.
    sqlx::query("DELETE FROM questions WHERE quiz_id = ?")
        .bind(quiz_id)
        .execute(&mut *conn)
        .await?;

    insert_questions(conn, quiz_id, &draft.questions).await
}

async fn delete_quiz_tx(
    conn: &mut SqliteConnection,
    caller_id: Uuid,
    quiz_id: Uuid,
) -> Result<(), AppError> {
    for statement in [
        "DELETE FROM attempts WHERE quiz_id IN (SELECT id FROM quizzes WHERE id = ? AND author_id = ?)",
        "DELETE FROM questions WHERE quiz_id IN (SELECT id FROM quizzes WHERE id = ? AND author_id = ?)",
    ] {
        sqlx::query(statement)
            .bind(quiz_id)
            .bind(caller_id)
            .execute(&mut *conn)
            .await?;
    }

    let result = sqlx::query("DELETE FROM quizzes WHERE id = ? AND author_id = ?")
        .bind(quiz_id)
        .bind(caller_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(classify_miss(conn, caller_id, quiz_id, "delete").await);
    }
    Ok(())
}

async fn get_quiz_tx(
    conn: &mut SqliteConnection,
    quiz_id: Uuid,
) -> Result<Option<QuizDetail>, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = ?"
    ))
    .bind(quiz_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(quiz) = quiz else {
        return Ok(None);
    };

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, question_text, option1, option2, option3, option4, correct_option
        FROM questions
        WHERE quiz_id = ?
        ORDER BY position
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(QuizDetail { quiz, questions }))
}

#[async_trait]
impl QuizStore for SqliteQuizStore {
    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation_as(e, "User already exists"))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_quiz(&self, author_id: Uuid, draft: &QuizDraft) -> Result<QuizSummary, AppError> {
        let mut tx = self.pool.begin().await?;
        match insert_quiz_tx(&mut tx, author_id, draft).await {
            Ok(quiz) => {
                tx.commit().await?;
                Ok(summary_of(quiz, draft))
            }
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    async fn update_quiz(
        &self,
        caller_id: Uuid,
        quiz_id: Uuid,
        draft: &QuizDraft,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        match update_quiz_tx(&mut tx, caller_id, quiz_id, draft).await {
            Ok(()) => Ok(tx.commit().await?),
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    async fn delete_quiz_cascade(&self, caller_id: Uuid, quiz_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        match delete_quiz_tx(&mut tx, caller_id, quiz_id).await {
            Ok(()) => Ok(tx.commit().await?),
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    async fn get_quiz(&self, quiz_id: Uuid) -> Result<Option<QuizDetail>, AppError> {
        let mut tx = self.pool.begin().await?;
        match get_quiz_tx(&mut tx, quiz_id).await {
            Ok(detail) => {
                tx.commit().await?;
                Ok(detail)
            }
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    async fn list_published(&self) -> Result<Vec<PublishedQuiz>, AppError> {
        // rowid breaks ties between rows created within the same millisecond.
        let quizzes = sqlx::query_as::<_, PublishedQuiz>(
            r#"
            SELECT
                q.id, q.title, q.description, q.time_limit, q.status, q.author_id, q.created_at,
                u.email AS author_email,
                COUNT(qs.id) AS question_count
            FROM quizzes q
            JOIN users u ON q.author_id = u.id
            LEFT JOIN questions qs ON q.id = qs.quiz_id
            WHERE q.status = 'published'
            GROUP BY q.id, u.email
            ORDER BY julianday(q.created_at) DESC, q.rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(quizzes)
    }

    async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<QuizSummary>, AppError> {
        let quizzes = sqlx::query_as::<_, QuizSummary>(
            r#"
            SELECT
                q.id, q.title, q.description, q.time_limit, q.status, q.author_id, q.created_at,
                COUNT(qs.id) AS question_count
            FROM quizzes q
            LEFT JOIN questions qs ON q.id = qs.quiz_id
            WHERE q.author_id = ?
            GROUP BY q.id
            ORDER BY julianday(q.created_at) DESC, q.rowid DESC
            "#,
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(quizzes)
    }

    async fn answer_key(&self, quiz_id: Uuid) -> Result<Option<Vec<AnswerKey>>, AppError> {
        let rows = sqlx::query_as::<_, (Option<Uuid>, Option<i32>)>(
            r#"
            SELECT qs.id, qs.correct_option
            FROM quizzes q
            LEFT JOIN questions qs ON qs.quiz_id = q.id
            WHERE q.id = ?
            ORDER BY qs.position
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            rows.into_iter()
                .filter_map(|(id, correct_option)| {
                    Some(AnswerKey {
                        id: id?,
                        correct_option: correct_option?,
                    })
                })
                .collect(),
        ))
    }

    async fn insert_attempt(
        &self,
        quiz_id: Uuid,
        user_id: Uuid,
        score: i32,
    ) -> Result<Attempt, AppError> {
        let attempt = sqlx::query_as::<_, Attempt>(
            r#"
            INSERT INTO attempts (id, quiz_id, user_id, score, submitted_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, quiz_id, user_id, score, submitted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(quiz_id)
        .bind(user_id)
        .bind(score)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| foreign_key_violation_as(e, "Quiz not found"))?;
        Ok(attempt)
    }

    async fn list_attempts_by_user(&self, user_id: Uuid) -> Result<Vec<AttemptSummary>, AppError> {
        let attempts = sqlx::query_as::<_, AttemptSummary>(
            r#"
            SELECT
                a.id, a.quiz_id, a.user_id, a.score, a.submitted_at,
                q.title AS quiz_title,
                (SELECT COUNT(*) FROM questions WHERE quiz_id = q.id) AS total_questions
            FROM attempts a
            JOIN quizzes q ON a.quiz_id = q.id
            WHERE a.user_id = ?
            ORDER BY julianday(a.submitted_at) DESC, a.rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }
}
