// src/store/postgres.rs

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    PgConnection, PgPool, Postgres, QueryBuilder,
    postgres::PgPoolOptions,
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

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgres");

const CONNECT_RETRIES: u32 = 5;

/// Production store backed by PostgreSQL.
///
/// Update and delete lock the quiz row with `SELECT ... FOR UPDATE` before the
/// ownership check, so a concurrent delete cannot slip between check and write.
#[derive(Clone)]
pub struct PgQuizStore {
    pool: PgPool,
}

impl PgQuizStore {
    /// Connects with retry (the database may still be starting) and runs migrations.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let mut retry_count = 0;
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) => {
                    retry_count += 1;
                    if retry_count > CONNECT_RETRIES {
                        return Err(AppError::InternalServerError(format!(
                            "Failed to connect to database after {} retries: {}",
                            CONNECT_RETRIES, e
                        )));
                    }
                    tracing::warn!(
                        "Database not ready, retrying in 2s... (Attempt {})",
                        retry_count
                    );
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        };

        tracing::info!("Running migrations...");
        MIGRATOR.run(&pool).await?;
        tracing::info!("Migrations applied successfully.");

        Ok(Self { pool })
    }
}

const QUIZ_COLUMNS: &str = "id, title, description, time_limit, status, author_id, created_at";

async fn insert_questions(
    conn: &mut PgConnection,
    quiz_id: Uuid,
    questions: &[NewQuestion],
) -> Result<(), AppError> {
    if questions.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
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
    conn: &mut PgConnection,
    author_id: Uuid,
    draft: &QuizDraft,
) -> Result<Quiz, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        r#"
        INSERT INTO quizzes (id, title, description, time_limit, status, author_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
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

/// Locks the quiz row and returns its author, if the quiz exists.
async fn lock_author(conn: &mut PgConnection, quiz_id: Uuid) -> Result<Option<Uuid>, AppError> {
    let author_id =
        sqlx::query_scalar::<_, Uuid>("SELECT author_id FROM quizzes WHERE id = $1 FOR UPDATE")
            .bind(quiz_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(author_id)
}

async fn update_quiz_tx(
    conn: &mut PgConnection,
    caller_id: Uuid,
    quiz_id: Uuid,
    draft: &QuizDraft,
) -> Result<(), AppError> {
    check_owner(lock_author(conn, quiz_id).await?, caller_id, "update")?;

    sqlx::query(
        "UPDATE quizzes SET title = $1, description = $2, time_limit = $3, status = $4 WHERE id = $5",
    )
    .bind(&draft.fields.title)
    .bind(&draft.fields.description)
    .bind(draft.fields.time_limit)
    .bind(draft.fields.status.as_str())
    .bind(quiz_id)
    .execute(&mut *conn)
    .await?;

    // Full replacement: prior question ids are discarded.
    sqlx::query("DELETE FROM questions WHERE quiz_id = $1")
        .bind(quiz_id)
        .execute(&mut *conn)
        .await?;

    insert_questions(conn, quiz_id, &draft.questions).await
}

async fn delete_quiz_tx(
    conn: &mut PgConnection,
    caller_id: Uuid,
    quiz_id: Uuid,
) -> Result<(), AppError> {
    check_owner(lock_author(conn, quiz_id).await?, caller_id, "delete")?;

    for statement in [
        "DELETE FROM attempts WHERE quiz_id = $1",
        "DELETE FROM questions WHERE quiz_id = $1",
        "DELETE FROM quizzes WHERE id = $1",
    ] {
        sqlx::query(statement)
            .bind(quiz_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn get_quiz_tx(conn: &mut PgConnection, quiz_id: Uuid) -> Result<Option<QuizDetail>, AppError> {
    // Both reads must see the same snapshot.
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *conn)
        .await?;

    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
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
        WHERE quiz_id = $1
        ORDER BY position
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(QuizDetail { quiz, questions }))
}

#[async_trait]
impl QuizStore for PgQuizStore {
    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
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
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
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
            ORDER BY q.created_at DESC
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
            WHERE q.author_id = $1
            GROUP BY q.id
            ORDER BY q.created_at DESC
            "#,
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(quizzes)
    }

    async fn answer_key(&self, quiz_id: Uuid) -> Result<Option<Vec<AnswerKey>>, AppError> {
        // One statement: the quiz row (existence) and its questions come from the same snapshot.
        let rows = sqlx::query_as::<_, (Option<Uuid>, Option<i32>)>(
            r#"
            SELECT qs.id, qs.correct_option
            FROM quizzes q
            LEFT JOIN questions qs ON qs.quiz_id = q.id
            WHERE q.id = $1
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
            VALUES ($1, $2, $3, $4, $5)
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
            WHERE a.user_id = $1
            ORDER BY a.submitted_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }
}
