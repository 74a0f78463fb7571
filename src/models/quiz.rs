// src/models/quiz.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{NewQuestion, PublicQuestion, Question, QuestionInput},
};

/// Publication state of a quiz. Only `Published` quizzes are listed publicly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    #[default]
    Draft,
    Published,
}

impl QuizStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuizStatus::Draft => "draft",
            QuizStatus::Published => "published",
        }
    }
}

#[derive(Debug)]
pub struct UnknownStatus(String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown quiz status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl TryFrom<String> for QuizStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "draft" => Ok(QuizStatus::Draft),
            "published" => Ok(QuizStatus::Published),
            _ => Err(UnknownStatus(value)),
        }
    }
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Minutes allowed for one attempt.
    pub time_limit: i32,
    #[sqlx(try_from = "String")]
    pub status: QuizStatus,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Quiz row plus its question count ("my quizzes" listing and create response).
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct QuizSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub quiz: Quiz,
    pub question_count: i64,
}

/// Entry of the public listing: joined author email and question count.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct PublishedQuiz {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub quiz: Quiz,
    pub author_email: String,
    pub question_count: i64,
}

/// Quiz with its full question set, answers included (author view).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

/// Quiz with redacted questions (taker view).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuizForTaking {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

impl From<QuizDetail> for QuizForTaking {
    fn from(detail: QuizDetail) -> Self {
        Self {
            quiz: detail.quiz,
            questions: detail
                .questions
                .into_iter()
                .map(PublicQuestion::from)
                .collect(),
        }
    }
}

/// DTO returned by the create endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuizCreatedResponse {
    pub message: String,
    pub quiz: QuizSummary,
}

/// DTO for creating or updating a quiz. Updates always carry the complete question set.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct QuizRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 2000, message = "Description is required"))]
    pub description: String,
    #[validate(range(min = 1, max = 1440, message = "Time limit must be at least 1 minute"))]
    pub time_limit: i32,
    pub status: Option<QuizStatus>,
    #[validate(length(min = 1, max = 200, message = "At least one question is required"))]
    pub questions: Vec<QuestionInput>,
}

/// Validated scalar fields of a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizFields {
    pub title: String,
    pub description: String,
    pub time_limit: i32,
    pub status: QuizStatus,
}

/// Validated quiz payload: scalar fields plus the ordered question set.
#[derive(Debug, Clone)]
pub struct QuizDraft {
    pub fields: QuizFields,
    pub questions: Vec<NewQuestion>,
}

impl TryFrom<QuizRequest> for QuizDraft {
    type Error = AppError;

    fn try_from(req: QuizRequest) -> Result<Self, Self::Error> {
        let fields = QuizFields {
            title: req.title.trim().to_string(),
            description: req.description.trim().to_string(),
            time_limit: req.time_limit,
            status: req.status.unwrap_or_default(),
        };

        let check = QuizRequest {
            title: fields.title.clone(),
            description: fields.description.clone(),
            time_limit: fields.time_limit,
            status: Some(fields.status),
            questions: req.questions,
        };
        check.validate()?;

        let questions = check
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| {
                NewQuestion::try_from(q).map_err(|e| match e {
                    AppError::BadRequest(msg) => {
                        AppError::BadRequest(format!("Question {}: {}", i + 1, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { fields, questions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str, correct: i32) -> QuestionInput {
        QuestionInput {
            question_text: text.to_string(),
            option1: "A".to_string(),
            option2: "B".to_string(),
            option3: "C".to_string(),
            option4: "D".to_string(),
            correct_option: correct,
        }
    }

    fn request() -> QuizRequest {
        QuizRequest {
            title: "Rust basics".to_string(),
            description: "Ownership and borrowing".to_string(),
            time_limit: 10,
            status: None,
            questions: vec![question("Q1", 2), question("Q2", 4)],
        }
    }

    #[test]
    fn test_valid_request_defaults_to_draft() {
        let draft = QuizDraft::try_from(request()).unwrap();
        assert_eq!(draft.fields.status, QuizStatus::Draft);
        assert_eq!(draft.questions.len(), 2);
        assert_eq!(draft.questions[1].correct.one_based(), 4);
    }

    #[test]
    fn test_missing_title_rejected() {
        let mut req = request();
        req.title = String::new();
        assert!(matches!(
            QuizDraft::try_from(req),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_time_limit_below_one_rejected() {
        let mut req = request();
        req.time_limit = 0;
        assert!(matches!(
            QuizDraft::try_from(req),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_empty_question_set_rejected() {
        let mut req = request();
        req.questions.clear();
        assert!(matches!(
            QuizDraft::try_from(req),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_invalid_question_reports_its_position() {
        let mut req = request();
        req.questions[1].correct_option = 7;
        match QuizDraft::try_from(req) {
            Err(AppError::BadRequest(msg)) => assert!(msg.starts_with("Question 2")),
            other => panic!("unexpected result: {:?}", other.map(|d| d.fields)),
        }
    }

    #[test]
    fn test_missing_fields_deserialize_to_invalid_request() {
        let req: QuizRequest = serde_json::from_value(serde_json::json!({
            "title": "Only a title"
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_status_round_trip_through_column_text() {
        assert_eq!(
            QuizStatus::try_from("published".to_string()).unwrap(),
            QuizStatus::Published
        );
        assert_eq!(QuizStatus::Published.as_str(), "published");
        assert!(QuizStatus::try_from("archived".to_string()).is_err());
    }
}
