// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Number of options every question carries.
pub const OPTION_COUNT: usize = 4;

/// Index of the correct option.
///
/// Stored 0-based. The wire format and the `correct_option` column are 1-based;
/// `from_one_based` / `one_based` are the only places the two meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionIndex(usize);

impl OptionIndex {
    pub fn from_one_based(value: i32) -> Option<Self> {
        match usize::try_from(value) {
            Ok(v) if (1..=OPTION_COUNT).contains(&v) => Some(Self(v - 1)),
            _ => None,
        }
    }

    pub fn one_based(self) -> i32 {
        self.0 as i32 + 1
    }
}

/// Represents the 'questions' table in the database.
/// This is the author view: it carries `correct_option`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_text: String,
    pub option1: String,
    pub option2: String,
    pub option3: String,
    pub option4: String,
    /// 1-based index of the correct option.
    pub correct_option: i32,
}

/// DTO for sending a question to a respondent (excludes `correct_option`).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_text: String,
    pub option1: String,
    pub option2: String,
    pub option3: String,
    pub option4: String,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            quiz_id: q.quiz_id,
            question_text: q.question_text,
            option1: q.option1,
            option2: q.option2,
            option3: q.option3,
            option4: q.option4,
        }
    }
}

/// DTO for a question inside a create/update quiz request.
/// Missing fields default to empty values so they surface as validation errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 1000, message = "Question text is required"))]
    pub question_text: String,
    #[validate(length(min = 1, max = 500, message = "Option 1 is required"))]
    pub option1: String,
    #[validate(length(min = 1, max = 500, message = "Option 2 is required"))]
    pub option2: String,
    #[validate(length(min = 1, max = 500, message = "Option 3 is required"))]
    pub option3: String,
    #[validate(length(min = 1, max = 500, message = "Option 4 is required"))]
    pub option4: String,
    #[validate(range(min = 1, max = 4, message = "Correct option must be between 1 and 4"))]
    pub correct_option: i32,
}

/// A validated question ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub question_text: String,
    pub options: [String; OPTION_COUNT],
    pub correct: OptionIndex,
}

impl TryFrom<QuestionInput> for NewQuestion {
    type Error = AppError;

    /// Trims the text, then validates it. Text is stored as written;
    /// escaping is left to whoever renders it.
    fn try_from(input: QuestionInput) -> Result<Self, Self::Error> {
        let trimmed = QuestionInput {
            question_text: input.question_text.trim().to_string(),
            option1: input.option1.trim().to_string(),
            option2: input.option2.trim().to_string(),
            option3: input.option3.trim().to_string(),
            option4: input.option4.trim().to_string(),
            correct_option: input.correct_option,
        };
        trimmed.validate()?;

        let correct = OptionIndex::from_one_based(trimmed.correct_option).ok_or_else(|| {
            AppError::BadRequest("Correct option must be between 1 and 4".to_string())
        })?;

        let options = [
            trimmed.option1,
            trimmed.option2,
            trimmed.option3,
            trimmed.option4,
        ];
        for (i, option) in options.iter().enumerate() {
            if options[..i].iter().any(|earlier| earlier == option) {
                return Err(AppError::BadRequest(
                    "Question options must be distinct".to_string(),
                ));
            }
        }

        Ok(Self {
            question_text: trimmed.question_text,
            options,
            correct,
        })
    }
}

/// Helper struct for fetching the answer key of a quiz.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct AnswerKey {
    pub id: Uuid,
    pub correct_option: i32,
}
