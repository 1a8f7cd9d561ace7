//! Quiz catalogue entities and submission records.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;

const MAX_USER_ID_LEN: usize = 128;
const FORBIDDEN_USER_ID_CHARS: [char; 4] = ['/', '\\', '"', ';'];

/// Numeric test identifier as published in the quiz catalogue (`3`, `3.5`).
///
/// Displayed with the shortest decimal form, so `3.0` renders as `3`. The
/// rendered form is what appears in file names and task identifiers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(f64);

impl TestId {
    pub fn new(value: f64) -> Result<Self, DomainError> {
        if !value.is_finite() {
            return Err(DomainError::validation(format!(
                "test id must be a finite number, got {value}"
            )));
        }
        Ok(Self(value))
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TestId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<f64>()
            .map_err(|err| DomainError::validation(format!("invalid test id `{s}`: {err}")))?;
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: u32,
}

/// Canonical test definition, including correct answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizTest {
    pub id: TestId,
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuizTest {
    /// Copy of the test that is safe to hand to quiz takers.
    pub fn to_public(&self) -> PublicQuizTest {
        PublicQuizTest {
            id: self.id,
            title: self.title.clone(),
            questions: self
                .questions
                .iter()
                .map(|question| PublicQuestion {
                    id: question.id,
                    question: question.question.clone(),
                    options: question.options.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicQuestion {
    pub id: u32,
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicQuizTest {
    pub id: TestId,
    pub title: String,
    pub questions: Vec<PublicQuestion>,
}

/// Answers as sent by the quiz front end; score and date are assigned server-side.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDraft {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub test_id: TestId,
    #[serde(default)]
    pub answers: BTreeMap<u32, u32>,
}

impl SubmissionDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_user_id(&self.user_id)
    }

    pub fn into_submission(self, score: u32, date: OffsetDateTime) -> Submission {
        Submission {
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            middle_name: self.middle_name,
            test_id: self.test_id,
            answers: self.answers,
            score,
            date,
        }
    }
}

/// Stored quiz result. The stored score is informational only; readers always
/// recompute it from the canonical test definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub test_id: TestId,
    #[serde(default)]
    pub answers: BTreeMap<u32, u32>,
    #[serde(default)]
    pub score: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

impl Submission {
    pub fn full_name(&self) -> String {
        [
            self.last_name.as_str(),
            self.first_name.as_str(),
            self.middle_name.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn belongs_to(&self, user_id: &str, test_id: TestId) -> bool {
        self.user_id == user_id && self.test_id == test_id
    }
}

/// User ids end up in file names, task identifiers and the quoted
/// `Content-Disposition` file name, so path-like and quote-breaking input is
/// rejected.
pub fn validate_user_id(user_id: &str) -> Result<(), DomainError> {
    if user_id.trim().is_empty() {
        return Err(DomainError::validation("user id must not be empty"));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(DomainError::validation(format!(
            "user id exceeds {MAX_USER_ID_LEN} bytes"
        )));
    }
    if user_id.contains(FORBIDDEN_USER_ID_CHARS)
        || user_id.contains("..")
        || user_id.chars().any(char::is_control)
    {
        return Err(DomainError::validation(format!(
            "user id `{}` contains forbidden characters",
            user_id.escape_debug()
        )));
    }
    Ok(())
}
