//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::quiz::{Submission, TestId};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("stored record `{location}` is corrupt: {message}")]
    Corrupt { location: String, message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn corrupt(location: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            location: location.into(),
            message: message.to_string(),
        }
    }
}

/// Storage for submitted quiz results. Several records may exist for one
/// (user, test) pair; each resubmission appends a new one.
#[async_trait]
pub trait SubmissionsRepo: Send + Sync {
    async fn save_submission(&self, submission: &Submission) -> Result<(), RepoError>;

    async fn list_submissions(
        &self,
        user_id: &str,
        test_id: TestId,
    ) -> Result<Vec<Submission>, RepoError>;

    /// Record with the greatest submission date, if any.
    async fn latest_submission(
        &self,
        user_id: &str,
        test_id: TestId,
    ) -> Result<Option<Submission>, RepoError> {
        let submissions = self.list_submissions(user_id, test_id).await?;
        Ok(submissions
            .into_iter()
            .max_by_key(|submission| submission.date))
    }
}
