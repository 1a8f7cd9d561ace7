//! Print task descriptor and its state machine.
//!
//! ```text
//! created ──► processing ──► completed
//!                    └─────► failed
//! ```
//! `completed` and `failed` are terminal.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{error::DomainError, quiz::TestId};

/// Identifier derived from the owning submission: `{user}_{test}_{unix_seconds}`.
///
/// Two submissions for the same pair within one second share an identifier;
/// the worker's terminal-state guard turns the second run into a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn for_submission(user_id: &str, test_id: TestId, submitted_at: OffsetDateTime) -> Self {
        Self(format!(
            "{user_id}_{test_id}_{}",
            submitted_at.unix_timestamp()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Created, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One render-then-deliver unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintTask {
    pub task_id: TaskId,
    pub user_id: String,
    pub test_id: TestId,
    pub status: TaskStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PrintTask {
    pub fn new(user_id: impl Into<String>, test_id: TestId, submitted_at: OffsetDateTime) -> Self {
        let user_id = user_id.into();
        Self {
            task_id: TaskId::for_submission(&user_id, test_id, submitted_at),
            user_id,
            test_id,
            status: TaskStatus::Created,
            timestamp: submitted_at,
            error: None,
        }
    }

    pub fn mark_processing(&mut self, at: OffsetDateTime) -> Result<(), DomainError> {
        self.advance(TaskStatus::Processing, at)
    }

    pub fn mark_completed(&mut self, at: OffsetDateTime) -> Result<(), DomainError> {
        self.advance(TaskStatus::Completed, at)
    }

    pub fn mark_failed(
        &mut self,
        at: OffsetDateTime,
        error: impl Into<String>,
    ) -> Result<(), DomainError> {
        self.advance(TaskStatus::Failed, at)?;
        self.error = Some(error.into());
        Ok(())
    }

    fn advance(&mut self, next: TaskStatus, at: OffsetDateTime) -> Result<(), DomainError> {
        if !self.status.can_advance_to(next) {
            return Err(DomainError::invalid_transition(
                self.task_id.as_str(),
                self.status,
                next,
            ));
        }
        self.status = next;
        self.timestamp = at;
        Ok(())
    }
}
