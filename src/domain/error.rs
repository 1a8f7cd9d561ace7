use thiserror::Error;

use super::task::TaskStatus;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("task `{task_id}` cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_transition(task_id: impl Into<String>, from: TaskStatus, to: TaskStatus) -> Self {
        Self::InvalidTransition {
            task_id: task_id.into(),
            from,
            to,
        }
    }
}
