use std::time::Duration;

use thiserror::Error;

/// Failures of a delivery attempt or of the whole retry sequence.
///
/// `DeviceUnavailable`, `Write` and `Timeout` describe one attempt and are
/// retried; `Exhausted` is the aggregate returned once attempts run out.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("output device unavailable: {message}")]
    DeviceUnavailable { message: String },
    #[error("failed to write job to output device: {message}")]
    Write { message: String },
    #[error("delivery attempt timed out after {after:?}")]
    Timeout { after: Duration },
    #[error("delivery failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl DeliveryError {
    pub fn device_unavailable(message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: message.into(),
        }
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
        }
    }

    pub(crate) fn outcome_label(&self) -> &'static str {
        match self {
            DeliveryError::DeviceUnavailable { .. } => "device_unavailable",
            DeliveryError::Write { .. } => "write_failed",
            DeliveryError::Timeout { .. } => "timeout",
            DeliveryError::Exhausted { .. } => "exhausted",
        }
    }
}
