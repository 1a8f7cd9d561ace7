use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::quiz::TestId;

/// Rendered result document ready for download or delivery to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Job name used by output devices and download file names.
    pub name: String,
    pub content_type: &'static str,
    pub extension: &'static str,
    pub bytes: Bytes,
}

impl RenderedDocument {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }
}

/// Structured errors surfaced by the renderer. None of them are transient, so
/// the queue worker never retries a failed render.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("test result not found for user {user_id} and test {test_id}")]
    NotFound { user_id: String, test_id: TestId },
    #[error("failed to load stored results: {message}")]
    Storage { message: String },
    #[error("document template failed: {message}")]
    Template { message: String },
}

impl RenderError {
    pub fn not_found(user_id: impl Into<String>, test_id: TestId) -> Self {
        Self::NotFound {
            user_id: user_id.into(),
            test_id,
        }
    }
}

/// Produces the result document for the latest submission of a (user, test) pair.
/// Implementations must recompute the score from canonical test definitions.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, user_id: &str, test_id: TestId)
    -> Result<RenderedDocument, RenderError>;
}
