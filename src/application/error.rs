use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    application::{jobs::SubmitError, render::RenderError, repos::RepoError},
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Diagnostic chain attached to error responses and logged by the response
/// logging middleware. Never sent to clients.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn from_message(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            source,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// JSON error response `{"error": "..."}` carrying an [`ErrorReport`].
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: String,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status,
            public_message: public_message.into(),
            report: ErrorReport::from_message(source, detail),
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        error: &dyn StdError,
    ) -> Self {
        Self {
            status,
            public_message: public_message.into(),
            report: ErrorReport::from_error(source, error),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.public_message,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Render(RenderError::NotFound { .. })
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Domain(DomainError::Validation { .. })
            | AppError::Repo(RepoError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            AppError::Submit(SubmitError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Domain(DomainError::InvalidTransition { .. })
            | AppError::Repo(_)
            | AppError::Render(_)
            | AppError::Infra(_)
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Render(RenderError::NotFound { .. }) => "Test result not found".to_string(),
            AppError::NotFound(message) => (*message).to_string(),
            AppError::Domain(DomainError::Validation { message })
            | AppError::Repo(RepoError::InvalidInput { message }) => message.clone(),
            AppError::Submit(SubmitError::Closed) => {
                "Print queue is not accepting tasks".to_string()
            }
            AppError::Repo(_) => "Failed to access stored results".to_string(),
            AppError::Render(_) => "Failed to generate document".to_string(),
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured".to_string(),
            AppError::Domain(DomainError::InvalidTransition { .. })
            | AppError::Infra(_)
            | AppError::Unexpected(_) => "Unexpected error occurred".to_string(),
        }
    }
}

impl From<AppError> for HttpError {
    fn from(error: AppError) -> Self {
        HttpError::from_error(
            "application::error::AppError",
            error.status_code(),
            error.public_message(),
            &error,
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        HttpError::from(self).into_response()
    }
}
