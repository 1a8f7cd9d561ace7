//! Use cases behind the result endpoints: recording a submission, reading the
//! latest result, and producing a result document on request.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;

use crate::{
    application::{
        catalog::TestCatalog,
        error::AppError,
        jobs::TaskSubmitter,
        render::{RenderedDocument, Renderer},
        repos::SubmissionsRepo,
    },
    domain::{
        quiz::{SubmissionDraft, TestId, validate_user_id},
        scoring::{Grade, score_answers},
        task::TaskId,
    },
};

/// Response to a recorded submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedResult {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub test_id: TestId,
    pub score: u32,
    /// Two decimals with a percent sign, e.g. `"66.67%"`.
    pub percentage: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub task_id: TaskId,
}

/// Latest stored result, rescored against the catalogue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestResult {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,
    pub test_id: TestId,
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub grade: Grade,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct RequestedDocument {
    pub document: RenderedDocument,
    pub task_id: TaskId,
}

#[derive(Clone)]
pub struct ResultService {
    catalog: Arc<TestCatalog>,
    submissions: Arc<dyn SubmissionsRepo>,
    renderer: Arc<dyn Renderer>,
    submitter: TaskSubmitter,
}

impl ResultService {
    pub fn new(
        catalog: Arc<TestCatalog>,
        submissions: Arc<dyn SubmissionsRepo>,
        renderer: Arc<dyn Renderer>,
        submitter: TaskSubmitter,
    ) -> Self {
        Self {
            catalog,
            submissions,
            renderer,
            submitter,
        }
    }

    pub fn catalog(&self) -> &TestCatalog {
        &self.catalog
    }

    /// Scores and stores the submission, then queues it for printing. The
    /// print task id is derived from the stored submission date.
    pub async fn record(&self, draft: SubmissionDraft) -> Result<RecordedResult, AppError> {
        draft.validate()?;

        let date = OffsetDateTime::now_utc();
        let summary = score_answers(self.catalog.find(draft.test_id), &draft.answers);
        let submission = draft.into_submission(summary.correct, date);
        self.submissions.save_submission(&submission).await?;

        let task_id = self
            .submitter
            .submit_at(&submission.user_id, submission.test_id, date)
            .await?;

        info!(
            target = "application::results::ResultService",
            user_id = %submission.user_id,
            test_id = %submission.test_id,
            score = summary.correct,
            task_id = %task_id,
            "test result recorded"
        );

        Ok(RecordedResult {
            user_id: submission.user_id,
            first_name: submission.first_name,
            last_name: submission.last_name,
            test_id: submission.test_id,
            score: summary.correct,
            percentage: format!("{:.2}%", summary.percentage),
            date,
            task_id,
        })
    }

    pub async fn latest(&self, user_id: &str, test_id: TestId) -> Result<LatestResult, AppError> {
        validate_user_id(user_id)?;

        let submission = self
            .submissions
            .latest_submission(user_id, test_id)
            .await?
            .ok_or(AppError::NotFound("Test result not found"))?;
        let summary = score_answers(self.catalog.find(test_id), &submission.answers);

        Ok(LatestResult {
            user_id: submission.user_id,
            first_name: submission.first_name,
            last_name: submission.last_name,
            middle_name: submission.middle_name,
            test_id: submission.test_id,
            score: summary.correct,
            total: summary.total,
            percentage: summary.percentage,
            grade: summary.grade(),
            date: submission.date,
        })
    }

    /// Renders the result document for download and queues the same result
    /// for printing.
    pub async fn document(
        &self,
        user_id: &str,
        test_id: TestId,
    ) -> Result<RequestedDocument, AppError> {
        validate_user_id(user_id)?;

        let document = self.renderer.render(user_id, test_id).await?;
        let task_id = self.submitter.submit(user_id, test_id).await?;

        Ok(RequestedDocument { document, task_id })
    }
}
