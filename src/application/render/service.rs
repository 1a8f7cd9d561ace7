use std::{sync::Arc, time::Instant};

use askama::Template;
use async_trait::async_trait;
use bytes::Bytes;
use metrics::histogram;
use time::{format_description::FormatItem, macros::format_description};
use tracing::debug;

use crate::{
    application::{catalog::TestCatalog, repos::SubmissionsRepo},
    domain::{
        quiz::{Submission, TestId},
        scoring::{Grade, score_answers},
    },
};

use super::types::{RenderError, RenderedDocument, Renderer};

const METRIC_RENDER_MS: &str = "scoreprint_render_ms";
const DOCUMENT_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const DOCUMENT_EXTENSION: &str = "html";
const TAKEN_AT_FORMAT: &[FormatItem<'static>] =
    format_description!("[day].[month].[year] [hour]:[minute]");

pub(crate) struct ResultDocumentView {
    pub heading: &'static str,
    pub test_title: String,
    pub full_name: String,
    pub taken_at: String,
    pub correct: u32,
    pub total: u32,
    pub percentage: String,
    pub grade_key: &'static str,
    pub grade_label: &'static str,
}

#[derive(Template)]
#[template(path = "result_document.html")]
pub(crate) struct ResultDocumentTemplate {
    pub view: ResultDocumentView,
}

/// Renders the latest stored submission of a user into an HTML result sheet.
pub struct ResultDocumentRenderer {
    submissions: Arc<dyn SubmissionsRepo>,
    catalog: Arc<TestCatalog>,
}

impl ResultDocumentRenderer {
    pub fn new(submissions: Arc<dyn SubmissionsRepo>, catalog: Arc<TestCatalog>) -> Self {
        Self {
            submissions,
            catalog,
        }
    }

    fn build_view(&self, submission: &Submission) -> Result<ResultDocumentView, RenderError> {
        let test = self.catalog.find(submission.test_id);
        let summary = score_answers(test, &submission.answers);
        let grade = summary.grade();

        let taken_at = submission
            .date
            .format(TAKEN_AT_FORMAT)
            .map_err(|err| RenderError::Template {
                message: format!("failed to format submission date: {err}"),
            })?;

        Ok(ResultDocumentView {
            heading: "Test results",
            test_title: test
                .map(|test| test.title.clone())
                .unwrap_or_else(|| format!("Test {}", submission.test_id)),
            full_name: submission.full_name(),
            taken_at,
            correct: summary.correct,
            total: summary.total,
            percentage: format!("{:.1}", summary.percentage),
            grade_key: grade_key(grade),
            grade_label: grade.label(),
        })
    }
}

fn grade_key(grade: Grade) -> &'static str {
    match grade {
        Grade::Excellent => "excellent",
        Grade::Good => "good",
        Grade::Retake => "retake",
    }
}

#[async_trait]
impl Renderer for ResultDocumentRenderer {
    async fn render(
        &self,
        user_id: &str,
        test_id: TestId,
    ) -> Result<RenderedDocument, RenderError> {
        let started_at = Instant::now();

        let submission = self
            .submissions
            .latest_submission(user_id, test_id)
            .await
            .map_err(|err| RenderError::Storage {
                message: err.to_string(),
            })?
            .ok_or_else(|| RenderError::not_found(user_id, test_id))?;

        let view = self.build_view(&submission)?;
        let html = ResultDocumentTemplate { view }
            .render()
            .map_err(|err| RenderError::Template {
                message: err.to_string(),
            })?;

        histogram!(METRIC_RENDER_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        debug!(
            target = "application::render::ResultDocumentRenderer",
            user_id,
            test_id = %test_id,
            bytes = html.len(),
            "result document rendered"
        );

        Ok(RenderedDocument {
            name: format!("test_result_{user_id}_{test_id}"),
            content_type: DOCUMENT_CONTENT_TYPE,
            extension: DOCUMENT_EXTENSION,
            bytes: Bytes::from(html),
        })
    }
}
