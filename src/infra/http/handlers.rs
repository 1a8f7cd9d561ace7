use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    application::error::{AppError, HttpError},
    domain::{
        quiz::{PublicQuizTest, SubmissionDraft, TestId},
        task::TaskId,
    },
};

use super::{HttpState, middleware::TASK_ID_HEADER};

const SOURCE: &str = "infra::http::handlers";

#[derive(Serialize)]
pub struct TestsResponse {
    pub tests: Vec<PublicQuizTest>,
}

fn parse_test_id(raw: &str) -> Result<TestId, HttpError> {
    raw.parse::<TestId>().map_err(|err| {
        HttpError::from_error(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid test ID format",
            &err,
        )
    })
}

pub async fn list_tests(State(state): State<HttpState>) -> Json<TestsResponse> {
    Json(TestsResponse {
        tests: state.results.catalog().public_tests(),
    })
}

pub async fn get_test(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<PublicQuizTest>, HttpError> {
    let test_id = parse_test_id(&id)?;
    state
        .results
        .catalog()
        .public_test(test_id)
        .map(Json)
        .ok_or_else(|| {
            HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Test not found",
                format!("no test with id {test_id}"),
            )
        })
}

pub async fn submit_result(
    State(state): State<HttpState>,
    payload: Result<Json<SubmissionDraft>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(draft) = payload.map_err(|rejection| {
        HttpError::from_error(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid request body",
            &rejection,
        )
    })?;

    let recorded = state.results.record(draft).await?;
    Ok(Json(recorded).into_response())
}

pub async fn latest_result(
    State(state): State<HttpState>,
    Path((user_id, test_id)): Path<(String, String)>,
) -> Result<Response, HttpError> {
    let test_id = parse_test_id(&test_id)?;
    let latest = state.results.latest(&user_id, test_id).await?;
    Ok(Json(latest).into_response())
}

pub async fn download_document(
    State(state): State<HttpState>,
    Path((user_id, test_id)): Path<(String, String)>,
) -> Result<Response, HttpError> {
    let test_id = parse_test_id(&test_id)?;
    let requested = state.results.document(&user_id, test_id).await?;
    let document = requested.document;

    let disposition = format!("attachment; filename=\"{}\"", document.file_name());
    let disposition = HeaderValue::from_str(&disposition).map_err(|err| {
        HttpError::from(AppError::unexpected(format!(
            "document name is not a valid header: {err}"
        )))
    })?;
    let task_id = HeaderValue::from_str(requested.task_id.as_str()).map_err(|err| {
        HttpError::from(AppError::unexpected(format!(
            "task id is not a valid header: {err}"
        )))
    })?;

    let mut response = (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(document.content_type),
        )],
        document.bytes,
    )
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(TASK_ID_HEADER, task_id);
    Ok(response)
}

pub async fn task_status(
    State(state): State<HttpState>,
    Path(task_id): Path<String>,
) -> Result<Response, HttpError> {
    let task_id = TaskId::from(task_id);
    match state.tasks.get(&task_id) {
        Some(task) => Ok(Json(task).into_response()),
        None => Err(HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Task not found",
            format!("no task with id `{task_id}`"),
        )),
    }
}
