use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use scoreprint::application::catalog::TestCatalog;
use scoreprint::application::delivery::{DeliveryClient, DeliveryError};
use scoreprint::application::jobs::{EngineConfig, PrintEngine};
use scoreprint::application::render::{RenderedDocument, Renderer, ResultDocumentRenderer};
use scoreprint::application::repos::SubmissionsRepo;
use scoreprint::application::results::ResultService;
use scoreprint::config::HttpSettings;
use scoreprint::domain::quiz::{Question, QuizTest, TestId};
use scoreprint::infra::http::{HttpState, build_router};
use scoreprint::infra::submissions::MemorySubmissionStore;

const ORIGIN: &str = "http://quiz.example";

struct AcceptingClient;

#[async_trait]
impl DeliveryClient for AcceptingClient {
    async fn attempt(&self, _document: &RenderedDocument) -> Result<(), DeliveryError> {
        Ok(())
    }
}

fn catalog() -> Arc<TestCatalog> {
    let question = |id: u32, correct_answer: u32| Question {
        id,
        question: format!("Question {id}"),
        options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        correct_answer,
    };
    Arc::new(TestCatalog::new(vec![
        QuizTest {
            id: TestId::new(1.0).unwrap(),
            title: "Fire safety".to_string(),
            questions: vec![question(1, 0), question(2, 2)],
        },
        QuizTest {
            id: TestId::new(2.5).unwrap(),
            title: "First aid".to_string(),
            questions: vec![question(1, 1)],
        },
    ]))
}

fn app() -> (Router, PrintEngine) {
    let catalog = catalog();
    let submissions: Arc<dyn SubmissionsRepo> = Arc::new(MemorySubmissionStore::default());
    let renderer: Arc<dyn Renderer> =
        Arc::new(ResultDocumentRenderer::new(submissions.clone(), catalog.clone()));
    let engine = PrintEngine::spawn(
        EngineConfig::default(),
        renderer.clone(),
        Arc::new(AcceptingClient),
    );

    let state = HttpState {
        results: ResultService::new(catalog, submissions, renderer, engine.submitter()),
        tasks: engine.store().clone(),
    };
    let settings = HttpSettings {
        cors_origin: ORIGIN.to_string(),
    };
    let router = build_router(state, &settings).expect("router builds");
    (router, engine)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec();
    (status, headers, body)
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    let (status, _, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).expect("json body"))
}

async fn post_json(router: &Router, uri: &str, body: String) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let (status, _, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).expect("json body"))
}

fn submission(user: &str, answers: Value) -> String {
    json!({
        "userId": user,
        "firstName": "Ann",
        "lastName": "Lee",
        "middleName": "Marie",
        "testId": 1,
        "answers": answers,
    })
    .to_string()
}

#[tokio::test]
async fn catalogue_hides_correct_answers() {
    let (router, _engine) = app();

    let (status, body) = get_json(&router, "/api/tests").await;
    assert_eq!(status, StatusCode::OK);
    let tests = body["tests"].as_array().unwrap();
    assert_eq!(tests.len(), 2);
    assert_eq!(tests[0]["title"], "Fire safety");
    assert!(tests[0]["questions"][0].get("correctAnswer").is_none());

    let (status, body) = get_json(&router, "/api/tests/2.5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "First aid");
    assert!(body["questions"][0].get("correctAnswer").is_none());
}

#[tokio::test]
async fn test_lookup_errors() {
    let (router, _engine) = app();

    let (status, body) = get_json(&router, "/api/tests/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid test ID format"}));

    let (status, body) = get_json(&router, "/api/tests/9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Test not found"}));
}

#[tokio::test]
async fn malformed_submission_is_rejected() {
    let (router, engine) = app();

    let (status, body) = post_json(&router, "/api/results", "{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid request body"}));

    let (status, _) = post_json(&router, "/api/results", submission("../etc", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(engine.store().is_empty());
}

#[tokio::test]
async fn submission_is_scored_queued_and_readable() {
    let (router, _engine) = app();

    let (status, recorded) = post_json(
        &router,
        "/api/results",
        submission("u1", json!({"1": 0, "2": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recorded["userId"], "u1");
    assert_eq!(recorded["score"], 1);
    assert_eq!(recorded["percentage"], "50.00%");
    let task_id = recorded["taskId"].as_str().unwrap().to_string();
    assert!(task_id.starts_with("u1_1_"));

    let task = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (status, task) = get_json(&router, &format!("/api/tasks/{task_id}")).await;
            assert_eq!(status, StatusCode::OK);
            if task["status"] == "completed" {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task completes");
    assert_eq!(task["userId"], "u1");
    assert!(task.get("error").is_none());

    let (status, latest) = get_json(&router, "/api/results/u1/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["score"], 1);
    assert_eq!(latest["total"], 2);
    assert_eq!(latest["percentage"], 50.0);
    assert_eq!(latest["grade"], "retake");
    assert_eq!(latest["middleName"], "Marie");
}

#[tokio::test]
async fn missing_results_and_tasks_are_404() {
    let (router, _engine) = app();

    let (status, body) = get_json(&router, "/api/results/nobody/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Test result not found"}));

    let (status, body) = get_json(&router, "/api/results/nobody/x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid test ID format"}));

    let (status, body) = get_json(&router, "/api/tasks/unknown_1_0").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Task not found"}));

    let (status, body) = get_json(&router, "/api/documents/nobody/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Test result not found"}));
}

#[tokio::test]
async fn document_download_carries_attachment_headers() {
    let (router, engine) = app();
    let (status, _) = post_json(
        &router,
        "/api/results",
        submission("u2", json!({"1": 0, "2": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::get("/api/documents/u2/1")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"test_result_u2_1.html\""
    );
    let task_id = headers["x-task-id"].to_str().unwrap();
    assert!(engine.store().get(&task_id.into()).is_some());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Test: Fire safety"));
    assert!(html.contains("Full name: Lee Ann Marie"));
    assert!(html.contains("Completion: 100.0%"));
    assert!(html.contains("Final grade: Excellent"));
}

#[tokio::test]
async fn document_request_rejects_header_breaking_user_ids() {
    let (router, engine) = app();

    for uri in ["/api/documents/x%22%3By/1", "/api/documents/x%3By/1"] {
        let (status, body) = get_json(&router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .contains("forbidden characters")
        );
    }
    assert!(engine.store().is_empty());
}

#[tokio::test]
async fn preflight_is_answered_without_routing() {
    let (router, _engine) = app();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/results")
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn invalid_cors_origin_is_a_configuration_error() {
    let catalog = catalog();
    let submissions: Arc<dyn SubmissionsRepo> = Arc::new(MemorySubmissionStore::default());
    let renderer: Arc<dyn Renderer> =
        Arc::new(ResultDocumentRenderer::new(submissions.clone(), catalog.clone()));
    let engine = PrintEngine::spawn(
        EngineConfig::default(),
        renderer.clone(),
        Arc::new(AcceptingClient),
    );
    let state = HttpState {
        results: ResultService::new(catalog, submissions, renderer, engine.submitter()),
        tasks: engine.store().clone(),
    };

    let settings = HttpSettings {
        cors_origin: "bad\norigin".to_string(),
    };
    assert!(build_router(state, &settings).is_err());
}
