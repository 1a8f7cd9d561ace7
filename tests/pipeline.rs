use std::collections::BTreeMap;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Semaphore;

use scoreprint::application::catalog::TestCatalog;
use scoreprint::application::delivery::{
    DeliveryClient, DeliveryError, DeviceDeliveryClient, DeviceHandle, DeviceSession,
    OutputDevice, RetryPolicy,
};
use scoreprint::application::jobs::{
    EngineConfig, PrintEngine, ShutdownPolicy, StatusStore, SubmitError,
};
use scoreprint::application::render::{
    RenderError, RenderedDocument, Renderer, ResultDocumentRenderer,
};
use scoreprint::application::repos::SubmissionsRepo;
use scoreprint::application::results::ResultService;
use scoreprint::domain::quiz::{Question, QuizTest, SubmissionDraft, TestId};
use scoreprint::domain::task::{PrintTask, TaskId, TaskStatus};
use scoreprint::infra::submissions::MemorySubmissionStore;

fn test_id(value: f64) -> TestId {
    TestId::new(value).expect("finite test id")
}

fn engine_config(max_attempts: u32) -> EngineConfig {
    EngineConfig {
        queue_capacity: NonZeroUsize::new(16).unwrap(),
        retry: RetryPolicy::new(
            NonZeroU32::new(max_attempts).unwrap(),
            Duration::from_millis(1),
        ),
        ..EngineConfig::default()
    }
}

fn catalog() -> Arc<TestCatalog> {
    Arc::new(TestCatalog::new(vec![QuizTest {
        id: test_id(1.0),
        title: "Fire safety".to_string(),
        questions: (1..=3)
            .map(|id| Question {
                id,
                question: format!("Question {id}"),
                options: vec!["a".to_string(), "b".to_string()],
                correct_answer: 1,
            })
            .collect(),
    }]))
}

fn draft(user: &str) -> SubmissionDraft {
    SubmissionDraft {
        user_id: user.to_string(),
        first_name: "Ann".to_string(),
        last_name: "Lee".to_string(),
        middle_name: String::new(),
        test_id: test_id(1.0),
        answers: BTreeMap::from([(1, 1), (2, 1), (3, 0)]),
    }
}

async fn wait_for_terminal(store: &StatusStore, task_id: &TaskId) -> PrintTask {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(task) = store.get(task_id) {
                if task.status.is_terminal() {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task should reach a terminal state")
}

/// Fails the first `failures` attempts, then succeeds and records the document.
#[derive(Default)]
struct FlakyClient {
    failures: u32,
    attempts: AtomicU32,
    delivered: Mutex<Vec<RenderedDocument>>,
}

impl FlakyClient {
    fn failing(failures: u32) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryClient for FlakyClient {
    async fn attempt(&self, document: &RenderedDocument) -> Result<(), DeliveryError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(DeliveryError::device_unavailable("printer offline"));
        }
        self.delivered.lock().unwrap().push(document.clone());
        Ok(())
    }
}

/// Blocks every attempt until a permit is released.
struct GatedClient {
    gate: Semaphore,
    attempts: AtomicU32,
}

impl GatedClient {
    fn closed() -> Self {
        Self {
            gate: Semaphore::new(0),
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DeliveryClient for GatedClient {
    async fn attempt(&self, _document: &RenderedDocument) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|err| DeliveryError::write(err.to_string()))?;
        permit.forget();
        Ok(())
    }
}

/// Renders a fixed body for any pair and panics for the user `boom`.
struct StubRenderer;

#[async_trait]
impl Renderer for StubRenderer {
    async fn render(
        &self,
        user_id: &str,
        test_id: TestId,
    ) -> Result<RenderedDocument, RenderError> {
        if user_id == "boom" {
            panic!("template exploded");
        }
        Ok(RenderedDocument {
            name: format!("test_result_{user_id}_{test_id}"),
            content_type: "text/plain",
            extension: "txt",
            bytes: Bytes::from_static(b"result"),
        })
    }
}

struct HangingDevice;

#[async_trait]
impl OutputDevice for HangingDevice {
    async fn resolve_default(&self) -> Result<DeviceHandle, DeliveryError> {
        Ok(DeviceHandle::new("stuck"))
    }

    async fn open(&self, _handle: &DeviceHandle) -> Result<Box<dyn DeviceSession>, DeliveryError> {
        std::future::pending::<Result<Box<dyn DeviceSession>, DeliveryError>>().await
    }
}

#[tokio::test]
async fn recorded_result_is_printed_after_transient_failures() {
    let submissions: Arc<dyn SubmissionsRepo> = Arc::new(MemorySubmissionStore::default());
    let catalog = catalog();
    let renderer: Arc<dyn Renderer> =
        Arc::new(ResultDocumentRenderer::new(submissions.clone(), catalog.clone()));
    let client = Arc::new(FlakyClient::failing(2));

    let engine = PrintEngine::spawn(engine_config(5), renderer.clone(), client.clone());
    let mut events = engine.subscribe();
    let service = ResultService::new(catalog, submissions, renderer, engine.submitter());

    let recorded = service.record(draft("u1")).await.expect("recorded");
    assert_eq!(recorded.score, 2);
    assert_eq!(recorded.percentage, "66.67%");

    let task = wait_for_terminal(engine.store(), &recorded.task_id).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.error, None);
    assert_eq!(client.attempts(), 3);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if event.task_id == recorded.task_id {
            seen.push(event.status);
        }
    }
    assert_eq!(
        seen,
        vec![
            TaskStatus::Created,
            TaskStatus::Processing,
            TaskStatus::Completed
        ]
    );

    let delivered = client.delivered.lock().unwrap().clone();
    assert_eq!(delivered.len(), 1);
    let body = String::from_utf8(delivered[0].bytes.to_vec()).unwrap();
    assert!(body.contains("Full name: Lee Ann"));
    assert!(body.contains("Correct answers: 2 of 3"));

    engine.shutdown(ShutdownPolicy::Drain).await.unwrap();
}

#[tokio::test]
async fn missing_result_fails_without_delivery_attempts() {
    let submissions: Arc<dyn SubmissionsRepo> = Arc::new(MemorySubmissionStore::default());
    let renderer: Arc<dyn Renderer> = Arc::new(ResultDocumentRenderer::new(submissions, catalog()));
    let client = Arc::new(FlakyClient::default());
    let engine = PrintEngine::spawn(engine_config(5), renderer, client.clone());

    let task_id = engine
        .submitter()
        .submit("ghost", test_id(1.0))
        .await
        .unwrap();
    let task = wait_for_terminal(engine.store(), &task_id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.error.expect("failure message");
    assert!(error.contains("not found"), "unexpected error: {error}");
    assert_eq!(client.attempts(), 0);

    engine.shutdown(ShutdownPolicy::Drain).await.unwrap();
}

#[tokio::test]
async fn exhausted_retries_fail_the_task() {
    let client = Arc::new(FlakyClient::failing(u32::MAX));
    let engine = PrintEngine::spawn(engine_config(3), Arc::new(StubRenderer), client.clone());

    let task_id = engine.submitter().submit("u1", test_id(1.0)).await.unwrap();
    let task = wait_for_terminal(engine.store(), &task_id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.error.unwrap();
    assert!(error.contains("after 3 attempts"), "unexpected error: {error}");
    assert!(error.contains("printer offline"));
    assert_eq!(client.attempts(), 3);

    engine.shutdown(ShutdownPolicy::Drain).await.unwrap();
}

#[tokio::test]
async fn duplicate_task_id_is_processed_once() {
    let client = Arc::new(FlakyClient::default());
    let engine = PrintEngine::spawn(engine_config(1), Arc::new(StubRenderer), client.clone());
    let submitter = engine.submitter();
    let at = datetime!(2024-05-01 10:00:00 UTC);

    let first = submitter.submit_at("u1", test_id(1.0), at).await.unwrap();
    let second = submitter.submit_at("u1", test_id(1.0), at).await.unwrap();
    assert_eq!(first, second);

    let marker = submitter.submit("u2", test_id(1.0)).await.unwrap();
    wait_for_terminal(engine.store(), &marker).await;

    assert_eq!(
        engine.status(&first).unwrap().status,
        TaskStatus::Completed
    );
    assert_eq!(client.attempts(), 2);

    engine.shutdown(ShutdownPolicy::Drain).await.unwrap();
}

#[tokio::test]
async fn duplicate_of_failed_task_leaves_it_untouched() {
    let submissions: Arc<dyn SubmissionsRepo> = Arc::new(MemorySubmissionStore::default());
    let renderer: Arc<dyn Renderer> = Arc::new(ResultDocumentRenderer::new(submissions, catalog()));
    let client = Arc::new(FlakyClient::default());
    let engine = PrintEngine::spawn(engine_config(1), renderer, client.clone());
    let mut events = engine.subscribe();
    let submitter = engine.submitter();
    let at = datetime!(2024-05-01 10:00:00 UTC);

    let first = submitter.submit_at("ghost", test_id(1.0), at).await.unwrap();
    let failed = wait_for_terminal(engine.store(), &first).await;
    assert_eq!(failed.status, TaskStatus::Failed);

    let second = submitter.submit_at("ghost", test_id(1.0), at).await.unwrap();
    assert_eq!(first, second);
    let marker = submitter.submit("ghost", test_id(2.0)).await.unwrap();
    wait_for_terminal(engine.store(), &marker).await;

    let after = engine.status(&first).unwrap();
    assert_eq!(after, failed);
    assert!(after.error.as_deref().unwrap().contains("not found"));

    let mut transitions = Vec::new();
    while let Ok(event) = events.try_recv() {
        if event.task_id == first {
            transitions.push(event.status);
        }
    }
    assert_eq!(
        transitions,
        vec![
            TaskStatus::Created,
            TaskStatus::Processing,
            TaskStatus::Failed
        ]
    );
    assert_eq!(client.attempts(), 0);

    engine.shutdown(ShutdownPolicy::Drain).await.unwrap();
}

#[tokio::test]
async fn panicking_task_fails_and_worker_keeps_running() {
    let client = Arc::new(FlakyClient::default());
    let engine = PrintEngine::spawn(engine_config(1), Arc::new(StubRenderer), client.clone());
    let submitter = engine.submitter();

    let doomed = submitter.submit("boom", test_id(1.0)).await.unwrap();
    let healthy = submitter.submit("u1", test_id(1.0)).await.unwrap();

    let failed = wait_for_terminal(engine.store(), &doomed).await;
    assert_eq!(failed.status, TaskStatus::Failed);
    let error = failed.error.unwrap();
    assert!(error.contains("worker panicked"), "unexpected error: {error}");
    assert!(error.contains("template exploded"));

    let completed = wait_for_terminal(engine.store(), &healthy).await;
    assert_eq!(completed.status, TaskStatus::Completed);

    engine.shutdown(ShutdownPolicy::Drain).await.unwrap();
}

#[tokio::test]
async fn attempt_timeout_counts_as_failed_attempt() {
    let client = Arc::new(
        DeviceDeliveryClient::new(Arc::new(HangingDevice))
            .with_attempt_timeout(Some(Duration::from_millis(20))),
    );
    let engine = PrintEngine::spawn(engine_config(2), Arc::new(StubRenderer), client);

    let task_id = engine.submitter().submit("u1", test_id(1.0)).await.unwrap();
    let task = wait_for_terminal(engine.store(), &task_id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.error.unwrap();
    assert!(error.contains("timed out"), "unexpected error: {error}");

    engine.shutdown(ShutdownPolicy::Drain).await.unwrap();
}

async fn wait_for_status(store: &StatusStore, task_id: &TaskId, status: TaskStatus) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.get(task_id).map(|task| task.status) != Some(status) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task should reach the expected status");
}

#[tokio::test]
async fn drain_shutdown_processes_queued_tasks() {
    let client = Arc::new(GatedClient::closed());
    let engine = PrintEngine::spawn(engine_config(1), Arc::new(StubRenderer), client.clone());
    let store = engine.store().clone();
    let submitter = engine.submitter();

    let mut ids = Vec::new();
    for user in ["a", "b", "c"] {
        ids.push(submitter.submit(user, test_id(1.0)).await.unwrap());
    }
    wait_for_status(&store, &ids[0], TaskStatus::Processing).await;

    let (stopped, ()) = tokio::join!(engine.shutdown(ShutdownPolicy::Drain), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.gate.add_permits(3);
    });
    stopped.unwrap();

    for id in &ids {
        assert_eq!(store.get(id).unwrap().status, TaskStatus::Completed);
    }
    assert_eq!(
        submitter.submit("late", test_id(1.0)).await,
        Err(SubmitError::Closed)
    );
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn abandon_shutdown_leaves_queued_tasks_created() {
    let client = Arc::new(GatedClient::closed());
    let engine = PrintEngine::spawn(engine_config(1), Arc::new(StubRenderer), client.clone());
    let store = engine.store().clone();
    let submitter = engine.submitter();

    let in_flight = submitter.submit("a", test_id(1.0)).await.unwrap();
    let queued = [
        submitter.submit("b", test_id(1.0)).await.unwrap(),
        submitter.submit("c", test_id(1.0)).await.unwrap(),
    ];
    wait_for_status(&store, &in_flight, TaskStatus::Processing).await;

    let (stopped, ()) = tokio::join!(engine.shutdown(ShutdownPolicy::Abandon), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.gate.add_permits(3);
    });
    stopped.unwrap();

    assert_eq!(store.get(&in_flight).unwrap().status, TaskStatus::Completed);
    for id in &queued {
        assert_eq!(store.get(id).unwrap().status, TaskStatus::Created);
    }
    assert_eq!(client.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn task_timestamp_tracks_every_transition() {
    let client = Arc::new(FlakyClient::default());
    let engine = PrintEngine::spawn(engine_config(1), Arc::new(StubRenderer), client);
    let submitted_at = OffsetDateTime::UNIX_EPOCH;

    let task_id = engine
        .submitter()
        .submit_at("u1", test_id(2.5), submitted_at)
        .await
        .unwrap();
    assert_eq!(task_id.as_str(), "u1_2.5_0");

    let task = wait_for_terminal(engine.store(), &task_id).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.timestamp > submitted_at);

    engine.shutdown(ShutdownPolicy::Drain).await.unwrap();
}
