use std::{num::NonZeroUsize, sync::Arc};

use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{error, info};

use crate::{
    application::{
        delivery::{DeliveryClient, RetryPolicy, RetryingDelivery},
        render::Renderer,
    },
    domain::task::{PrintTask, TaskId},
};

use super::{
    queue::{DEFAULT_QUEUE_CAPACITY, TaskSubmitter},
    status::{DEFAULT_EVENT_CAPACITY, StatusStore},
    worker::{QueueWorker, ShutdownPolicy, ShutdownSignal},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub queue_capacity: NonZeroUsize,
    pub event_capacity: NonZeroUsize,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: NonZeroUsize::MIN.saturating_add(DEFAULT_QUEUE_CAPACITY - 1),
            event_capacity: NonZeroUsize::MIN.saturating_add(DEFAULT_EVENT_CAPACITY - 1),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("print worker terminated abnormally: {0}")]
    Worker(String),
}

/// Owns the print queue, the status store and the single worker consuming
/// the queue. Construct one per process and hand out [`TaskSubmitter`]s.
pub struct PrintEngine {
    submitter: TaskSubmitter,
    store: StatusStore,
    shutdown: ShutdownSignal,
    worker: JoinHandle<()>,
}

impl PrintEngine {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(
        config: EngineConfig,
        renderer: Arc<dyn Renderer>,
        client: Arc<dyn DeliveryClient>,
    ) -> Self {
        let store = StatusStore::new(config.event_capacity.get());
        let (sender, receiver) = mpsc::channel(config.queue_capacity.get());
        let shutdown = ShutdownSignal::default();

        let worker = QueueWorker::new(
            receiver,
            store.clone(),
            renderer,
            RetryingDelivery::new(client, config.retry),
            shutdown.clone(),
        );
        let worker = tokio::spawn(worker.run());

        info!(
            target = "application::jobs::PrintEngine",
            queue_capacity = config.queue_capacity.get(),
            max_attempts = config.retry.max_attempts.get(),
            retry_interval = ?config.retry.interval,
            "print engine started"
        );

        Self {
            submitter: TaskSubmitter::new(sender, store.clone()),
            store,
            shutdown,
            worker,
        }
    }

    pub fn submitter(&self) -> TaskSubmitter {
        self.submitter.clone()
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    pub fn status(&self, task_id: &TaskId) -> Option<PrintTask> {
        self.store.get(task_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PrintTask> {
        self.store.subscribe()
    }

    /// Stops accepting submissions and waits for the worker to stop
    /// according to `policy`.
    pub async fn shutdown(self, policy: ShutdownPolicy) -> Result<(), EngineError> {
        info!(
            target = "application::jobs::PrintEngine",
            ?policy,
            "print engine shutting down"
        );
        self.shutdown.trigger(policy);

        self.worker.await.map_err(|err| {
            error!(
                target = "application::jobs::PrintEngine",
                error = %err,
                "print worker join failed"
            );
            EngineError::Worker(err.to_string())
        })
    }
}
