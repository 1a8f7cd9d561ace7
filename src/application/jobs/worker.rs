//! The single consumer of the print queue.
//!
//! Per task: skip if the stored status is already terminal, mark it
//! `processing`, render, deliver with retries, then record `completed` or
//! `failed`. Render errors are terminal for the task and never retried.

use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{Arc, OnceLock},
};

use futures::FutureExt;
use metrics::{counter, gauge};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    application::{delivery::RetryingDelivery, render::Renderer},
    domain::task::{PrintTask, TaskStatus},
};

use super::{queue::METRIC_QUEUE_DEPTH, status::StatusStore};

const METRIC_TASKS_FINISHED: &str = "scoreprint_tasks_finished_total";

/// What happens to queued tasks when the engine shuts down. The task in
/// flight always runs to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Process every task already in the queue, then stop.
    #[default]
    Drain,
    /// Stop after the in-flight task; queued tasks stay `created`.
    Abandon,
}

/// Cancellation token paired with the policy chosen by whoever cancelled it.
#[derive(Clone, Default)]
pub(super) struct ShutdownSignal {
    token: CancellationToken,
    policy: Arc<OnceLock<ShutdownPolicy>>,
}

impl ShutdownSignal {
    /// First caller decides the policy.
    pub(super) fn trigger(&self, policy: ShutdownPolicy) {
        let _ = self.policy.set(policy);
        self.token.cancel();
    }

    fn policy(&self) -> ShutdownPolicy {
        self.policy.get().copied().unwrap_or_default()
    }
}

pub(super) struct QueueWorker {
    receiver: mpsc::Receiver<PrintTask>,
    store: StatusStore,
    renderer: Arc<dyn Renderer>,
    delivery: RetryingDelivery,
    shutdown: ShutdownSignal,
}

impl QueueWorker {
    pub(super) fn new(
        receiver: mpsc::Receiver<PrintTask>,
        store: StatusStore,
        renderer: Arc<dyn Renderer>,
        delivery: RetryingDelivery,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            receiver,
            store,
            renderer,
            delivery,
            shutdown,
        }
    }

    pub(super) async fn run(mut self) {
        info!(target = "application::jobs::QueueWorker", "print worker started");

        loop {
            let task = tokio::select! {
                biased;
                _ = self.shutdown.token.cancelled() => break,
                task = self.receiver.recv() => match task {
                    Some(task) => task,
                    None => {
                        info!(
                            target = "application::jobs::QueueWorker",
                            "print queue closed; worker stopping"
                        );
                        return;
                    }
                },
            };
            self.process(task).await;
        }

        self.receiver.close();
        match self.shutdown.policy() {
            ShutdownPolicy::Drain => {
                let mut drained = 0usize;
                while let Some(task) = self.receiver.recv().await {
                    self.process(task).await;
                    drained += 1;
                }
                info!(
                    target = "application::jobs::QueueWorker",
                    drained, "print worker drained the queue and stopped"
                );
            }
            ShutdownPolicy::Abandon => {
                let mut abandoned = 0usize;
                while let Ok(task) = self.receiver.try_recv() {
                    abandoned += 1;
                    info!(
                        target = "application::jobs::QueueWorker",
                        task_id = %task.task_id,
                        "queued task abandoned"
                    );
                }
                gauge!(METRIC_QUEUE_DEPTH).set(0.0);
                warn!(
                    target = "application::jobs::QueueWorker",
                    abandoned, "print worker stopped; queued tasks left in created state"
                );
            }
        }
    }

    async fn process(&self, task: PrintTask) {
        gauge!(METRIC_QUEUE_DEPTH).set(self.receiver.len() as f64);

        let task_id = task.task_id.clone();
        let outcome = AssertUnwindSafe(self.handle(task.clone()))
            .catch_unwind()
            .await;

        if let Err(payload) = outcome {
            let message = format!("worker panicked: {}", panic_message(payload.as_ref()));
            error!(
                target = "application::jobs::QueueWorker",
                task_id = %task_id,
                error = %message,
                "print task panicked"
            );
            self.fail_after_panic(task, message);
        }
    }

    async fn handle(&self, queued: PrintTask) {
        // The store, not the queued copy, is authoritative for the guard.
        let mut task = match self.store.get(&queued.task_id) {
            Some(current) if current.status.is_terminal() => {
                info!(
                    target = "application::jobs::QueueWorker",
                    task_id = %current.task_id,
                    status = %current.status,
                    "duplicate task skipped"
                );
                return;
            }
            Some(current) => current,
            None => queued,
        };

        if let Err(err) = task.mark_processing(OffsetDateTime::now_utc()) {
            warn!(
                target = "application::jobs::QueueWorker",
                task_id = %task.task_id,
                error = %err,
                "task cannot start; skipping"
            );
            return;
        }
        self.store.put(task.clone());
        info!(
            target = "application::jobs::QueueWorker",
            task_id = %task.task_id,
            user_id = %task.user_id,
            test_id = %task.test_id,
            "print task processing"
        );

        let document = match self.renderer.render(&task.user_id, task.test_id).await {
            Ok(document) => document,
            Err(err) => {
                self.finish(task, Err(format!("render failed: {err}")));
                return;
            }
        };

        match self.delivery.deliver(&document).await {
            Ok(attempts) => {
                info!(
                    target = "application::jobs::QueueWorker",
                    task_id = %task.task_id,
                    attempts,
                    "print task delivered"
                );
                self.finish(task, Ok(()));
            }
            Err(err) => self.finish(task, Err(err.to_string())),
        }
    }

    fn finish(&self, mut task: PrintTask, outcome: Result<(), String>) {
        let now = OffsetDateTime::now_utc();
        let transition = match &outcome {
            Ok(()) => task.mark_completed(now),
            Err(message) => task.mark_failed(now, message.clone()),
        };
        if let Err(err) = transition {
            error!(
                target = "application::jobs::QueueWorker",
                task_id = %task.task_id,
                error = %err,
                "illegal task transition"
            );
            return;
        }

        counter!(METRIC_TASKS_FINISHED, "status" => task.status.as_str()).increment(1);
        match &task.error {
            Some(message) => warn!(
                target = "application::jobs::QueueWorker",
                task_id = %task.task_id,
                error = %message,
                "print task failed"
            ),
            None => info!(
                target = "application::jobs::QueueWorker",
                task_id = %task.task_id,
                "print task completed"
            ),
        }
        self.store.put(task);
    }

    fn fail_after_panic(&self, queued: PrintTask, message: String) {
        let task = self.store.get(&queued.task_id).unwrap_or(queued);
        match task.status {
            TaskStatus::Completed | TaskStatus::Failed => {}
            TaskStatus::Processing => self.finish(task, Err(message)),
            TaskStatus::Created => {
                let mut task = task;
                if task.mark_processing(OffsetDateTime::now_utc()).is_ok() {
                    self.finish(task, Err(message));
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

