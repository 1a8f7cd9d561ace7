use metrics::{counter, gauge};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::{
    quiz::TestId,
    task::{PrintTask, TaskId},
};

use super::status::StatusStore;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

const METRIC_TASKS_SUBMITTED: &str = "scoreprint_tasks_submitted_total";
pub(super) const METRIC_QUEUE_DEPTH: &str = "scoreprint_queue_depth";

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("print queue is closed")]
    Closed,
}

/// Producer handle for the print queue. Cheap to clone; every clone feeds the
/// same bounded FIFO consumed by the single queue worker.
#[derive(Clone)]
pub struct TaskSubmitter {
    sender: mpsc::Sender<PrintTask>,
    store: StatusStore,
}

impl TaskSubmitter {
    pub(super) fn new(sender: mpsc::Sender<PrintTask>, store: StatusStore) -> Self {
        Self { sender, store }
    }

    /// Submits a print task stamped with the current time.
    pub async fn submit(&self, user_id: &str, test_id: TestId) -> Result<TaskId, SubmitError> {
        self.submit_at(user_id, test_id, OffsetDateTime::now_utc())
            .await
    }

    /// Submits a print task for a submission made at `submitted_at`; the task
    /// id is derived from that instant.
    ///
    /// Waits while the queue is full. The task is registered as `created`
    /// only once a queue slot is reserved, so a closed queue leaves no trace
    /// in the status store.
    pub async fn submit_at(
        &self,
        user_id: &str,
        test_id: TestId,
        submitted_at: OffsetDateTime,
    ) -> Result<TaskId, SubmitError> {
        let task = PrintTask::new(user_id, test_id, submitted_at);
        self.enqueue(task).await
    }

    pub(super) async fn enqueue(&self, task: PrintTask) -> Result<TaskId, SubmitError> {
        let permit = self
            .sender
            .reserve()
            .await
            .map_err(|_| SubmitError::Closed)?;

        let task_id = task.task_id.clone();
        if !self.store.register(task.clone()) {
            debug!(
                target = "application::jobs::TaskSubmitter",
                task_id = %task_id,
                "task id already tracked; keeping the existing status"
            );
        }
        permit.send(task);

        counter!(METRIC_TASKS_SUBMITTED).increment(1);
        gauge!(METRIC_QUEUE_DEPTH).set(self.depth() as f64);
        debug!(
            target = "application::jobs::TaskSubmitter",
            task_id = %task_id,
            "print task queued"
        );

        Ok(task_id)
    }

    /// Tasks currently buffered, including reserved slots.
    pub fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
