use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::broadcast;

use crate::domain::task::{PrintTask, TaskId};

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Concurrent task id → task map, the authoritative record of task state.
///
/// Every stored snapshot is also published to subscribers. Entries are never
/// removed; the map grows with the number of submissions for the life of the
/// engine.
#[derive(Clone)]
pub struct StatusStore {
    tasks: Arc<DashMap<TaskId, PrintTask>>,
    events: broadcast::Sender<PrintTask>,
}

impl StatusStore {
    /// `event_capacity` bounds how far a slow subscriber may lag before it
    /// starts missing snapshots. Zero is treated as one.
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            tasks: Arc::new(DashMap::new()),
            events,
        }
    }

    /// Upsert; the last writer wins.
    pub fn put(&self, task: PrintTask) {
        self.tasks.insert(task.task_id.clone(), task.clone());
        self.publish(task);
    }

    /// Inserts the task only when its id is not tracked yet. Returns whether
    /// the task was inserted.
    pub fn register(&self, task: PrintTask) -> bool {
        let inserted = match self.tasks.entry(task.task_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(task.clone());
                true
            }
            Entry::Occupied(_) => false,
        };
        if inserted {
            self.publish(task);
        }
        inserted
    }

    pub fn get(&self, task_id: &TaskId) -> Option<PrintTask> {
        self.tasks.get(task_id).map(|entry| entry.value().clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PrintTask> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn publish(&self, task: PrintTask) {
        // No subscribers is the common case.
        let _ = self.events.send(task);
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::domain::{quiz::TestId, task::TaskStatus};

    fn task(user: &str) -> PrintTask {
        PrintTask::new(user, TestId::new(1.0).unwrap(), OffsetDateTime::UNIX_EPOCH)
    }

    #[test]
    fn put_overwrites_and_get_returns_copy() {
        let store = StatusStore::default();
        let mut task = task("u1");
        store.put(task.clone());

        task.mark_processing(OffsetDateTime::now_utc()).unwrap();
        assert_eq!(
            store.get(&task.task_id).unwrap().status,
            TaskStatus::Created
        );

        store.put(task.clone());
        assert_eq!(
            store.get(&task.task_id).unwrap().status,
            TaskStatus::Processing
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn register_never_resets_an_advanced_task() {
        let store = StatusStore::default();
        let mut advanced = task("u1");
        advanced.mark_processing(OffsetDateTime::now_utc()).unwrap();
        store.put(advanced.clone());

        assert!(!store.register(task("u1")));
        assert_eq!(
            store.get(&advanced.task_id).unwrap().status,
            TaskStatus::Processing
        );
        assert!(store.register(task("u2")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unknown_id_is_absent() {
        let store = StatusStore::default();
        assert!(store.get(&TaskId::from("missing")).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn subscribers_observe_every_stored_snapshot() {
        let store = StatusStore::default();
        let mut events = store.subscribe();
        let mut task = task("u1");

        store.register(task.clone());
        store.register(task.clone());
        task.mark_processing(OffsetDateTime::now_utc()).unwrap();
        store.put(task);

        assert_eq!(events.recv().await.unwrap().status, TaskStatus::Created);
        assert_eq!(events.recv().await.unwrap().status, TaskStatus::Processing);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn concurrent_writers_do_not_lose_entries() {
        let store = StatusStore::default();
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let store = store.clone();
                scope.spawn(move || {
                    for n in 0..50 {
                        store.put(task(&format!("w{worker}-{n}")));
                        let _ = store.get(&TaskId::from("w0-0_1_0"));
                    }
                });
            }
        });
        assert_eq!(store.len(), 400);
    }
}
