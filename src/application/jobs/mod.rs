//! Print task queue and delivery engine.

mod engine;
mod queue;
mod status;
mod worker;

pub use engine::{EngineConfig, EngineError, PrintEngine};
pub use queue::{DEFAULT_QUEUE_CAPACITY, SubmitError, TaskSubmitter};
pub use status::{DEFAULT_EVENT_CAPACITY, StatusStore};
pub use worker::ShutdownPolicy;
