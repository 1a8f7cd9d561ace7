//! Domain layer types and invariants.

pub mod error;
pub mod quiz;
pub mod scoring;
pub mod task;
