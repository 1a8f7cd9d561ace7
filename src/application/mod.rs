//! Application services: the print engine and the use cases around it.

pub mod catalog;
pub mod delivery;
pub mod error;
pub mod jobs;
pub mod render;
pub mod repos;
pub mod results;
