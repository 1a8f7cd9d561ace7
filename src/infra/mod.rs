//! Infrastructure adapters and runtime bootstrap.

pub mod catalog;
pub mod error;
pub mod http;
pub mod printer;
pub mod shutdown;
pub mod submissions;
pub mod telemetry;
