//! Delivery of rendered documents to an output device.

mod client;
mod device;
mod error;
mod retry;

pub use client::{DeliveryClient, DeviceDeliveryClient};
pub use device::{DeviceHandle, DeviceSession, OutputDevice, PrintJob};
pub use error::DeliveryError;
pub use retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL, RetryPolicy, RetryingDelivery};
