//! Output device ports. Concrete backends live in `infra::printer`.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::render::RenderedDocument;

use super::error::DeliveryError;

/// Resolved default device, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub name: String,
}

impl DeviceHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Framed unit of work handed to a device session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub name: String,
    pub extension: &'static str,
    pub data: Bytes,
}

impl From<&RenderedDocument> for PrintJob {
    fn from(document: &RenderedDocument) -> Self {
        Self {
            name: document.name.clone(),
            extension: document.extension,
            data: document.bytes.clone(),
        }
    }
}

#[async_trait]
pub trait OutputDevice: Send + Sync {
    async fn resolve_default(&self) -> Result<DeviceHandle, DeliveryError>;

    async fn open(&self, handle: &DeviceHandle) -> Result<Box<dyn DeviceSession>, DeliveryError>;
}

/// An open connection to a device. `close` consumes the session; callers
/// must call it once after a successful write.
#[async_trait]
pub trait DeviceSession: Send {
    async fn write_job(&mut self, job: &PrintJob) -> Result<(), DeliveryError>;

    async fn close(self: Box<Self>) -> Result<(), DeliveryError>;
}
