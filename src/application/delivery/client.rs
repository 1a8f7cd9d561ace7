use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::application::render::RenderedDocument;

use super::{
    device::{OutputDevice, PrintJob},
    error::DeliveryError,
};

/// One delivery attempt. No retries at this level.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn attempt(&self, document: &RenderedDocument) -> Result<(), DeliveryError>;
}

/// Delivery client driving an [`OutputDevice`]: resolve, open, write, close.
pub struct DeviceDeliveryClient {
    device: Arc<dyn OutputDevice>,
    attempt_timeout: Option<Duration>,
}

impl DeviceDeliveryClient {
    pub fn new(device: Arc<dyn OutputDevice>) -> Self {
        Self {
            device,
            attempt_timeout: None,
        }
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Option<Duration>) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    async fn attempt_once(&self, document: &RenderedDocument) -> Result<(), DeliveryError> {
        let handle = self.device.resolve_default().await?;
        let mut session = self.device.open(&handle).await?;
        let job = PrintJob::from(document);

        if let Err(err) = session.write_job(&job).await {
            if let Err(close_err) = session.close().await {
                debug!(
                    target = "application::delivery::DeviceDeliveryClient",
                    device = %handle,
                    error = %close_err,
                    "closing session after failed write also failed"
                );
            }
            return Err(err);
        }

        if let Err(err) = session.close().await {
            warn!(
                target = "application::delivery::DeviceDeliveryClient",
                device = %handle,
                job = %job.name,
                error = %err,
                "job written but closing the device session failed"
            );
        }

        debug!(
            target = "application::delivery::DeviceDeliveryClient",
            device = %handle,
            job = %job.name,
            bytes = job.data.len(),
            "job written to device"
        );
        Ok(())
    }
}

#[async_trait]
impl DeliveryClient for DeviceDeliveryClient {
    async fn attempt(&self, document: &RenderedDocument) -> Result<(), DeliveryError> {
        match self.attempt_timeout {
            Some(after) => tokio::time::timeout(after, self.attempt_once(document))
                .await
                .map_err(|_| DeliveryError::Timeout { after })?,
            None => self.attempt_once(document).await,
        }
    }
}
