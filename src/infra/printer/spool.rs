use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::delivery::{
    DeliveryError, DeviceHandle, DeviceSession, OutputDevice, PrintJob,
};

/// Treats a directory as the default printer. Each job becomes one file,
/// `<job-name>-<uuid>.<ext>`, that appears atomically.
#[derive(Debug, Clone)]
pub struct SpoolDevice {
    directory: PathBuf,
}

impl SpoolDevice {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl OutputDevice for SpoolDevice {
    async fn resolve_default(&self) -> Result<DeviceHandle, DeliveryError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|err| {
                DeliveryError::device_unavailable(format!(
                    "spool directory `{}` unusable: {err}",
                    self.directory.display()
                ))
            })?;
        Ok(DeviceHandle::new(self.directory.display().to_string()))
    }

    async fn open(&self, handle: &DeviceHandle) -> Result<Box<dyn DeviceSession>, DeliveryError> {
        let metadata = tokio::fs::metadata(&self.directory).await.map_err(|err| {
            DeliveryError::device_unavailable(format!("spool `{handle}` vanished: {err}"))
        })?;
        if !metadata.is_dir() {
            return Err(DeliveryError::device_unavailable(format!(
                "spool `{handle}` is not a directory"
            )));
        }
        Ok(Box::new(SpoolSession {
            directory: self.directory.clone(),
            staged: None,
        }))
    }
}

struct SpoolSession {
    directory: PathBuf,
    /// Staging file that has not been committed yet.
    staged: Option<PathBuf>,
}

#[async_trait]
impl DeviceSession for SpoolSession {
    async fn write_job(&mut self, job: &PrintJob) -> Result<(), DeliveryError> {
        let file_name = format!("{}-{}.{}", job.name, Uuid::new_v4(), job.extension);
        let target = self.directory.join(&file_name);
        let staging = self.directory.join(format!(".{file_name}.part"));

        self.staged = Some(staging.clone());
        tokio::fs::write(&staging, &job.data)
            .await
            .map_err(|err| DeliveryError::write(format!("{}: {err}", staging.display())))?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|err| DeliveryError::write(format!("{}: {err}", target.display())))?;
        self.staged = None;

        debug!(
            target = "infra::printer::SpoolDevice",
            path = %target.display(),
            bytes = job.data.len(),
            "job spooled"
        );
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DeliveryError> {
        if let Some(staging) = self.staged {
            if let Err(err) = tokio::fs::remove_file(&staging).await {
                warn!(
                    target = "infra::printer::SpoolDevice",
                    path = %staging.display(),
                    error = %err,
                    "failed to remove partial spool file"
                );
            }
        }
        Ok(())
    }
}
