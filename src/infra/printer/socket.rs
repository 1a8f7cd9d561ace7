use async_trait::async_trait;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpStream, lookup_host},
};
use tracing::debug;

use crate::application::delivery::{
    DeliveryError, DeviceHandle, DeviceSession, OutputDevice, PrintJob,
};

/// Universal exit language sequence that starts and ends a PJL job.
const UEL: &[u8] = b"\x1b%-12345X";

/// Network printer speaking raw TCP (JetDirect, usually port 9100).
#[derive(Debug, Clone)]
pub struct RawSocketDevice {
    address: String,
}

impl RawSocketDevice {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl OutputDevice for RawSocketDevice {
    async fn resolve_default(&self) -> Result<DeviceHandle, DeliveryError> {
        let mut addrs = lookup_host(self.address.as_str()).await.map_err(|err| {
            DeliveryError::device_unavailable(format!(
                "cannot resolve printer `{}`: {err}",
                self.address
            ))
        })?;
        let addr = addrs.next().ok_or_else(|| {
            DeliveryError::device_unavailable(format!(
                "printer `{}` resolved to no addresses",
                self.address
            ))
        })?;
        Ok(DeviceHandle::new(addr.to_string()))
    }

    async fn open(&self, handle: &DeviceHandle) -> Result<Box<dyn DeviceSession>, DeliveryError> {
        let stream = TcpStream::connect(handle.name.as_str())
            .await
            .map_err(|err| {
                DeliveryError::device_unavailable(format!("cannot connect to `{handle}`: {err}"))
            })?;
        Ok(Box::new(SocketSession { stream }))
    }
}

struct SocketSession {
    stream: TcpStream,
}

/// Frames `job` as a PJL job: UEL, `JOB NAME`, raw data, UEL, `EOJ`, UEL.
pub(crate) fn frame_job(job: &PrintJob) -> Vec<u8> {
    let name = job.name.replace(['"', '\r', '\n'], "_");
    let mut framed = Vec::with_capacity(job.data.len() + 2 * name.len() + 64);
    framed.extend_from_slice(UEL);
    framed.extend_from_slice(format!("@PJL JOB NAME=\"{name}\"\r\n").as_bytes());
    framed.extend_from_slice(&job.data);
    framed.extend_from_slice(UEL);
    framed.extend_from_slice(format!("@PJL EOJ NAME=\"{name}\"\r\n").as_bytes());
    framed.extend_from_slice(UEL);
    framed
}

#[async_trait]
impl DeviceSession for SocketSession {
    async fn write_job(&mut self, job: &PrintJob) -> Result<(), DeliveryError> {
        let framed = frame_job(job);
        self.stream
            .write_all(&framed)
            .await
            .map_err(|err| DeliveryError::write(err.to_string()))?;
        self.stream
            .flush()
            .await
            .map_err(|err| DeliveryError::write(err.to_string()))?;

        debug!(
            target = "infra::printer::RawSocketDevice",
            job = %job.name,
            bytes = framed.len(),
            "job streamed to printer"
        );
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<(), DeliveryError> {
        self.stream
            .shutdown()
            .await
            .map_err(|err| DeliveryError::write(format!("shutdown failed: {err}")))
    }
}
