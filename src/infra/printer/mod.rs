//! Output device backends for the print queue.

mod socket;
mod spool;

use std::sync::Arc;

pub use socket::RawSocketDevice;
pub use spool::SpoolDevice;

use crate::{application::delivery::OutputDevice, config::PrinterBackend};

pub fn build_device(backend: &PrinterBackend) -> Arc<dyn OutputDevice> {
    match backend {
        PrinterBackend::Spool { directory } => Arc::new(SpoolDevice::new(directory.clone())),
        PrinterBackend::Socket { address } => Arc::new(RawSocketDevice::new(address.clone())),
    }
}
