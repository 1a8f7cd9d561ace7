//! Result document rendering.
//!
//! Rendering is read-only: it looks up the latest stored submission, rescores
//! it against the catalogue and produces a self-contained HTML sheet. Status
//! bookkeeping happens in the caller, normally the queue worker.

mod service;
mod types;

pub use service::ResultDocumentRenderer;
pub use types::{RenderError, RenderedDocument, Renderer};
