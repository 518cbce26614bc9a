//! Paper acquisition lifecycle.
//!
//! A `download_paper` request goes through the [`AcquisitionOrchestrator`],
//! which checks the [`PaperStore`](crate::store::PaperStore), fetches the
//! paper from its [`Source`](crate::sources::Source), registers it with the
//! [`LifecycleTracker`] and queues the document for the
//! [`ConversionWorker`]. The caller gets a status back right away and polls
//! for the rest:
//!
//! ```text
//! absent -> downloading -> converting -> success | error
//! ```

mod converter;
pub mod mock;
mod orchestrator;
mod tracker;
mod worker;

pub use converter::{ConversionError, DocumentConverter, PdfTextConverter};
pub use mock::MockConverter;
pub use orchestrator::{AcquireError, AcquisitionOptions, AcquisitionOrchestrator};
pub use tracker::{LifecycleTracker, TrackerError};
pub use worker::{ConversionHandle, ConversionJob, ConversionWorker};
