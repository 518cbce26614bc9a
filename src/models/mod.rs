//! Core data models for papers, searches and acquisition state.

mod lifecycle;
mod paper;
mod search;
mod status;

pub use lifecycle::{LifecycleRecord, LifecycleState};
pub use paper::{Paper, PaperBuilder};
pub use search::{SearchQuery, SearchResponse, SortBy};
pub use status::{AcquisitionStatus, StatusKind};
