//! Shared types for the Uplift upload queue.
//!
//! Everything here is plain data: the lifecycle status attached to each
//! file, the per-registration transport configuration, queue options, and
//! the read-only snapshots handed to observers.

pub mod constants;
pub mod types;

pub use types::{FileId, FileSnapshot, QueueOptions, QueueSummary, TransportConfig, UploadStatus};
