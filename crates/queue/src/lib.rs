//! Upload queue: decides *when* each file may transfer.
//!
//! The queue owns an ordered collection of admitted files, enforces the
//! parallel-upload bound, hands files to the transfer engine, and notifies
//! observers of every lifecycle change.
//!
//! # Layout
//!
//! - [`QueueState`]: the synchronous state machine (admission, removal,
//!   re-evaluation passes). Usable on its own with any [`Dispatch`].
//! - [`UploadQueue`]: spawns the state into a single tokio task and exposes
//!   a cloneable command handle.
//! - [`FileHandle`]: per-file start/cancel/remove capability.
//! - [`Uploader`]: registration layer binding input sources to one queue.

pub mod error;
pub mod handle;
pub mod observer;
pub mod service;
pub mod state;
pub mod uploader;

pub use error::UploaderError;
pub use handle::FileHandle;
pub use observer::{ChannelObserver, QueueEvent, QueueObserver};
pub use service::UploadQueue;
pub use state::{Dispatch, PendingFile, QueueState};
pub use uploader::{SourceId, Uploader};
