//! Errors from the registration layer.
//!
//! Queue operations themselves never fail; unknown or removed files are
//! silently ignored.

use crate::uploader::SourceId;

/// Errors produced while turning paths into admitted files.
#[derive(Debug, thiserror::Error)]
pub enum UploaderError {
    #[error("unknown source: {0}")]
    UnknownSource(SourceId),

    #[error("transfer error: {0}")]
    Transfer(#[from] uplift_transfer::TransferError),
}
