use std::path::{Path, PathBuf};

use crate::TransferError;

/// A local file to upload. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// Location on disk; read when the transfer starts.
    pub path: PathBuf,
    /// File name sent in the multipart part.
    pub name: String,
    /// Size in bytes at the time the payload was captured.
    pub size: u64,
}

impl FilePayload {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
        }
    }

    /// Captures a payload from a path on disk.
    ///
    /// Fails if the path does not exist or is not a regular file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TransferError::NotAFile(path.to_path_buf()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Ok(Self::new(path, name, metadata.len()))
    }
}
