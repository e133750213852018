//! Expands command-line paths into the list of files to upload.
//!
//! Directories are walked recursively; entries are sorted by path so the
//! admission order is stable across runs.

use std::path::{Path, PathBuf};

/// Expands `paths`, keeping plain files as given and replacing every
/// directory with the regular files beneath it.
pub fn expand_paths(paths: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let metadata = std::fs::metadata(path)?;
        if metadata.is_dir() {
            walk_dir(path, &mut files)?;
        } else {
            // Non-regular files are left for the uploader to reject.
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn walk_dir(current: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = std::fs::read_dir(current)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk_dir(&path, files)?;
        } else if metadata.is_file() {
            files.push(path);
        }
    }

    Ok(())
}
