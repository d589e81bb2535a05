//! Atomic file replacement.
//!
//! Content goes to a temporary file in the target's own directory, is
//! flushed and fsynced, then renamed over the target. A reader never
//! observes a half-written file, and a failed write leaves the target
//! untouched with no temp file behind.

use std::fs::{self, File, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;

use crate::error::FileError;

/// Atomically replace `path` with `text`, preserving the permission bits of
/// an existing target. Parent directories are created as needed.
pub fn write_text(path: &Path, text: &str) -> Result<(), FileError> {
    let perms = existing_permissions(path)?;
    write_text_with_permissions(path, text, perms)
}

/// Atomically replace `path` with `text`, applying `perms` to the new file.
///
/// With `None` the file keeps the restrictive mode of a fresh temp file.
pub fn write_text_with_permissions(
    path: &Path,
    text: &str,
    perms: Option<Permissions>,
) -> Result<(), FileError> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir)?;

    // The temp file lives next to the target so the rename below stays on
    // one filesystem. Dropping it (on any failure path) removes it.
    let mut temp = Builder::new().suffix(".tmp").tempfile_in(&dir)?;
    temp.write_all(text.as_bytes())?;
    temp.as_file().sync_all()?;

    if let Some(perms) = perms {
        temp.as_file().set_permissions(perms)?;
    }

    temp.persist(path).map_err(|e| FileError::Io(e.error))?;
    sync_dir(&dir);
    Ok(())
}

/// Permission bits of `path`, or `None` when it does not exist.
pub fn existing_permissions(path: &Path) -> Result<Option<Permissions>, FileError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.permissions())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parent directory of `path`, treating a bare filename as the current dir.
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Best-effort fsync of a directory so a completed rename is durable.
/// Directory fsync is not supported everywhere, so failures are ignored.
pub(crate) fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}
