//! Error types for the file engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the atomic writer, the patch engine, and change sets.
///
/// The variants are distinct so callers can tell a failure that touched
/// nothing apart from one that required a rollback, and a clean rollback
/// apart from a broken one.
#[derive(Debug, Error)]
pub enum FileError {
    /// The on-disk content no longer matches the expected original.
    /// Nothing has been written.
    #[error("content mismatch for {0}: on-disk content differs from the expected original")]
    ContentMismatch(PathBuf),

    /// A path that was required to exist does not.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// A replacement failed mid-commit and every previously applied change
    /// was rolled back: pre-existing files hold their original content again
    /// and newly created files were removed.
    #[error(
        "failed to replace {path}: {source}; rolled back {restored} previously applied file(s)"
    )]
    RolledBack {
        path: PathBuf,
        restored: usize,
        #[source]
        source: io::Error,
    },

    /// A replacement failed and the rollback itself failed for at least one
    /// file. Carries the original cause and every per-file rollback cause;
    /// the filesystem may be left in a mixed state.
    #[error(
        "failed to replace {path}: {source}; rollback also failed: {}",
        describe_failures(.failures)
    )]
    RollbackFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
        failures: Vec<(PathBuf, io::Error)>,
    },

    /// An I/O failure that occurred before anything was renamed into place.
    /// The targets are untouched.
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn describe_failures(failures: &[(PathBuf, io::Error)]) -> String {
    failures
        .iter()
        .map(|(path, err)| format!("{}: {}", path.display(), err))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolled_back_message_counts_restored_files() {
        let err = FileError::RolledBack {
            path: PathBuf::from("notes/outline.md"),
            restored: 2,
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let message = err.to_string();
        assert!(message.contains("notes/outline.md"));
        assert!(message.contains("rolled back 2"));
    }

    #[test]
    fn rollback_failed_message_names_both_causes() {
        let err = FileError::RollbackFailed {
            path: PathBuf::from("b.md"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            failures: vec![(
                PathBuf::from("a.md"),
                io::Error::new(io::ErrorKind::Other, "disk full"),
            )],
        };
        let message = err.to_string();
        assert!(message.contains("denied"));
        assert!(message.contains("a.md"));
        assert!(message.contains("disk full"));
        assert!(message.contains("rollback also failed"));
    }
}
