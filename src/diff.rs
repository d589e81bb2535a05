//! Text diffing between document versions.
//!
//! Wraps `similar` to compute unified diffs, render labelled previews, and
//! judge no-ops so callers can skip writes that would change nothing.

use std::fs;
use std::io;
use std::path::Path;

use similar::TextDiff;

use crate::atomic;
use crate::error::FileError;

/// Unchanged context lines shown around each hunk by default.
pub const DEFAULT_CONTEXT: usize = 3;

/// Rendered in place of a preview when the two versions are equal.
pub const NO_CHANGES: &str = "No changes detected.";

/// A computed change between two versions of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub original: String,
    pub modified: String,
    /// Unified diff hunk lines of `original` → `modified`; empty when equal.
    pub diff_lines: Vec<String>,
}

impl Patch {
    /// True when applying this patch would not change the document.
    pub fn is_unchanged(&self) -> bool {
        self.original == self.modified || self.diff_lines.is_empty()
    }
}

/// Compute the unified diff between two versions with default context.
pub fn compute_patch(original: &str, modified: &str) -> Patch {
    let diff = TextDiff::from_lines(original, modified);
    let unified = diff
        .unified_diff()
        .context_radius(DEFAULT_CONTEXT)
        .to_string();

    Patch {
        original: original.to_string(),
        modified: modified.to_string(),
        diff_lines: unified.lines().map(str::to_string).collect(),
    }
}

/// Render a labelled unified diff, or [`NO_CHANGES`] when the versions are
/// equal.
pub fn diff_preview(
    original: &str,
    modified: &str,
    context_lines: usize,
    from_label: &str,
    to_label: &str,
) -> String {
    if original == modified {
        return NO_CHANGES.to_string();
    }

    let diff = TextDiff::from_lines(original, modified);
    let rendered = diff
        .unified_diff()
        .context_radius(context_lines)
        .header(from_label, to_label)
        .to_string();

    if rendered.is_empty() {
        return NO_CHANGES.to_string();
    }
    rendered.trim_end_matches('\n').to_string()
}

/// Atomically write the patched content to `path`.
pub fn apply_patch(path: &Path, patch: &Patch) -> Result<(), FileError> {
    atomic::write_text(path, &patch.modified)
}

/// Verify, diff, and write in one step.
///
/// Confirms the on-disk content still equals `original` (a missing file
/// verifies against the empty string), then writes `modified` atomically.
/// Returns `None` without touching the file when the versions are equal.
pub fn apply_patch_checked(
    path: &Path,
    original: &str,
    modified: &str,
) -> Result<Option<Patch>, FileError> {
    let current = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if current != original {
        return Err(FileError::ContentMismatch(path.to_path_buf()));
    }

    let patch = compute_patch(original, modified);
    if patch.is_unchanged() {
        return Ok(None);
    }
    apply_patch(path, &patch)?;
    Ok(Some(patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn equal_content_has_empty_diff() {
        let patch = compute_patch("line 1\nline 2\n", "line 1\nline 2\n");
        assert!(patch.diff_lines.is_empty());
        assert!(patch.is_unchanged());
    }

    #[test]
    fn changed_content_produces_hunk_lines() {
        let patch = compute_patch("line 1\nold line\nline 3\n", "line 1\nnew line\nline 3\n");
        assert!(!patch.is_unchanged());
        assert!(patch.diff_lines.iter().any(|l| l == "-old line"));
        assert!(patch.diff_lines.iter().any(|l| l == "+new line"));
        assert!(patch.diff_lines.iter().any(|l| l.starts_with("@@")));
    }

    #[test]
    fn preview_carries_labels_and_markers() {
        let preview = diff_preview(
            "old1\nshared\n",
            "new1\nshared\n",
            3,
            "notes.md (current)",
            "notes.md (proposed)",
        );
        assert!(preview.contains("--- notes.md (current)"));
        assert!(preview.contains("+++ notes.md (proposed)"));
        assert!(preview.contains("-old1"));
        assert!(preview.contains("+new1"));
    }

    #[test]
    fn preview_of_equal_content_reports_no_changes() {
        let preview = diff_preview("same\n", "same\n", 3, "a", "b");
        assert_eq!(preview, NO_CHANGES);
    }

    #[test]
    fn context_radius_limits_surrounding_lines() {
        let original: String = (1..=20).map(|i| format!("line {i}\n")).collect();
        let modified = original.replace("line 10", "line ten");

        let narrow = diff_preview(&original, &modified, 1, "a", "b");
        let wide = diff_preview(&original, &modified, 5, "a", "b");
        assert!(narrow.lines().count() < wide.lines().count());
        assert!(!narrow.contains("line 3"));
        assert!(wide.contains("line 7"));
    }

    #[test]
    fn apply_patch_checked_skips_noop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("note.md");
        std::fs::write(&path, "same\n").unwrap();

        let result = apply_patch_checked(&path, "same\n", "same\n").unwrap();
        assert!(result.is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "same\n");
    }

    #[test]
    fn apply_patch_checked_rejects_stale_original() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("note.md");
        std::fs::write(&path, "actual\n").unwrap();

        let err = apply_patch_checked(&path, "expected\n", "new\n").unwrap_err();
        assert!(matches!(err, FileError::ContentMismatch(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "actual\n");
    }

    #[test]
    fn apply_patch_checked_writes_and_returns_patch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("note.md");
        std::fs::write(&path, "old\n").unwrap();

        let patch = apply_patch_checked(&path, "old\n", "new\n").unwrap().unwrap();
        assert!(!patch.is_unchanged());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn apply_patch_checked_treats_missing_file_as_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fresh.md");

        let patch = apply_patch_checked(&path, "", "content\n").unwrap();
        assert!(patch.is_some());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "content\n");
    }
}
