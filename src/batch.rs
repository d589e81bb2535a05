//! All-or-nothing multi-file changes.
//!
//! A [`ChangeSet`] collects per-file edits (expected old content, new
//! content) and applies them as one transaction: every change lands, or
//! none do. Targets are verified against their expected content before the
//! first byte is written, replacements go through same-directory temp
//! files, and a failure mid-commit rolls already-replaced files back from
//! the in-memory originals.

use std::collections::BTreeSet;
use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::atomic;
use crate::diff::{self, Patch};
use crate::error::FileError;

/// One pending edit: replace `old_content` with `new_content` at `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileChange {
    pub path: PathBuf,
    pub old_content: String,
    pub new_content: String,
}

impl FileChange {
    /// True when this change creates a file rather than editing one.
    pub fn is_new_file(&self) -> bool {
        self.old_content.is_empty()
    }

    /// True when old and new content differ.
    pub fn has_changes(&self) -> bool {
        self.old_content != self.new_content
    }
}

/// An ordered set of file changes applied all-or-nothing, in insertion
/// order.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<FileChange>,
}

/// A change staged as a written-but-unrenamed temp file.
struct Staged<'a> {
    change: &'a FileChange,
    temp: NamedTempFile,
    perms: Option<Permissions>,
}

/// A change whose rename has already landed.
struct Applied<'a> {
    change: &'a FileChange,
    existed: bool,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a change. No-ops (`old == new`) are silently skipped.
    pub fn add(&mut self, path: impl Into<PathBuf>, old_content: &str, new_content: &str) {
        if old_content == new_content {
            return;
        }
        self.changes.push(FileChange {
            path: path.into(),
            old_content: old_content.to_string(),
            new_content: new_content.to_string(),
        });
    }

    /// Queue the creation of a file that does not exist yet.
    pub fn add_new_file(&mut self, path: impl Into<PathBuf>, content: &str) {
        self.add(path, "", content);
    }

    /// Queue an edit to an existing file, reading its current content as
    /// the expected original.
    pub fn add_existing_file(
        &mut self,
        path: impl Into<PathBuf>,
        new_content: &str,
    ) -> Result<(), FileError> {
        let path = path.into();
        let old_content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FileError::NotFound(path))
            }
            Err(e) => return Err(e.into()),
        };
        self.add(path, &old_content, new_content);
        Ok(())
    }

    /// Build a set from `(relative path, new content)` pairs rooted at
    /// `base`. Existing files contribute their current content as the
    /// expected original; missing files become new-file changes.
    pub fn from_contents<I, P>(base: &Path, files: I) -> Result<Self, FileError>
    where
        I: IntoIterator<Item = (P, String)>,
        P: AsRef<Path>,
    {
        let mut set = Self::new();
        for (rel, new_content) in files {
            let path = base.join(rel.as_ref());
            let old_content = read_if_file(&path)?.unwrap_or_default();
            set.add(path, &old_content, &new_content);
        }
        Ok(set)
    }

    pub fn changes(&self) -> &[FileChange] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Render a labelled diff block per file, or `"No changes to preview."`
    /// when there is nothing to show.
    pub fn preview(&self, context_lines: usize) -> String {
        let mut blocks: Vec<String> = Vec::new();
        for change in &self.changes {
            let from = format!("{} (current)", change.path.display());
            let to = format!("{} (proposed)", change.path.display());
            let rendered = diff::diff_preview(
                &change.old_content,
                &change.new_content,
                context_lines,
                &from,
                &to,
            );
            if rendered == diff::NO_CHANGES {
                continue;
            }

            let separator = "=".repeat(60);
            blocks.push(separator.clone());
            blocks.push(format!("File: {}", change.path.display()));
            if change.is_new_file() {
                blocks.push("(new file)".to_string());
            }
            blocks.push(separator);
            blocks.push(rendered);
        }

        if blocks.is_empty() {
            return "No changes to preview.".to_string();
        }
        blocks.join("\n")
    }

    /// Apply every change, or none.
    ///
    /// The transaction runs in phases: verify every target against its
    /// expected old content (failing before anything is written), stage
    /// every replacement as a fsynced temp file next to its target, then
    /// rename into place in insertion order. A failure after the first
    /// rename rolls the already-applied changes back from memory. On
    /// success each distinct parent directory is fsynced once and the
    /// computed patches are returned in order.
    pub fn apply(&self) -> Result<Vec<Patch>, FileError> {
        if self.changes.is_empty() {
            return Ok(Vec::new());
        }

        for change in &self.changes {
            if let Some(current) = read_if_file(&change.path)? {
                if current != change.old_content {
                    return Err(FileError::ContentMismatch(change.path.clone()));
                }
            }
        }

        debug!(files = self.changes.len(), "staging change set");

        // NamedTempFile removes itself on drop, so every early return below
        // leaves no stray temp files behind.
        let mut staged: Vec<Staged<'_>> = Vec::with_capacity(self.changes.len());
        for change in &self.changes {
            let dir = atomic::parent_dir(&change.path);
            fs::create_dir_all(&dir)?;
            let perms = atomic::existing_permissions(&change.path)?;
            let mut temp = Builder::new().suffix(".tmp").tempfile_in(&dir)?;
            temp.write_all(change.new_content.as_bytes())?;
            temp.as_file().sync_all()?;
            staged.push(Staged {
                change,
                temp,
                perms,
            });
        }

        let mut applied: Vec<Applied<'_>> = Vec::with_capacity(staged.len());
        let mut pending = staged.into_iter();
        while let Some(Staged {
            change,
            temp,
            perms,
        }) = pending.next()
        {
            let existed = perms.is_some();
            if let Some(perms) = perms {
                if let Err(e) = temp.as_file().set_permissions(perms) {
                    drop(temp);
                    drop(pending);
                    return Err(self.rollback(&applied, &change.path, e));
                }
            }
            if let Err(persist_err) = temp.persist(&change.path) {
                let cause = persist_err.error;
                drop(persist_err.file);
                drop(pending);
                return Err(self.rollback(&applied, &change.path, cause));
            }
            applied.push(Applied { change, existed });
        }

        // The batch landed; make the renames durable.
        let dirs: BTreeSet<PathBuf> = self
            .changes
            .iter()
            .map(|c| atomic::parent_dir(&c.path))
            .collect();
        for dir in &dirs {
            atomic::sync_dir(dir);
        }

        Ok(self
            .changes
            .iter()
            .map(|c| diff::compute_patch(&c.old_content, &c.new_content))
            .collect())
    }

    /// Undo already-renamed changes after a failure at `failed`.
    ///
    /// Pre-existing files are rewritten atomically from their in-memory
    /// original content; files the batch created are removed. Returns the
    /// error describing the failure, folding in rollback problems if any.
    fn rollback(&self, applied: &[Applied<'_>], failed: &Path, cause: io::Error) -> FileError {
        if !applied.is_empty() {
            warn!(
                failed = %failed.display(),
                applied = applied.len(),
                "change set failed mid-commit, rolling back"
            );
        }

        let mut failures: Vec<(PathBuf, io::Error)> = Vec::new();
        for entry in applied {
            let change = entry.change;
            let result = if entry.existed {
                atomic::write_text(&change.path, &change.old_content).map_err(io_cause)
            } else {
                fs::remove_file(&change.path)
            };
            if let Err(e) = result {
                failures.push((change.path.clone(), e));
            }
        }

        if failures.is_empty() {
            FileError::RolledBack {
                path: failed.to_path_buf(),
                restored: applied.len(),
                source: cause,
            }
        } else {
            FileError::RollbackFailed {
                path: failed.to_path_buf(),
                source: cause,
                failures,
            }
        }
    }
}

/// Current content of `path` when it exists as a regular file.
fn read_if_file(path: &Path) -> Result<Option<String>, FileError> {
    if !path.is_file() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(path)?))
}

fn io_cause(err: FileError) -> io::Error {
    match err {
        FileError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn count_temp_files(dir: &Path) -> usize {
        let mut count = 0;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                count += count_temp_files(&path);
            } else if path.extension().is_some_and(|ext| ext == "tmp") {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn add_skips_noops() {
        let mut set = ChangeSet::new();
        set.add("a.md", "same", "same");
        assert!(set.is_empty());

        set.add("a.md", "old", "new");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn add_new_file_is_marked_new() {
        let mut set = ChangeSet::new();
        set.add_new_file("fresh.md", "content");
        assert!(set.changes()[0].is_new_file());
        assert!(set.changes()[0].has_changes());
    }

    #[test]
    fn add_existing_file_reads_current_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("note.md");
        fs::write(&path, "current").unwrap();

        let mut set = ChangeSet::new();
        set.add_existing_file(&path, "revised").unwrap();
        assert_eq!(set.changes()[0].old_content, "current");
        assert!(!set.changes()[0].is_new_file());
    }

    #[test]
    fn add_existing_file_missing_errors() {
        let tmp = TempDir::new().unwrap();
        let mut set = ChangeSet::new();
        let err = set
            .add_existing_file(tmp.path().join("absent.md"), "text")
            .unwrap_err();
        assert!(matches!(err, FileError::NotFound(_)));
        assert!(set.is_empty());
    }

    #[test]
    fn preview_renders_blocks_and_markers() {
        let mut set = ChangeSet::new();
        set.add("doc.md", "old1\nshared\n", "new1\nshared\n");
        set.add_new_file("fresh.md", "hello\n");

        let preview = set.preview(3);
        assert!(preview.contains(&"=".repeat(60)));
        assert!(preview.contains("File: doc.md"));
        assert!(preview.contains("-old1"));
        assert!(preview.contains("+new1"));
        assert!(preview.contains("File: fresh.md"));
        assert!(preview.contains("(new file)"));
        assert!(preview.contains("doc.md (current)"));
        assert!(preview.contains("doc.md (proposed)"));
    }

    #[test]
    fn preview_of_empty_set() {
        let set = ChangeSet::new();
        assert_eq!(set.preview(3), "No changes to preview.");
    }

    #[test]
    fn apply_empty_set_returns_no_patches() {
        let set = ChangeSet::new();
        let patches = set.apply().unwrap();
        assert!(patches.is_empty());
    }

    #[test]
    fn apply_modifies_and_creates_in_order() {
        let tmp = TempDir::new().unwrap();
        let existing = tmp.path().join("outline.md");
        fs::write(&existing, "v1\n").unwrap();
        let nested = tmp.path().join("elements").join("design.md");

        let mut set = ChangeSet::new();
        set.add(&existing, "v1\n", "v2\n");
        set.add_new_file(&nested, "design notes\n");

        let patches = set.apply().unwrap();
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].modified, "v2\n");
        assert_eq!(patches[1].modified, "design notes\n");
        assert_eq!(fs::read_to_string(&existing).unwrap(), "v2\n");
        assert_eq!(fs::read_to_string(&nested).unwrap(), "design notes\n");
        assert_eq!(count_temp_files(tmp.path()), 0);
    }

    #[test]
    fn apply_fails_on_stale_content_before_writing() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first.md");
        let second = tmp.path().join("second.md");
        fs::write(&first, "first v1\n").unwrap();
        fs::write(&second, "changed externally\n").unwrap();

        let mut set = ChangeSet::new();
        set.add(&first, "first v1\n", "first v2\n");
        set.add(&second, "second v1\n", "second v2\n");

        let err = set.apply().unwrap_err();
        assert!(matches!(err, FileError::ContentMismatch(ref p) if p == &second));
        // Verification failed before anything was staged or renamed.
        assert_eq!(fs::read_to_string(&first).unwrap(), "first v1\n");
        assert_eq!(
            fs::read_to_string(&second).unwrap(),
            "changed externally\n"
        );
        assert_eq!(count_temp_files(tmp.path()), 0);
    }

    #[test]
    fn failed_commit_restores_modified_files() {
        let tmp = TempDir::new().unwrap();
        let file1 = tmp.path().join("file1.txt");
        fs::write(&file1, "A").unwrap();
        // A directory at file2's target makes its rename fail after file1
        // has already been replaced.
        let file2 = tmp.path().join("file2.txt");
        fs::create_dir(&file2).unwrap();

        let mut set = ChangeSet::new();
        set.add(&file1, "A", "B");
        set.add_new_file(&file2, "C");

        let err = set.apply().unwrap_err();
        assert!(
            matches!(err, FileError::RolledBack { restored: 1, .. }),
            "expected a rolled-back error, got: {err}"
        );
        assert!(err.to_string().contains("rolled back 1"));
        assert_eq!(fs::read_to_string(&file1).unwrap(), "A");
        assert!(!file2.is_file());
        assert_eq!(count_temp_files(tmp.path()), 0);
    }

    #[test]
    fn failed_commit_removes_created_files() {
        let tmp = TempDir::new().unwrap();
        let created = tmp.path().join("created.md");
        let blocked = tmp.path().join("blocked.md");
        fs::create_dir(&blocked).unwrap();

        let mut set = ChangeSet::new();
        set.add_new_file(&created, "fresh content\n");
        set.add_new_file(&blocked, "never lands\n");

        let err = set.apply().unwrap_err();
        assert!(matches!(err, FileError::RolledBack { restored: 1, .. }));
        assert!(!created.exists());
        assert_eq!(count_temp_files(tmp.path()), 0);
    }

    #[test]
    fn staging_failure_leaves_targets_untouched() {
        let tmp = TempDir::new().unwrap();
        let file1 = tmp.path().join("file1.md");
        fs::write(&file1, "keep me\n").unwrap();
        // file2's parent path is a regular file, so creating the staging
        // directory fails before any rename happens.
        let obstruction = tmp.path().join("sub");
        fs::write(&obstruction, "not a directory").unwrap();
        let file2 = obstruction.join("file2.md");

        let mut set = ChangeSet::new();
        set.add(&file1, "keep me\n", "replaced\n");
        set.add_new_file(&file2, "never staged\n");

        let err = set.apply().unwrap_err();
        assert!(matches!(err, FileError::Io(_)));
        assert_eq!(fs::read_to_string(&file1).unwrap(), "keep me\n");
        assert_eq!(count_temp_files(tmp.path()), 0);
    }

    #[cfg(unix)]
    #[test]
    fn apply_preserves_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mode.md");
        fs::write(&path, "old\n").unwrap();
        fs::set_permissions(&path, Permissions::from_mode(0o644)).unwrap();

        let mut set = ChangeSet::new();
        set.add(&path, "old\n", "new\n");
        set.apply().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn from_contents_reads_existing_and_skips_noops() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("same.md"), "unchanged\n").unwrap();
        fs::write(tmp.path().join("stale.md"), "old\n").unwrap();

        let set = ChangeSet::from_contents(
            tmp.path(),
            vec![
                ("same.md".to_string(), "unchanged\n".to_string()),
                ("stale.md".to_string(), "new\n".to_string()),
                ("fresh.md".to_string(), "created\n".to_string()),
            ],
        )
        .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.changes()[0].old_content, "old\n");
        assert!(set.changes()[1].is_new_file());
    }

    #[test]
    fn clear_empties_the_set() {
        let mut set = ChangeSet::new();
        set.add("a.md", "old", "new");
        set.clear();
        assert!(set.is_empty());
    }
}
