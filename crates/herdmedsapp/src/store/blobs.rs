//! # Blob Store
//!
//! Owns the managed image directory. Picked images are copied in once, at
//! save time, under a fresh name:
//!
//! ```text
//! {prefix}_{epoch-ms}_{random9}.{ext}
//! ```
//!
//! Nothing outside the directory is ever deleted: `remove` on a foreign path
//! is a successful no-op, and `exists` reports false for it.
//!
//! Batch operations (`remove_all`, `cleanup_orphans`, `migrate`) are best
//! effort. A failing item is logged and skipped; the rest of the batch runs.

use crate::clock::Clock;
use crate::error::{HerdError, Result};
use crate::model::PermanentRef;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct BlobStore {
    dir: PathBuf,
    prefix: String,
    default_ext: String,
    clock: Arc<dyn Clock>,
}

impl BlobStore {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "medicine".to_string(),
            default_ext: "jpg".to_string(),
            clock,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_default_ext(mut self, ext: &str) -> Self {
        self.default_ext = ext.trim_start_matches('.').to_string();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_directory(&self) -> Result<()> {
        if !self.dir.is_dir() {
            fs::create_dir_all(&self.dir).map_err(|e| {
                HerdError::StorageUnavailable(format!(
                    "Cannot create image directory {}: {}",
                    self.dir.display(),
                    e
                ))
            })?;
            info!(dir = %self.dir.display(), "created image directory");
        }
        Ok(())
    }

    /// True if `path` names a file directly inside the managed directory.
    pub fn is_managed(&self, path: &Path) -> bool {
        let visible = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| !n.starts_with('.'));
        visible && path.parent() == Some(self.dir.as_path())
    }

    fn generate_filename(&self, source: &Path) -> String {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(self.default_ext.as_str())
            .to_lowercase();
        let random = Uuid::new_v4().simple().to_string();
        format!(
            "{}_{}_{}.{}",
            self.prefix,
            self.clock.now().timestamp_millis(),
            &random[..9],
            ext
        )
    }

    /// Copy a transient file into the managed directory.
    ///
    /// The source is left untouched.
    pub fn persist(&self, temp: &Path) -> Result<PermanentRef> {
        let bytes = fs::read(temp).map_err(|source| HerdError::SourceUnreadable {
            path: temp.to_path_buf(),
            source,
        })?;
        self.ensure_directory()?;

        let filename = self.generate_filename(temp);
        let target = self.dir.join(&filename);

        // Atomic write; a leftover .tmp is an orphan and gets cleaned up later.
        let tmp = self.dir.join(format!(".{}.tmp", filename));
        let written = fs::write(&tmp, &bytes).and_then(|_| fs::rename(&tmp, &target));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(HerdError::StorageUnavailable(format!(
                "Cannot write {}: {}",
                target.display(),
                e
            )));
        }

        debug!(file = %filename, "image saved permanently");
        Ok(PermanentRef::new(target))
    }

    /// Sequential [`persist`](Self::persist). Already copied files are not
    /// rolled back when a later one fails; the caller decides.
    pub fn persist_all(&self, temps: &[PathBuf]) -> Vec<Result<PermanentRef>> {
        temps.iter().map(|t| self.persist(t)).collect()
    }

    /// Delete a managed file. Returns whether a file was actually removed.
    pub fn remove(&self, path: &Path) -> Result<bool> {
        if !self.is_managed(path) {
            debug!(path = %path.display(), "skipping delete, not a managed image");
            return Ok(false);
        }
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "deleted image");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "image already gone");
                Ok(false)
            }
            Err(e) => Err(HerdError::StorageUnavailable(format!(
                "Cannot delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Best-effort delete of several refs. Returns how many files were removed.
    pub fn remove_all(&self, refs: &[PermanentRef]) -> usize {
        let mut removed = 0;
        for r in refs {
            match self.remove(r.path()) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %r, error = %e, "failed to delete image"),
            }
        }
        removed
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.is_managed(path) && path.is_file()
    }

    pub fn read(&self, r: &PermanentRef) -> Result<Vec<u8>> {
        fs::read(r.path()).map_err(|source| HerdError::SourceUnreadable {
            path: r.path().to_path_buf(),
            source,
        })
    }

    /// Names of every file physically present in the directory.
    pub fn list_files(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            HerdError::StorageUnavailable(format!("{}: {}", self.dir.display(), e))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete every file whose name is not in `referenced`.
    ///
    /// `referenced` must be the complete set from every surviving record:
    /// anything missing from it is deleted.
    pub fn cleanup_orphans(&self, referenced: &HashSet<String>) -> Result<usize> {
        self.ensure_directory()?;

        let mut deleted = 0;
        for name in self.list_files()? {
            if referenced.contains(&name) {
                continue;
            }
            match fs::remove_file(self.dir.join(&name)) {
                Ok(()) => {
                    deleted += 1;
                    debug!(file = %name, "deleted orphaned image");
                }
                Err(e) => warn!(file = %name, error = %e, "failed to delete orphaned image"),
            }
        }

        info!(deleted, "orphan cleanup complete");
        Ok(deleted)
    }

    /// Re-home references that may live outside the managed directory.
    ///
    /// Managed files that still exist are kept as they are. Anything else is
    /// copied in; unreadable refs are dropped with a warning.
    pub fn migrate(&self, old: &[PathBuf]) -> Vec<PermanentRef> {
        let mut migrated = Vec::with_capacity(old.len());
        for path in old {
            if self.exists(path) {
                migrated.push(PermanentRef::new(path.clone()));
                continue;
            }
            match self.persist(path) {
                Ok(r) => migrated.push(r),
                Err(e) => warn!(path = %path.display(), error = %e, "could not migrate image"),
            }
        }
        migrated
    }
}

/// Filenames of a set of refs, as used by [`BlobStore::cleanup_orphans`].
pub fn referenced_names<'a>(refs: impl IntoIterator<Item = &'a PermanentRef>) -> HashSet<String> {
    refs.into_iter()
        .filter_map(|r| r.file_name().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use tempfile::TempDir;

    fn setup() -> (TempDir, BlobStore) {
        let dir = TempDir::new().unwrap();
        let blobs = BlobStore::new(dir.path().join("medicine_images"), Arc::new(SystemClock));
        (dir, blobs)
    }

    fn write_source(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn ensure_directory_is_idempotent() {
        let (_dir, blobs) = setup();
        blobs.ensure_directory().unwrap();
        blobs.ensure_directory().unwrap();
        assert!(blobs.dir().is_dir());
    }

    #[test]
    fn ensure_directory_reports_storage_unavailable() {
        let dir = TempDir::new().unwrap();
        let blocker = write_source(&dir, "not_a_dir", b"");
        let blobs = BlobStore::new(blocker.join("medicine_images"), Arc::new(SystemClock));

        let err = blobs.ensure_directory().unwrap_err();
        assert!(matches!(err, HerdError::StorageUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn persist_copies_bytes_under_generated_name() {
        let (dir, blobs) = setup();
        let source = write_source(&dir, "picked.PNG", b"\x89PNG fake");

        let r = blobs.persist(&source).unwrap();

        assert!(blobs.exists(r.path()));
        assert_eq!(fs::read(r.path()).unwrap(), b"\x89PNG fake");
        assert!(source.exists(), "source must not be consumed");

        let name = r.file_name().unwrap();
        let parts: Vec<&str> = name.trim_end_matches(".png").split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "medicine");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn persist_defaults_extension() {
        let (dir, blobs) = setup();
        let source = write_source(&dir, "no_extension", b"data");
        let r = blobs.persist(&source).unwrap();
        assert!(r.file_name().unwrap().ends_with(".jpg"));
    }

    #[test]
    fn persist_missing_source_is_source_unreadable() {
        let (dir, blobs) = setup();
        let err = blobs.persist(&dir.path().join("gone.jpg")).unwrap_err();
        assert!(matches!(err, HerdError::SourceUnreadable { .. }));
    }

    #[test]
    fn persist_all_keeps_order_and_reports_each_failure() {
        let (dir, blobs) = setup();
        let a = write_source(&dir, "a.jpg", b"a");
        let b = write_source(&dir, "b.jpg", b"b");
        let results = blobs.persist_all(&[a, dir.path().join("missing.jpg"), b]);

        assert_eq!(results.len(), 3);
        assert_eq!(fs::read(results[0].as_ref().unwrap().path()).unwrap(), b"a");
        assert!(results[1].is_err());
        assert_eq!(fs::read(results[2].as_ref().unwrap().path()).unwrap(), b"b");
    }

    #[test]
    fn remove_outside_namespace_is_noop() {
        let (dir, blobs) = setup();
        let outside = write_source(&dir, "outside.jpg", b"keep me");

        assert!(!blobs.remove(&outside).unwrap());
        assert!(outside.exists());
        assert!(!blobs.exists(&outside));
    }

    #[test]
    fn remove_is_idempotent() {
        let (dir, blobs) = setup();
        let r = blobs.persist(&write_source(&dir, "a.jpg", b"a")).unwrap();

        assert!(blobs.remove(r.path()).unwrap());
        assert!(!blobs.remove(r.path()).unwrap());
        assert!(!blobs.exists(r.path()));
    }

    #[test]
    fn cleanup_orphans_keeps_referenced_and_is_idempotent() {
        let (dir, blobs) = setup();
        let keep = blobs.persist(&write_source(&dir, "a.jpg", b"a")).unwrap();
        let orphan = blobs.persist(&write_source(&dir, "b.jpg", b"b")).unwrap();
        let referenced = referenced_names([&keep]);

        assert_eq!(blobs.cleanup_orphans(&referenced).unwrap(), 1);
        assert_eq!(blobs.cleanup_orphans(&referenced).unwrap(), 0);
        assert!(blobs.exists(keep.path()));
        assert!(!orphan.path().exists());
    }

    #[test]
    fn cleanup_orphans_on_missing_directory_creates_it() {
        let (_dir, blobs) = setup();
        assert_eq!(blobs.cleanup_orphans(&HashSet::new()).unwrap(), 0);
        assert!(blobs.dir().is_dir());
    }

    #[test]
    fn migrate_rehomes_foreign_refs_and_drops_missing() {
        let (dir, blobs) = setup();
        let managed = blobs.persist(&write_source(&dir, "a.jpg", b"a")).unwrap();
        let foreign = write_source(&dir, "cache_b.jpg", b"b");
        let missing = dir.path().join("evicted.jpg");

        let migrated = blobs.migrate(&[managed.path().to_path_buf(), foreign, missing]);

        assert_eq!(migrated.len(), 2);
        assert_eq!(migrated[0], managed);
        assert!(blobs.exists(migrated[1].path()));
        assert_eq!(fs::read(migrated[1].path()).unwrap(), b"b");
    }

    #[test]
    fn hidden_files_are_not_managed() {
        let (_dir, blobs) = setup();
        assert!(!blobs.is_managed(&blobs.dir().join(".partial.tmp")));
        assert!(!blobs.is_managed(&blobs.dir().join("nested").join("x.jpg")));
        assert!(blobs.is_managed(&blobs.dir().join("medicine_1_abc.jpg")));
    }
}
