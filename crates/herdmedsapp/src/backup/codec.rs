use super::export;
use super::state::BackupState;
use super::{
    ParsedSnapshot, RestoreMode, RestoreResult, Snapshot, SnapshotImage, SnapshotRecord,
    SCHEMA_VERSION,
};
use crate::clock::Clock;
use crate::error::{HerdError, Result};
use crate::store::backend::KvBackend;
use crate::store::records::RecordStore;
use base64::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A file written by an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub path: PathBuf,
    pub file_name: String,
}

pub struct BackupCodec<B: KvBackend> {
    records: RecordStore<B>,
    state: BackupState<B>,
    clock: Arc<dyn Clock>,
    app_version: String,
    scratch_dir: PathBuf,
}

impl<B: KvBackend> BackupCodec<B> {
    pub fn new(
        records: RecordStore<B>,
        state: BackupState<B>,
        clock: Arc<dyn Clock>,
        app_version: impl Into<String>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            records,
            state,
            clock,
            app_version: app_version.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn state(&self) -> &BackupState<B> {
        &self.state
    }

    /// Encode the whole collection with images inlined.
    ///
    /// The record list is copied under the store lock; image reads and
    /// encoding happen after it is released.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let records = self.records.list()?;
        let blobs = self.records.blobs();

        let mut encoded = Vec::with_capacity(records.len());
        for record in &records {
            let mut images = Vec::with_capacity(record.images.len());
            for image in &record.images {
                match blobs.read(image) {
                    Ok(bytes) => images.push(SnapshotImage {
                        base64: BASE64_STANDARD.encode(&bytes),
                        filename: image.file_name().unwrap_or_default().to_string(),
                        original_reference: image.to_string(),
                    }),
                    Err(e) => {
                        warn!(id = %record.id, image = %image, error = %e, "leaving image out of snapshot");
                    }
                }
            }
            encoded.push(SnapshotRecord::from_record(record, images));
        }

        let total_count = encoded.len();
        Ok(Snapshot {
            device_id: self.state.device_id()?,
            timestamp: self.clock.now(),
            app_version: self.app_version.clone(),
            schema_version: SCHEMA_VERSION.to_string(),
            records: encoded,
            total_count,
        })
    }

    pub fn restore(&self, snapshot: &Snapshot, mode: RestoreMode) -> Result<RestoreResult> {
        self.restore_parsed(ParsedSnapshot::from(snapshot.clone()), mode)
    }

    /// Re-create every decodable record through the normal create path.
    ///
    /// Replace clears the collection first and sweeps the image files it
    /// left behind once the new records are in. Record-level failures are
    /// counted, not returned.
    pub fn restore_parsed(&self, parsed: ParsedSnapshot, mode: RestoreMode) -> Result<RestoreResult> {
        let mut result = RestoreResult {
            total_count: parsed.total_count(),
            ..RestoreResult::default()
        };

        fs::create_dir_all(&self.scratch_dir).map_err(|e| {
            HerdError::StorageUnavailable(format!(
                "cannot create {}: {}",
                self.scratch_dir.display(),
                e
            ))
        })?;

        if mode == RestoreMode::Replace {
            self.records.clear()?;
        }

        for (index, entry) in parsed.entries.into_iter().enumerate() {
            let record = match entry {
                Ok(record) => record,
                Err(reason) => {
                    warn!(index, reason = %reason, "skipping undecodable snapshot record");
                    result.error_count += 1;
                    continue;
                }
            };

            match self.restore_record(record) {
                Ok(()) => result.restored_count += 1,
                Err(e) => {
                    warn!(index, error = %e, "failed to restore record");
                    result.error_count += 1;
                }
            }
        }

        if mode == RestoreMode::Replace {
            match self.records.cleanup_orphans() {
                Ok(removed) => debug!(removed, "removed images left over from the replaced collection"),
                Err(e) => warn!(error = %e, "orphan cleanup after restore failed"),
            }
        }

        info!(
            restored = result.restored_count,
            errors = result.error_count,
            total = result.total_count,
            "restore finished"
        );
        Ok(result)
    }

    fn restore_record(&self, mut record: SnapshotRecord) -> Result<()> {
        let images = std::mem::take(&mut record.images);
        let mut temps = Vec::with_capacity(images.len());

        let outcome = self
            .write_scratch(&images, &mut temps)
            .and_then(|()| self.records.create(record.into_draft(temps.clone())));

        for temp in &temps {
            if let Err(e) = fs::remove_file(temp) {
                debug!(path = %temp.display(), error = %e, "could not remove scratch file");
            }
        }
        outcome.map(|_| ())
    }

    /// Decode images into scratch files. An image that is not valid base64
    /// is skipped; the record still restores without it.
    fn write_scratch(&self, images: &[SnapshotImage], temps: &mut Vec<PathBuf>) -> Result<()> {
        for image in images {
            let bytes = match BASE64_STANDARD.decode(image.base64.trim()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(filename = %image.filename, error = %e, "skipping undecodable image");
                    continue;
                }
            };
            let temp = self.scratch_dir.join(format!(
                "restore_{}_{}",
                Uuid::new_v4().simple(),
                scratch_name(&image.filename)
            ));
            fs::write(&temp, &bytes)?;
            temps.push(temp);
        }
        Ok(())
    }

    /// Read a machine-readable snapshot file and restore it.
    pub fn import_from_file(&self, path: &Path, mode: RestoreMode) -> Result<RestoreResult> {
        let text = fs::read_to_string(path).map_err(|source| HerdError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = ParsedSnapshot::parse(&text)?;
        info!(path = %path.display(), records = parsed.total_count(), "importing snapshot file");
        self.restore_parsed(parsed, mode)
    }

    /// Write a fresh snapshot as JSON into `dir`. The result can be imported.
    pub fn write_snapshot_file(&self, dir: &Path) -> Result<ExportArtifact> {
        let snapshot = self.snapshot()?;
        let file_name = format!("herdmeds_backup_{}.json", snapshot.timestamp.format("%Y-%m-%d"));
        let body = serde_json::to_string_pretty(&snapshot)?;
        write_artifact(dir, file_name, body.as_bytes())
    }

    /// Render the current collection as a Markdown report into `dir`.
    ///
    /// The report is for sharing and printing, not for importing.
    pub fn export_human_readable(&self, dir: &Path) -> Result<ExportArtifact> {
        let snapshot = self.snapshot()?;
        let file_name = format!("herdmeds_export_{}.md", snapshot.timestamp.format("%Y-%m-%d"));
        let body = export::render_report(&snapshot);
        write_artifact(dir, file_name, body.as_bytes())
    }
}

fn write_artifact(dir: &Path, file_name: String, bytes: &[u8]) -> Result<ExportArtifact> {
    fs::create_dir_all(dir)?;
    let path = dir.join(&file_name);
    fs::write(&path, bytes)?;
    info!(path = %path.display(), "export written");
    Ok(ExportArtifact { path, file_name })
}

/// Filesystem-safe version of a snapshot filename. The extension survives so
/// the persisted copy keeps it.
fn scratch_name(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}
