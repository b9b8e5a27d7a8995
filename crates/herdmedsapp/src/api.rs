//! # API Facade
//!
//! [`HerdApi`] is the single entry point a UI talks to. It wires the record
//! store, blob store, backup codec and orchestrator over one key-value
//! backend, and forwards to them.
//!
//! The facade does no I/O of its own beyond construction, and never prints.
//! Every method returns structured data for the UI to render.
//!
//! ## Generic Over KvBackend
//!
//! - Production: `HerdApi<FsKvBackend>`, built by [`open`]
//! - Testing: `HerdApi<MemKvBackend>`
//!
//! ## Launch Sequence
//!
//! A UI should call [`HerdApi::reconcile_on_startup`] once when it starts,
//! before showing records. It never fails; its report is informational.

use crate::backup::codec::{BackupCodec, ExportArtifact};
use crate::backup::state::BackupState;
use crate::backup::{RestoreMode, RestoreResult, Snapshot};
use crate::clock::{Clock, SystemClock};
use crate::config::{HerdConfig, HerdPaths};
use crate::error::{HerdError, Result};
use crate::model::{Record, RecordDraft, RecordPatch};
use crate::orchestrator::{BackupStats, Orchestrator, StartupReport};
use crate::store::backend::KvBackend;
use crate::store::blobs::BlobStore;
use crate::store::fs_backend::FsKvBackend;
use crate::store::records::{DoctorReport, RecordStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct HerdApi<B: KvBackend> {
    config: HerdConfig,
    paths: HerdPaths,
    records: RecordStore<B>,
    orchestrator: Orchestrator<B>,
}

impl<B: KvBackend> HerdApi<B> {
    pub fn new(backend: Arc<B>, config: HerdConfig, paths: HerdPaths, clock: Arc<dyn Clock>) -> Self {
        let blobs = BlobStore::new(&paths.images_dir, clock.clone())
            .with_prefix(&config.image_prefix)
            .with_default_ext(config.default_image_ext());
        let records = RecordStore::new(backend.clone(), blobs, clock.clone());
        let state = BackupState::new(backend, clock.clone());
        let app_version = config.app_version();
        let codec = BackupCodec::new(
            records.clone(),
            state,
            clock.clone(),
            app_version.clone(),
            &paths.scratch_dir,
        );
        let orchestrator = Orchestrator::new(
            records.clone(),
            codec,
            clock,
            app_version,
            config.backup_interval(),
        );

        Self {
            config,
            paths,
            records,
            orchestrator,
        }
    }

    pub fn config(&self) -> &HerdConfig {
        &self.config
    }

    pub fn paths(&self) -> &HerdPaths {
        &self.paths
    }

    pub fn create(&self, draft: RecordDraft) -> Result<Record> {
        self.records.create(draft)
    }

    pub fn list(&self) -> Result<Vec<Record>> {
        self.records.list()
    }

    pub fn list_favorites(&self) -> Result<Vec<Record>> {
        self.records.list_favorites()
    }

    pub fn get(&self, id: &Uuid) -> Result<Record> {
        self.records.get(id)
    }

    pub fn update(&self, id: &Uuid, patch: RecordPatch) -> Result<Record> {
        self.records.update(id, patch)
    }

    pub fn delete(&self, id: &Uuid) -> Result<bool> {
        self.records.delete(id)
    }

    pub fn toggle_favorite(&self, id: &Uuid) -> Result<Option<Record>> {
        self.records.toggle_favorite(id)
    }

    /// Resolve a full id or a unique prefix of one.
    pub fn resolve_id(&self, input: &str) -> Result<Uuid> {
        let needle = input.trim().to_lowercase();
        if let Ok(id) = Uuid::parse_str(&needle) {
            return Ok(id);
        }
        let needle = needle.replace('-', "");
        if needle.is_empty() {
            return Err(HerdError::NotFound(input.to_string()));
        }

        let matches: Vec<Uuid> = self
            .records
            .list()?
            .iter()
            .map(|r| r.id)
            .filter(|id| id.simple().to_string().starts_with(&needle))
            .collect();
        match matches.as_slice() {
            [one] => Ok(*one),
            [] => Err(HerdError::NotFound(input.to_string())),
            _ => Err(HerdError::NotFound(format!(
                "{} is ambiguous ({} records match)",
                input,
                matches.len()
            ))),
        }
    }

    pub fn doctor(&self) -> Result<DoctorReport> {
        self.records.doctor()
    }

    pub fn reconcile_on_startup(&self) -> StartupReport {
        debug!(data_dir = %self.paths.data_dir.display(), "reconciling on startup");
        self.orchestrator.reconcile_on_startup()
    }

    pub fn auto_backup_if_due(&self) -> Result<bool> {
        self.orchestrator.auto_backup_if_due()
    }

    pub fn backup_now(&self) -> Result<Snapshot> {
        self.orchestrator.backup_now()
    }

    pub fn stats(&self) -> Result<BackupStats> {
        self.orchestrator.stats()
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        self.orchestrator.codec().snapshot()
    }

    pub fn restore(&self, snapshot: &Snapshot, mode: RestoreMode) -> Result<RestoreResult> {
        self.orchestrator.codec().restore(snapshot, mode)
    }

    /// Restore from the backup slot. None if there is no backup.
    pub fn restore_from_backup(&self, mode: RestoreMode) -> Result<Option<RestoreResult>> {
        self.orchestrator.restore_from_backup(mode)
    }

    pub fn import_from_file(&self, path: &Path, mode: RestoreMode) -> Result<RestoreResult> {
        self.orchestrator.codec().import_from_file(path, mode)
    }

    pub fn write_snapshot_file(&self, dir: &Path) -> Result<ExportArtifact> {
        self.orchestrator.codec().write_snapshot_file(dir)
    }

    pub fn export_human_readable(&self, dir: &Path) -> Result<ExportArtifact> {
        self.orchestrator.codec().export_human_readable(dir)
    }
}

/// Open the on-disk store under `data_dir`, or the OS data directory.
pub fn open(data_dir: Option<PathBuf>) -> Result<HerdApi<FsKvBackend>> {
    let data_dir = match data_dir {
        Some(dir) => dir,
        None => HerdPaths::default_data_dir()?,
    };
    let config = HerdConfig::load(&data_dir)?;
    let paths = HerdPaths::new(data_dir, &config);

    let backend = Arc::new(FsKvBackend::new(&paths.kv_dir));
    let api = HerdApi::new(backend, config, paths, Arc::new(SystemClock));
    api.records.blobs().ensure_directory()?;
    Ok(api)
}
