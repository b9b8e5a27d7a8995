use crate::backup::codec::BackupCodec;
use crate::backup::state::BackupState;
use crate::clock::{Clock, ManualClock};
use crate::orchestrator::Orchestrator;
use crate::config::{HerdConfig, HerdPaths};
use crate::store::blobs::BlobStore;
use crate::store::mem_backend::MemKvBackend;
use crate::store::records::RecordStore;
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEnv {
    // We keep _temp_dir to ensure the directory is not dropped until the test is done
    pub _temp_dir: TempDir,
    pub root: PathBuf,
    pub config: HerdConfig,
    pub paths: HerdPaths,
    pub backend: Arc<MemKvBackend>,
    pub clock: Arc<ManualClock>,
    pub records: RecordStore<MemKvBackend>,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let config = HerdConfig::default();
        let paths = HerdPaths::new(root.join("data"), &config);
        let backend = Arc::new(MemKvBackend::new());
        let clock = Arc::new(ManualClock::default());

        let blobs = BlobStore::new(&paths.images_dir, clock.clone())
            .with_prefix(&config.image_prefix)
            .with_default_ext(config.default_image_ext());
        let records = RecordStore::new(backend.clone(), blobs, clock.clone());

        Self {
            _temp_dir: temp_dir,
            root,
            config,
            paths,
            backend,
            clock,
            records,
        }
    }

    pub fn state(&self) -> BackupState<MemKvBackend> {
        BackupState::new(self.backend.clone(), self.clock.clone())
    }

    pub fn codec(&self) -> BackupCodec<MemKvBackend> {
        BackupCodec::new(
            self.records.clone(),
            self.state(),
            self.clock.clone(),
            self.config.app_version(),
            &self.paths.scratch_dir,
        )
    }

    /// An orchestrator that believes it is running `app_version`.
    pub fn orchestrator(&self, app_version: &str) -> Orchestrator<MemKvBackend> {
        let codec = BackupCodec::new(
            self.records.clone(),
            self.state(),
            self.clock.clone(),
            app_version,
            &self.paths.scratch_dir,
        );
        Orchestrator::new(
            self.records.clone(),
            codec,
            self.clock.clone(),
            app_version,
            self.config.backup_interval(),
        )
    }

    /// Write a file where an image picker would leave it.
    pub fn picked(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let dir = self.root.join("picker");
        fs::create_dir_all(&dir).expect("failed to create picker dir");
        let path = dir.join(name);
        fs::write(&path, bytes).expect("failed to write picked image");
        path
    }

    /// Names of the files currently in the managed image directory.
    pub fn image_files(&self) -> Vec<String> {
        self.records
            .blobs()
            .list_files()
            .expect("failed to list image dir")
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }
}
