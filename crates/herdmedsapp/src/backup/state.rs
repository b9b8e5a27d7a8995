use super::{ParsedSnapshot, Snapshot};
use crate::clock::Clock;
use crate::error::Result;
use crate::store::backend::KvBackend;
use crate::store::keys;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// The small persisted key space that backups and update detection use.
pub struct BackupState<B: KvBackend> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
}

impl<B: KvBackend> Clone for BackupState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<B: KvBackend> BackupState<B> {
    pub fn new(backend: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// The install's device id, generated and stored on first use.
    pub fn device_id(&self) -> Result<String> {
        if let Some(id) = self.backend.get(keys::DEVICE_ID)? {
            return Ok(id);
        }
        let random = Uuid::new_v4().simple().to_string();
        let id = format!("device_{}_{}", self.clock.now().timestamp_millis(), &random[..9]);
        self.backend.set(keys::DEVICE_ID, &id)?;
        info!(device_id = %id, "generated device id");
        Ok(id)
    }

    pub fn last_backup_at(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.backend.get(keys::LAST_BACKUP_TIMESTAMP)? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(ts) => Ok(Some(ts.with_timezone(&Utc))),
            Err(e) => {
                warn!(value = %raw, error = %e, "ignoring unparsable last backup timestamp");
                Ok(None)
            }
        }
    }

    pub fn set_last_backup_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.backend.set(keys::LAST_BACKUP_TIMESTAMP, &at.to_rfc3339())
    }

    pub fn app_version_seen(&self) -> Result<Option<String>> {
        self.backend.get(keys::APP_VERSION_SEEN)
    }

    pub fn set_app_version_seen(&self, version: &str) -> Result<()> {
        self.backend.set(keys::APP_VERSION_SEEN, version)
    }

    /// Overwrites any previous snapshot. There is no history.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.backend.set(keys::BACKUP_SNAPSHOT, &json)
    }

    pub fn load_snapshot(&self) -> Result<Option<ParsedSnapshot>> {
        match self.backend.get(keys::BACKUP_SNAPSHOT)? {
            Some(json) => ParsedSnapshot::parse(&json).map(Some),
            None => Ok(None),
        }
    }

    pub fn has_snapshot(&self) -> Result<bool> {
        Ok(self.backend.get(keys::BACKUP_SNAPSHOT)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::mem_backend::MemKvBackend;

    fn state() -> (Arc<MemKvBackend>, BackupState<MemKvBackend>) {
        let backend = Arc::new(MemKvBackend::new());
        let state = BackupState::new(backend.clone(), Arc::new(ManualClock::default()));
        (backend, state)
    }

    #[test]
    fn device_id_is_generated_once() {
        let (_backend, state) = state();
        let first = state.device_id().unwrap();
        assert!(first.starts_with("device_"));
        assert_eq!(state.device_id().unwrap(), first);
    }

    #[test]
    fn last_backup_round_trips_and_tolerates_garbage() {
        let (backend, state) = state();
        assert_eq!(state.last_backup_at().unwrap(), None);

        let at = Utc::now();
        state.set_last_backup_at(at).unwrap();
        assert_eq!(state.last_backup_at().unwrap(), Some(at));

        backend.set(keys::LAST_BACKUP_TIMESTAMP, "yesterday").unwrap();
        assert_eq!(state.last_backup_at().unwrap(), None);
    }

    #[test]
    fn corrupt_snapshot_slot_is_reported() {
        let (backend, state) = state();
        backend.set(keys::BACKUP_SNAPSHOT, "{}").unwrap();
        assert!(state.has_snapshot().unwrap());
        assert!(state.load_snapshot().is_err());
    }
}
