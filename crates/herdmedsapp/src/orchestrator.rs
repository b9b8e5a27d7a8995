//! # Update and Backup Orchestration
//!
//! Decides, once per launch, whether the single backup slot should be
//! replayed into the live collection, and keeps that slot fresh.
//!
//! The startup sequence is:
//!
//! 1. Record the running version, noting first launch or an update.
//! 2. Restore (replace) from the backup slot when the live collection is
//!    empty. After an update, also restore when the backup is strictly newer
//!    than every record's `createdAt`/`updatedAt`. Without an update a
//!    fresh backup is always newer than the records it was taken from, so
//!    that comparison alone would replay it on every launch.
//! 3. Take a new backup if the last one is older than the interval.
//!
//! Each step is attempted even if an earlier one failed. Failures are logged
//! and folded into the [`StartupReport`]; [`Orchestrator::reconcile_on_startup`]
//! does not return errors.

use crate::backup::codec::BackupCodec;
use crate::backup::{ParsedSnapshot, RestoreMode, RestoreResult, Snapshot};
use crate::clock::Clock;
use crate::error::Result;
use crate::store::backend::KvBackend;
use crate::store::records::RecordStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionChange {
    FirstLaunch,
    Unchanged,
    Updated { from: String, to: String },
}

/// Summary of backup state for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStats {
    pub device_id: String,
    pub has_backup: bool,
    pub backup_timestamp: Option<DateTime<Utc>>,
    pub backup_record_count: Option<usize>,
    pub current_record_count: usize,
    pub last_backup_at: Option<DateTime<Utc>>,
    pub backup_due: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    /// None if the version check itself failed.
    pub version: Option<VersionChange>,
    /// Set only when a restore ran.
    pub restored_count: Option<usize>,
    pub backed_up: bool,
    pub message: String,
}

pub struct Orchestrator<B: KvBackend> {
    records: RecordStore<B>,
    codec: BackupCodec<B>,
    clock: Arc<dyn Clock>,
    app_version: String,
    interval: Duration,
}

impl<B: KvBackend> Orchestrator<B> {
    pub fn new(
        records: RecordStore<B>,
        codec: BackupCodec<B>,
        clock: Arc<dyn Clock>,
        app_version: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            records,
            codec,
            clock,
            app_version: app_version.into(),
            interval,
        }
    }

    pub fn codec(&self) -> &BackupCodec<B> {
        &self.codec
    }

    /// Compare against the last version seen and store the running one.
    pub fn check_version_change(&self) -> Result<VersionChange> {
        let state = self.codec.state();
        let seen = state.app_version_seen()?;
        state.set_app_version_seen(&self.app_version)?;

        Ok(match seen {
            None => VersionChange::FirstLaunch,
            Some(v) if v == self.app_version => VersionChange::Unchanged,
            Some(v) => VersionChange::Updated {
                from: v,
                to: self.app_version.clone(),
            },
        })
    }

    pub fn is_backup_due(&self) -> Result<bool> {
        Ok(match self.codec.state().last_backup_at()? {
            None => true,
            Some(last) => self.clock.now() - last > self.interval,
        })
    }

    /// Snapshot into the backup slot regardless of the interval.
    pub fn backup_now(&self) -> Result<Snapshot> {
        let snapshot = self.codec.snapshot()?;
        let state = self.codec.state();
        state.save_snapshot(&snapshot)?;
        state.set_last_backup_at(snapshot.timestamp)?;
        info!(records = snapshot.total_count, "backup saved");
        Ok(snapshot)
    }

    /// Returns whether a backup was taken.
    pub fn auto_backup_if_due(&self) -> Result<bool> {
        if !self.is_backup_due()? {
            debug!("backup not due");
            return Ok(false);
        }
        self.backup_now()?;
        Ok(true)
    }

    pub fn load_backup(&self) -> Result<Option<ParsedSnapshot>> {
        self.codec.state().load_snapshot()
    }

    /// Replace the live collection with the backup slot.
    pub fn restore_from_backup(&self, mode: RestoreMode) -> Result<Option<RestoreResult>> {
        match self.load_backup()? {
            Some(parsed) => self.codec.restore_parsed(parsed, mode).map(Some),
            None => Ok(None),
        }
    }

    pub fn stats(&self) -> Result<BackupStats> {
        let state = self.codec.state();
        let backup = self.load_backup()?;
        Ok(BackupStats {
            device_id: state.device_id()?,
            has_backup: backup.is_some(),
            backup_timestamp: backup.as_ref().and_then(|b| b.timestamp),
            backup_record_count: backup.as_ref().map(ParsedSnapshot::total_count),
            current_record_count: self.records.count()?,
            last_backup_at: state.last_backup_at()?,
            backup_due: self.is_backup_due()?,
        })
    }

    fn restore_if_needed(&self, version: Option<&VersionChange>) -> Result<Option<RestoreResult>> {
        let Some(backup) = self.load_backup()? else {
            debug!("no backup in slot");
            return Ok(None);
        };
        if backup.total_count() == 0 {
            return Ok(None);
        }

        let restore = match self.records.latest_modification()? {
            None => {
                info!(backup_records = backup.total_count(), "collection is empty, restoring from backup");
                true
            }
            Some(latest) => match backup.timestamp {
                Some(taken) if taken > latest && matches!(version, Some(VersionChange::Updated { .. })) => {
                    info!(%taken, %latest, "backup is newer than every record, restoring");
                    true
                }
                _ => false,
            },
        };

        if !restore {
            return Ok(None);
        }
        self.codec.restore_parsed(backup, RestoreMode::Replace).map(Some)
    }

    pub fn reconcile_on_startup(&self) -> StartupReport {
        let version = match self.check_version_change() {
            Ok(change) => Some(change),
            Err(e) => {
                error!(error = %e, "version check failed");
                None
            }
        };

        let mut notes: Vec<String> = Vec::new();
        if let Some(VersionChange::Updated { from, to }) = &version {
            info!(%from, %to, "app updated");
            notes.push(format!("Updated from {} to {}.", from, to));
        }

        let restored_count = match self.restore_if_needed(version.as_ref()) {
            Ok(Some(result)) => {
                notes.push(format!(
                    "Restored {} of {} record(s) from backup.",
                    result.restored_count, result.total_count
                ));
                Some(result.restored_count)
            }
            Ok(None) => None,
            Err(e) => {
                error!(error = %e, "restore from backup failed");
                notes.push("Backup could not be restored.".to_string());
                None
            }
        };

        let backed_up = match self.auto_backup_if_due() {
            Ok(taken) => taken,
            Err(e) => {
                error!(error = %e, "automatic backup failed");
                notes.push("Automatic backup failed.".to_string());
                false
            }
        };

        let message = if notes.is_empty() {
            "Everything up to date.".to_string()
        } else {
            notes.join(" ")
        };

        StartupReport {
            version,
            restored_count,
            backed_up,
            message,
        }
    }
}
