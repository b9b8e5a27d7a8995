//! # Backups
//!
//! A [`Snapshot`] is a self-contained copy of the whole record collection:
//! every image is inlined as base64, so the snapshot does not depend on any
//! file still being on disk.
//!
//! ## Wire Format
//!
//! ```text
//! {
//!   "deviceId": "device_1718000000000_k3j9x0a1b",
//!   "timestamp": "2025-06-10T08:00:00Z",
//!   "appVersion": "0.3.0",
//!   "schemaVersion": "1.0",
//!   "records": [ { ...record fields..., "images": [
//!       { "base64": "...", "filename": "medicine_..._....jpg", "originalReference": "/.../medicine_images/..." }
//!   ] } ],
//!   "totalCount": 1
//! }
//! ```
//!
//! Snapshots written by older app builds use `medicines` instead of `records`
//! and `animal`/`howToMake`/`originalUri` for some fields; all are accepted.
//!
//! ## Restoring
//!
//! Restore never reuses the filenames in a snapshot. Each image is decoded to
//! a scratch file and fed back through the normal create path, so it lands in
//! the managed directory under a fresh name. Records are likewise re-created
//! with new ids and a new `createdAt`; the snapshot's `id` is provenance only.
//!
//! Parsing is lenient per record: a record that fails to decode is counted as
//! an error and skipped. Only a missing or non-array `records` makes the whole
//! snapshot corrupt.
//!
//! ## Modules
//!
//! - [`codec`]: snapshot, restore, import and export entry points
//! - [`state`]: device id, last backup time, and the single snapshot slot
//! - [`export`]: the human-readable report

use crate::error::{HerdError, Result};
use crate::model::{AnimalType, Category, Record, RecordDraft};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod codec;
pub mod export;
pub mod state;

pub const SCHEMA_VERSION: &str = "1.0";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_category() -> Category {
    Category::Medicine
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub app_version: String,
    #[serde(default = "default_schema_version", alias = "version")]
    pub schema_version: String,
    #[serde(alias = "medicines")]
    pub records: Vec<SnapshotRecord>,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    /// Id on the device that took the snapshot. Never reused on restore.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(alias = "animal")]
    pub animal_type: AnimalType,
    pub details: String,
    #[serde(default = "default_category")]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "howToMake")]
    pub preparation_method: Option<String>,
    #[serde(default)]
    pub images: Vec<SnapshotImage>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotImage {
    pub base64: String,
    /// Filename in the source device's image directory. Display only.
    pub filename: String,
    #[serde(default, alias = "originalUri")]
    pub original_reference: String,
}

impl SnapshotRecord {
    pub fn from_record(record: &Record, images: Vec<SnapshotImage>) -> Self {
        Self {
            id: Some(record.id.to_string()),
            name: record.name.clone(),
            animal_type: record.animal_type,
            details: record.details.clone(),
            category: record.category,
            preparation_method: record.preparation_method.clone(),
            images,
            is_favorite: record.is_favorite,
            created_at: Some(record.created_at),
            updated_at: record.updated_at,
        }
    }

    /// Draft for re-creating this record, with images already decoded to
    /// the given transient paths.
    pub fn into_draft(self, images: Vec<PathBuf>) -> RecordDraft {
        RecordDraft {
            name: self.name,
            animal_type: self.animal_type,
            details: self.details,
            category: self.category,
            preparation_method: self.preparation_method,
            images,
            is_favorite: self.is_favorite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// Clear the current collection first.
    Replace,
    /// Append to the current collection. No deduplication.
    Merge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    pub restored_count: usize,
    pub error_count: usize,
    pub total_count: usize,
}

impl RestoreResult {
    /// Turn a restore with failed records into a [`HerdError::PartialRestoreFailure`].
    pub fn strict(self) -> Result<Self> {
        if self.error_count > 0 {
            return Err(HerdError::PartialRestoreFailure {
                failed: self.error_count,
                total: self.total_count,
            });
        }
        Ok(self)
    }
}

/// A snapshot decoded record by record.
#[derive(Debug)]
pub struct ParsedSnapshot {
    pub device_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub app_version: Option<String>,
    pub entries: Vec<std::result::Result<SnapshotRecord, String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    timestamp: Option<serde_json::Value>,
    #[serde(default)]
    app_version: Option<String>,
    #[serde(default, alias = "medicines")]
    records: Option<serde_json::Value>,
}

impl ParsedSnapshot {
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawSnapshot = serde_json::from_str(text)
            .map_err(|e| HerdError::CorruptSnapshot(format!("not a snapshot document: {}", e)))?;

        let items = match raw.records {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => {
                return Err(HerdError::CorruptSnapshot(
                    "`records` is not a list".to_string(),
                ))
            }
            None => return Err(HerdError::CorruptSnapshot("`records` is missing".to_string())),
        };

        let entries = items
            .into_iter()
            .map(|item| serde_json::from_value::<SnapshotRecord>(item).map_err(|e| e.to_string()))
            .collect();

        let timestamp = raw
            .timestamp
            .and_then(|v| serde_json::from_value::<DateTime<Utc>>(v).ok());

        Ok(Self {
            device_id: raw.device_id,
            timestamp,
            app_version: raw.app_version,
            entries,
        })
    }

    pub fn total_count(&self) -> usize {
        self.entries.len()
    }
}

impl From<Snapshot> for ParsedSnapshot {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            device_id: Some(snapshot.device_id),
            timestamp: Some(snapshot.timestamp),
            app_version: Some(snapshot.app_version),
            entries: snapshot.records.into_iter().map(Ok).collect(),
        }
    }
}
