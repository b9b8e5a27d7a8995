//! # Storage Layer
//!
//! Two kinds of state live on the device:
//!
//! 1. **Documents** in a small key-value space ([`backend::KvBackend`]). Each
//!    value is a whole JSON document and is always rewritten in full.
//! 2. **Image files** in one managed directory ([`blobs::BlobStore`]).
//!
//! ## Key Space
//!
//! | Key | Value |
//! |-----|-------|
//! | `records` | JSON array of [`crate::model::Record`] |
//! | `backup_snapshot` | JSON [`crate::backup::Snapshot`], single slot |
//! | `device_id` | Generated once per install |
//! | `last_backup_timestamp` | RFC 3339 timestamp |
//! | `app_version_seen` | Last running app version |
//!
//! ## Ownership
//!
//! - [`records::RecordStore`] is the only writer of `records`. It calls into
//!   the blob store whenever a mutation adds or drops images.
//! - The blob store owns every file in its directory. Records only hold
//!   [`crate::model::PermanentRef`]s to them.
//!
//! ## Implementations
//!
//! - [`fs_backend::FsKvBackend`]: one file per key, atomic writes.
//! - [`mem_backend::MemKvBackend`]: in-memory, for tests.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//! ├── kv/
//! │   ├── records.json
//! │   ├── backup_snapshot.json
//! │   └── ...
//! ├── medicine_images/
//! │   └── medicine_{epoch-ms}_{random9}.{ext}
//! └── tmp/                 # restore scratch space
//! ```

pub mod backend;
pub mod blobs;
pub mod fs_backend;
pub mod mem_backend;
pub mod records;

pub mod keys {
    pub const RECORDS: &str = "records";
    pub const BACKUP_SNAPSHOT: &str = "backup_snapshot";
    pub const DEVICE_ID: &str = "device_id";
    pub const LAST_BACKUP_TIMESTAMP: &str = "last_backup_timestamp";
    pub const APP_VERSION_SEEN: &str = "app_version_seen";
}
