//! # Configuration
//!
//! Configuration is loaded with [`confique`] from, in priority order:
//! 1. **Environment variables**: `HERDMEDS_IMAGE_PREFIX`, `HERDMEDS_BACKUP_INTERVAL_HOURS`, etc.
//! 2. **Config file**: `<data_dir>/herdmeds.toml` (optional).
//! 3. **Compiled defaults**: via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `image_prefix` | `medicine` | Prefix of permanent image filenames |
//! | `default_image_ext` | `jpg` | Extension used when a picked file has none |
//! | `images_dir_name` | `medicine_images` | Managed image directory, relative to the data dir |
//! | `backup_interval_hours` | `24` | Minimum age of the last backup before auto-backup runs again |
//! | `max_images_per_record` | `3` | Upper bound checked by UI clients |
//! | `app_version` | crate version | Version string used for update detection |

use crate::error::{HerdError, Result};
use chrono::Duration;
use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "herdmeds.toml";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HerdConfig {
    #[config(default = "medicine", env = "HERDMEDS_IMAGE_PREFIX")]
    pub image_prefix: String,

    #[config(default = "jpg", env = "HERDMEDS_DEFAULT_IMAGE_EXT")]
    pub default_image_ext: String,

    #[config(default = "medicine_images", env = "HERDMEDS_IMAGES_DIR_NAME")]
    pub images_dir_name: String,

    #[config(default = 24, env = "HERDMEDS_BACKUP_INTERVAL_HOURS")]
    pub backup_interval_hours: u32,

    #[config(default = 3, env = "HERDMEDS_MAX_IMAGES_PER_RECORD")]
    pub max_images_per_record: usize,

    /// Overrides the build's own version. Mostly useful to exercise update detection.
    #[config(env = "HERDMEDS_APP_VERSION")]
    pub app_version: Option<String>,
}

// Mirrors the `#[config(default)]` values above; a test keeps them in step.
impl Default for HerdConfig {
    fn default() -> Self {
        Self {
            image_prefix: "medicine".to_string(),
            default_image_ext: "jpg".to_string(),
            images_dir_name: "medicine_images".to_string(),
            backup_interval_hours: 24,
            max_images_per_record: 3,
            app_version: None,
        }
    }
}

impl HerdConfig {
    /// Load from the environment and `<data_dir>/herdmeds.toml`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        HerdConfig::builder()
            .env()
            .file(data_dir.join(CONFIG_FILE_NAME))
            .load()
            .map_err(|e| HerdError::Config(e.to_string()))
    }

    pub fn app_version(&self) -> String {
        self.app_version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::hours(i64::from(self.backup_interval_hours))
    }

    /// Default extension without a leading dot.
    pub fn default_image_ext(&self) -> &str {
        self.default_image_ext.trim_start_matches('.')
    }
}

/// Where everything lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HerdPaths {
    pub data_dir: PathBuf,
    /// One file per key-value slot.
    pub kv_dir: PathBuf,
    /// Managed permanent image directory.
    pub images_dir: PathBuf,
    /// Temporary files written while restoring a snapshot.
    pub scratch_dir: PathBuf,
}

impl HerdPaths {
    pub fn new(data_dir: impl Into<PathBuf>, config: &HerdConfig) -> Self {
        let data_dir = data_dir.into();
        Self {
            kv_dir: data_dir.join("kv"),
            images_dir: data_dir.join(&config.images_dir_name),
            scratch_dir: data_dir.join("tmp"),
            data_dir,
        }
    }

    /// The OS-appropriate data directory, e.g. `~/.local/share/herdmeds`.
    pub fn default_data_dir() -> Result<PathBuf> {
        ProjectDirs::from("", "", "herdmeds")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                HerdError::StorageUnavailable("Could not determine a home directory".to_string())
            })
    }
}
