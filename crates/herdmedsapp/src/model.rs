//! # Domain Model
//!
//! A [`Record`] is one medicine or home-remedy entry. Records are stored as a
//! single JSON array under the `records` key (see [`crate::store`]), so every
//! field here is part of the on-disk format and uses camelCase on the wire.
//!
//! ## Image References
//!
//! Images arrive from the picker as *transient* paths that may vanish at any
//! time (cache eviction, app restart). The blob store copies them into its
//! managed directory and hands back a [`PermanentRef`]. The two are kept apart
//! by type:
//!
//! - [`RecordDraft::images`] holds plain transient paths.
//! - [`Record::images`] only ever holds [`PermanentRef`]s.
//! - [`RecordPatch::images`] mixes both as [`ImageRef`], so an edit can keep
//!   existing images and add new ones without sniffing path strings.
//!
//! ## Updates
//!
//! Partial updates go through [`RecordPatch`]. Scalar fields are merged by
//! [`Record::apply_fields`]; the image list is planned by [`plan_image_merge`]
//! and executed by the record store, which owns the persist/remove side
//! effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimalType {
    Cow,
    Goat,
    Heifer,
    Buffalo,
    Sheep,
}

impl AnimalType {
    pub const ALL: [AnimalType; 5] = [
        AnimalType::Cow,
        AnimalType::Goat,
        AnimalType::Heifer,
        AnimalType::Buffalo,
        AnimalType::Sheep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnimalType::Cow => "Cow",
            AnimalType::Goat => "Goat",
            AnimalType::Heifer => "Heifer",
            AnimalType::Buffalo => "Buffalo",
            AnimalType::Sheep => "Sheep",
        }
    }
}

impl fmt::Display for AnimalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnimalType::ALL
            .iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("Unknown animal type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Medicine,
    // Older app builds wrote home remedies as "desi_totka".
    #[serde(alias = "desi_totka")]
    HomeRemedy,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Medicine => "Medicine",
            Category::HomeRemedy => "Home Remedy",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "medicine" => Ok(Category::Medicine),
            "home_remedy" | "remedy" | "desi_totka" => Ok(Category::HomeRemedy),
            other => Err(format!("Unknown category: {}", other)),
        }
    }
}

/// A file inside the blob store's managed directory.
///
/// Only the blob store mints these; deserializing one from a stored record is
/// the other way in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermanentRef(PathBuf);

impl PermanentRef {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|s| s.to_str())
    }
}

impl fmt::Display for PermanentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Picker-supplied path, not guaranteed to survive.
    Transient(PathBuf),
    Permanent(PermanentRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: Uuid,
    pub name: String,
    #[serde(alias = "animal")]
    pub animal_type: AnimalType,
    pub details: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "howToMake")]
    pub preparation_method: Option<String>,
    #[serde(default)]
    pub images: Vec<PermanentRef>,
    #[serde(default)]
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Most recent of `created_at` and `updated_at`.
    pub fn last_modified(&self) -> DateTime<Utc> {
        match self.updated_at {
            Some(updated) if updated > self.created_at => updated,
            _ => self.created_at,
        }
    }

    /// Merge every non-image field of `patch` into the record.
    pub fn apply_fields(&mut self, patch: &RecordPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(animal_type) = patch.animal_type {
            self.animal_type = animal_type;
        }
        if let Some(details) = &patch.details {
            self.details = details.clone();
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(method) = &patch.preparation_method {
            self.preparation_method = method.clone();
        }
        if let Some(fav) = patch.is_favorite {
            self.is_favorite = fav;
        }
    }
}

/// What the UI submits to create a record. `images` are transient paths.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub name: String,
    pub animal_type: AnimalType,
    pub details: String,
    pub category: Category,
    pub preparation_method: Option<String>,
    pub images: Vec<PathBuf>,
    pub is_favorite: bool,
}

impl RecordDraft {
    pub fn new(
        name: impl Into<String>,
        animal_type: AnimalType,
        details: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            name: name.into(),
            animal_type,
            details: details.into(),
            category,
            preparation_method: None,
            images: Vec::new(),
            is_favorite: false,
        }
    }

    pub fn with_images(mut self, images: Vec<PathBuf>) -> Self {
        self.images = images;
        self
    }

    pub fn with_preparation_method(mut self, method: impl Into<String>) -> Self {
        self.preparation_method = Some(method.into());
        self
    }

    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }
}

/// Partial update. `None` leaves a field untouched.
///
/// `preparation_method` is doubly optional so a patch can clear it
/// (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub animal_type: Option<AnimalType>,
    pub details: Option<String>,
    pub category: Option<Category>,
    pub preparation_method: Option<Option<String>>,
    pub images: Option<Vec<ImageRef>>,
    pub is_favorite: Option<bool>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }
}

/// Side effects needed to move a record from its old image list to a new one.
#[derive(Debug, Default, PartialEq)]
pub struct ImageMergePlan {
    /// The target list. Transient entries still need persisting.
    pub target: Vec<ImageRef>,
    /// Permanent refs held by the old record that the target no longer has.
    pub to_remove: Vec<PermanentRef>,
}

/// A `Permanent` entry is kept as-is only if the old record owns it, and only
/// once. Anything else (another record's file, a path outside the image
/// directory) is demoted to `Transient` so it gets copied in as a new file.
pub fn plan_image_merge(old: &[PermanentRef], new: Vec<ImageRef>) -> ImageMergePlan {
    let mut claimed: Vec<&PermanentRef> = Vec::new();
    let target: Vec<ImageRef> = new
        .into_iter()
        .map(|image| match image {
            ImageRef::Permanent(p) => match old.iter().find(|o| **o == p) {
                Some(owned) if !claimed.contains(&owned) => {
                    claimed.push(owned);
                    ImageRef::Permanent(p)
                }
                _ => ImageRef::Transient(p.0),
            },
            transient => transient,
        })
        .collect();

    let to_remove = old
        .iter()
        .filter(|existing| !claimed.contains(existing))
        .cloned()
        .collect();

    ImageMergePlan { target, to_remove }
}
