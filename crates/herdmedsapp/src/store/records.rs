//! # Record Store
//!
//! CRUD over the single `records` document. Every mutator is a full
//! read-modify-write of that document, serialized behind one mutation lock so
//! two in-flight writes cannot lose each other's changes.
//!
//! Image side effects happen here, not in callers:
//! - `create` persists the draft's transient images before the record exists.
//! - `update` persists newly added transient images and deletes permanent
//!   ones the record no longer references, after the new document is saved.
//! - `delete` removes the record, then its image files.
//!
//! A transient image that cannot be read is dropped with a warning; the save
//! goes ahead. Any other storage failure aborts the operation and removes the
//! images that were copied for it.

use super::backend::KvBackend;
use super::blobs::{referenced_names, BlobStore};
use super::keys;
use crate::clock::Clock;
use crate::error::{HerdError, Result};
use crate::model::{plan_image_merge, ImageRef, PermanentRef, Record, RecordDraft, RecordPatch};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Report from the `doctor` maintenance pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    /// Image refs copied into the managed directory from elsewhere.
    pub migrated: usize,
    /// Image refs that could not be read and were removed from their record.
    pub dropped: usize,
    pub orphans_removed: usize,
}

pub struct RecordStore<B: KvBackend> {
    backend: Arc<B>,
    blobs: BlobStore,
    clock: Arc<dyn Clock>,
    lock: Arc<Mutex<()>>,
}

impl<B: KvBackend> Clone for RecordStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            blobs: self.blobs.clone(),
            clock: Arc::clone(&self.clock),
            lock: Arc::clone(&self.lock),
        }
    }
}

impl<B: KvBackend> RecordStore<B> {
    pub fn new(backend: Arc<B>, blobs: BlobStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            blobs,
            clock,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&self) -> Result<Vec<Record>> {
        match self.backend.get(keys::RECORDS)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, records: &[Record]) -> Result<()> {
        let json = serde_json::to_string(records)?;
        self.backend.set(keys::RECORDS, &json)
    }

    /// Persist transient images. Unreadable sources are skipped; any other
    /// failure rolls back what was copied so far.
    fn persist_images(&self, temps: &[PathBuf]) -> Result<Vec<PermanentRef>> {
        let mut persisted = Vec::with_capacity(temps.len());
        for result in self.blobs.persist_all(temps) {
            match result {
                Ok(r) => persisted.push(r),
                Err(HerdError::SourceUnreadable { path, source }) => {
                    warn!(path = %path.display(), error = %source, "dropping unreadable image");
                }
                Err(e) => {
                    self.blobs.remove_all(&persisted);
                    return Err(e);
                }
            }
        }
        Ok(persisted)
    }

    pub fn create(&self, draft: RecordDraft) -> Result<Record> {
        // Held across the copy so orphan cleanup never sees an unreferenced new file.
        let _guard = self.guard();
        let images = self.persist_images(&draft.images)?;

        let record = Record {
            id: Uuid::new_v4(),
            name: draft.name,
            animal_type: draft.animal_type,
            details: draft.details,
            category: draft.category,
            preparation_method: draft.preparation_method,
            images,
            is_favorite: draft.is_favorite,
            created_at: self.clock.now(),
            updated_at: None,
        };

        let saved = self.load().and_then(|mut records| {
            records.push(record.clone());
            self.save(&records)
        });
        if let Err(e) = saved {
            self.blobs.remove_all(&record.images);
            return Err(e);
        }

        info!(id = %record.id, images = record.images.len(), "record created");
        Ok(record)
    }

    /// All records in creation order.
    pub fn list(&self) -> Result<Vec<Record>> {
        let _guard = self.guard();
        self.load()
    }

    pub fn get(&self, id: &Uuid) -> Result<Record> {
        self.list()?
            .into_iter()
            .find(|r| r.id == *id)
            .ok_or_else(|| HerdError::NotFound(id.to_string()))
    }

    pub fn update(&self, id: &Uuid, patch: RecordPatch) -> Result<Record> {
        let _guard = self.guard();
        let mut records = self.load()?;
        let idx = records
            .iter()
            .position(|r| r.id == *id)
            .ok_or_else(|| HerdError::NotFound(id.to_string()))?;

        let mut record = records[idx].clone();
        record.apply_fields(&patch);

        let mut added: Vec<PermanentRef> = Vec::new();
        let mut to_remove: Vec<PermanentRef> = Vec::new();
        if let Some(images) = patch.images {
            let plan = plan_image_merge(&record.images, images);
            let mut merged = Vec::with_capacity(plan.target.len());
            for image in plan.target {
                match image {
                    ImageRef::Permanent(p) => merged.push(p),
                    ImageRef::Transient(path) => {
                        match self.persist_images(std::slice::from_ref(&path)) {
                            Ok(mut persisted) => {
                                added.extend(persisted.iter().cloned());
                                merged.append(&mut persisted);
                            }
                            Err(e) => {
                                self.blobs.remove_all(&added);
                                return Err(e);
                            }
                        }
                    }
                }
            }
            record.images = merged;
            to_remove = plan.to_remove;
        }

        record.updated_at = Some(self.clock.now());
        records[idx] = record.clone();

        if let Err(e) = self.save(&records) {
            self.blobs.remove_all(&added);
            return Err(e);
        }

        // Only drop files once nothing references them any more.
        let removed = self.blobs.remove_all(&to_remove);
        debug!(id = %id, added = added.len(), removed, "record updated");
        Ok(record)
    }

    /// Returns false if there was no such record.
    pub fn delete(&self, id: &Uuid) -> Result<bool> {
        let _guard = self.guard();
        let mut records = self.load()?;
        let Some(idx) = records.iter().position(|r| r.id == *id) else {
            return Ok(false);
        };

        let record = records.remove(idx);
        self.save(&records)?;

        // If this fails halfway the leftovers are orphans, which cleanup removes.
        let removed = self.blobs.remove_all(&record.images);
        info!(id = %id, images_removed = removed, "record deleted");
        Ok(true)
    }

    /// Flip `is_favorite`. Returns None if there was no such record.
    pub fn toggle_favorite(&self, id: &Uuid) -> Result<Option<Record>> {
        let _guard = self.guard();
        let mut records = self.load()?;
        let Some(record) = records.iter_mut().find(|r| r.id == *id) else {
            return Ok(None);
        };

        record.is_favorite = !record.is_favorite;
        record.updated_at = Some(self.clock.now());
        let toggled = record.clone();

        self.save(&records)?;
        Ok(Some(toggled))
    }

    pub fn list_favorites(&self) -> Result<Vec<Record>> {
        Ok(self.list()?.into_iter().filter(|r| r.is_favorite).collect())
    }

    /// Drop the whole collection. Image files are left for orphan cleanup.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.guard();
        self.backend.remove(keys::RECORDS)?;
        info!("record collection cleared");
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    /// Newest `created_at`/`updated_at` across all records.
    pub fn latest_modification(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.list()?.iter().map(Record::last_modified).max())
    }

    /// Filenames of every image referenced by any record.
    pub fn referenced_images(&self) -> Result<HashSet<String>> {
        let records = self.list()?;
        Ok(referenced_names(records.iter().flat_map(|r| r.images.iter())))
    }

    /// Delete image files no record references. Runs under the mutation lock
    /// so a concurrent create cannot lose a freshly copied file.
    pub fn cleanup_orphans(&self) -> Result<usize> {
        let _guard = self.guard();
        let records = self.load()?;
        let referenced = referenced_names(records.iter().flat_map(|r| r.images.iter()));
        self.blobs.cleanup_orphans(&referenced)
    }

    /// Repair pass: bring every image ref into the managed directory, drop
    /// the ones that cannot be recovered, then remove orphans.
    pub fn doctor(&self) -> Result<DoctorReport> {
        let _guard = self.guard();
        let mut records = self.load()?;
        let mut report = DoctorReport::default();
        let mut changed = false;

        for record in records.iter_mut() {
            let needs_repair = record.images.iter().any(|r| !self.blobs.exists(r.path()));
            if !needs_repair {
                continue;
            }

            let old: Vec<PathBuf> = record.images.iter().map(|r| r.path().to_path_buf()).collect();
            let migrated = self.blobs.migrate(&old);

            report.dropped += old.len() - migrated.len();
            report.migrated += migrated
                .iter()
                .filter(|r| !old.iter().any(|o| o == r.path()))
                .count();

            record.images = migrated;
            record.updated_at = Some(self.clock.now());
            changed = true;
        }

        if changed {
            self.save(&records)?;
        }

        let referenced = referenced_names(records.iter().flat_map(|r| r.images.iter()));
        report.orphans_removed = self.blobs.cleanup_orphans(&referenced)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnimalType, Category};
    use crate::test_utils::TestEnv;
    use std::fs;

    fn medicine(name: &str) -> RecordDraft {
        RecordDraft::new(name, AnimalType::Cow, "10ml IM daily", Category::Medicine)
    }

    #[test]
    fn create_persists_images_and_sets_defaults() {
        let env = TestEnv::new();
        let tmp1 = env.picked("tmp1.jpg", b"first image");
        let tmp2 = env.picked("tmp2.jpg", b"second image");

        let record = env
            .records
            .create(medicine("Oxytetracycline").with_images(vec![tmp1.clone(), tmp2.clone()]))
            .unwrap();

        assert_eq!(record.images.len(), 2);
        assert!(!record.is_favorite);
        assert!(record.updated_at.is_none());
        assert_eq!(record.created_at, env.clock_now());
        for (image, source) in record.images.iter().zip([&tmp1, &tmp2]) {
            assert!(env.records.blobs().exists(image.path()));
            assert_eq!(fs::read(image.path()).unwrap(), fs::read(source).unwrap());
        }

        let stored = env.records.get(&record.id).unwrap();
        assert_eq!(stored, record);
    }

    #[test]
    fn create_drops_unreadable_image_but_saves_record() {
        let env = TestEnv::new();
        let good = env.picked("good.jpg", b"ok");
        let gone = env.root.join("evicted.jpg");

        let record = env
            .records
            .create(medicine("Ivermectin").with_images(vec![gone, good]))
            .unwrap();

        assert_eq!(record.images.len(), 1);
        assert_eq!(env.image_files().len(), 1);
    }

    #[test]
    fn create_rolls_back_images_when_save_fails() {
        let env = TestEnv::new();
        let tmp = env.picked("a.jpg", b"a");
        env.backend.set_simulate_write_error(true);

        let result = env.records.create(medicine("Penicillin").with_images(vec![tmp]));

        assert!(matches!(result, Err(HerdError::StorageUnavailable(_))));
        assert!(env.image_files().is_empty());
    }

    #[test]
    fn list_preserves_creation_order() {
        let env = TestEnv::new();
        for name in ["C", "A", "B"] {
            env.records.create(medicine(name)).unwrap();
        }
        let names: Vec<String> = env.records.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let env = TestEnv::new();
        let err = env.records.get(&Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, HerdError::NotFound(_)));
    }

    #[test]
    fn update_merges_fields_and_reconciles_images() {
        let env = TestEnv::new();
        let record = env
            .records
            .create(medicine("Old name").with_images(vec![
                env.picked("a.jpg", b"a"),
                env.picked("b.jpg", b"b"),
            ]))
            .unwrap();
        let kept = record.images[0].clone();
        let dropped = record.images[1].clone();
        env.advance_minutes(5);

        let updated = env
            .records
            .update(
                &record.id,
                RecordPatch {
                    name: Some("New name".into()),
                    images: Some(vec![
                        ImageRef::Permanent(kept.clone()),
                        ImageRef::Transient(env.picked("c.png", b"c")),
                    ]),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.name, "New name");
        assert_eq!(updated.details, record.details);
        assert_eq!(updated.created_at, record.created_at);
        assert_eq!(updated.updated_at, Some(env.clock_now()));
        assert_eq!(updated.images.len(), 2);
        assert_eq!(updated.images[0], kept);
        assert_eq!(fs::read(updated.images[1].path()).unwrap(), b"c");
        assert!(!dropped.path().exists());
        assert_eq!(env.image_files().len(), 2);
    }

    #[test]
    fn update_without_images_leaves_files_alone() {
        let env = TestEnv::new();
        let record = env
            .records
            .create(medicine("Name").with_images(vec![env.picked("a.jpg", b"a")]))
            .unwrap();

        let updated = env
            .records
            .update(
                &record.id,
                RecordPatch {
                    details: Some("5ml".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.images, record.images);
        assert!(record.images[0].path().exists());
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let env = TestEnv::new();
        let err = env
            .records
            .update(&Uuid::new_v4(), RecordPatch::default())
            .unwrap_err();
        assert!(matches!(err, HerdError::NotFound(_)));
    }

    #[test]
    fn update_copies_images_owned_by_another_record() {
        let env = TestEnv::new();
        let owner = env
            .records
            .create(medicine("Owner").with_images(vec![env.picked("a.jpg", b"a")]))
            .unwrap();
        let other = env.records.create(medicine("Other")).unwrap();

        let updated = env
            .records
            .update(
                &other.id,
                RecordPatch {
                    images: Some(vec![ImageRef::Permanent(owner.images[0].clone())]),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.images.len(), 1);
        assert_ne!(updated.images[0], owner.images[0]);
        assert_eq!(env.image_files().len(), 2);

        env.records.delete(&owner.id).unwrap();
        assert!(env.records.blobs().exists(updated.images[0].path()));
        assert_eq!(fs::read(updated.images[0].path()).unwrap(), b"a");
    }

    #[test]
    fn update_rehomes_permanent_refs_outside_image_dir() {
        let env = TestEnv::new();
        let record = env.records.create(medicine("Name")).unwrap();
        let outside = env.picked("outside.jpg", b"outside");
        let forged: PermanentRef =
            serde_json::from_value(serde_json::json!(outside.to_string_lossy())).unwrap();

        let updated = env
            .records
            .update(
                &record.id,
                RecordPatch {
                    images: Some(vec![ImageRef::Permanent(forged)]),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.images.len(), 1);
        assert!(env.records.blobs().is_managed(updated.images[0].path()));
        assert_eq!(fs::read(updated.images[0].path()).unwrap(), b"outside");
        assert!(outside.exists());
    }

    #[test]
    fn update_rolls_back_new_images_when_save_fails() {
        let env = TestEnv::new();
        let record = env
            .records
            .create(medicine("Name").with_images(vec![env.picked("a.jpg", b"a")]))
            .unwrap();
        env.backend.set_simulate_write_error(true);

        let result = env.records.update(
            &record.id,
            RecordPatch {
                images: Some(vec![ImageRef::Transient(env.picked("b.jpg", b"b"))]),
                ..Default::default()
            },
        );

        assert!(matches!(result, Err(HerdError::StorageUnavailable(_))));
        assert_eq!(env.image_files().len(), 1);
        assert!(record.images[0].path().exists());
        env.backend.set_simulate_write_error(false);
        assert_eq!(env.records.get(&record.id).unwrap(), record);
    }

    #[test]
    fn update_drops_unreadable_new_image() {
        let env = TestEnv::new();
        let record = env.records.create(medicine("Name")).unwrap();

        let updated = env
            .records
            .update(
                &record.id,
                RecordPatch {
                    images: Some(vec![
                        ImageRef::Transient(env.root.join("evicted.jpg")),
                        ImageRef::Transient(env.picked("b.jpg", b"b")),
                    ]),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.images.len(), 1);
        assert_eq!(fs::read(updated.images[0].path()).unwrap(), b"b");
        assert_eq!(env.records.get(&record.id).unwrap(), updated);
    }

    #[test]
    fn delete_cascades_to_own_images_only() {
        let env = TestEnv::new();
        let victim = env
            .records
            .create(medicine("Victim").with_images(vec![
                env.picked("a.jpg", b"a"),
                env.picked("b.jpg", b"b"),
            ]))
            .unwrap();
        let survivor = env
            .records
            .create(medicine("Survivor").with_images(vec![env.picked("c.jpg", b"c")]))
            .unwrap();

        assert!(env.records.delete(&victim.id).unwrap());

        for image in &victim.images {
            assert!(!image.path().exists());
        }
        assert!(survivor.images[0].path().exists());
        assert_eq!(env.records.list().unwrap(), vec![survivor]);
    }

    #[test]
    fn delete_unknown_id_returns_false() {
        let env = TestEnv::new();
        assert!(!env.records.delete(&Uuid::new_v4()).unwrap());
    }

    #[test]
    fn toggle_favorite_twice_restores_value() {
        let env = TestEnv::new();
        let record = env.records.create(medicine("Calcium borogluconate")).unwrap();

        env.advance_minutes(1);
        let first = env.records.toggle_favorite(&record.id).unwrap().unwrap();
        assert!(first.is_favorite);
        let first_update = first.updated_at.unwrap();

        env.advance_minutes(1);
        let second = env.records.toggle_favorite(&record.id).unwrap().unwrap();
        assert!(!second.is_favorite);
        assert!(second.updated_at.unwrap() > first_update);
    }

    #[test]
    fn toggle_favorite_unknown_id_is_none() {
        let env = TestEnv::new();
        assert!(env.records.toggle_favorite(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn list_favorites_filters() {
        let env = TestEnv::new();
        let a = env.records.create(medicine("A")).unwrap();
        env.records.create(medicine("B")).unwrap();
        env.records.toggle_favorite(&a.id).unwrap();

        let favorites = env.records.list_favorites().unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, a.id);
    }

    #[test]
    fn clear_drops_collection() {
        let env = TestEnv::new();
        env.records.create(medicine("A")).unwrap();
        env.records.clear().unwrap();
        assert_eq!(env.records.count().unwrap(), 0);
    }

    #[test]
    fn corrupt_collection_is_an_error_not_empty() {
        let env = TestEnv::new();
        env.backend.set(keys::RECORDS, "{not json").unwrap();
        assert!(matches!(
            env.records.list(),
            Err(HerdError::Serialization(_))
        ));
    }

    #[test]
    fn doctor_migrates_foreign_refs_and_removes_orphans() {
        let env = TestEnv::new();
        let record = env
            .records
            .create(medicine("A").with_images(vec![env.picked("a.jpg", b"a")]))
            .unwrap();

        // Simulate a record written by an older build that kept picker paths.
        let foreign = env.picked("legacy.jpg", b"legacy");
        let missing = env.root.join("evicted.jpg");
        let mut legacy = record.clone();
        legacy.id = Uuid::new_v4();
        legacy.images = vec![
            PermanentRef::new(foreign.clone()),
            PermanentRef::new(missing),
        ];
        let json = serde_json::to_string(&vec![record.clone(), legacy.clone()]).unwrap();
        env.backend.set(keys::RECORDS, &json).unwrap();
        fs::write(env.records.blobs().dir().join("stray.jpg"), b"stray").unwrap();

        let report = env.records.doctor().unwrap();

        assert_eq!(report.migrated, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.orphans_removed, 1);

        let repaired = env.records.get(&legacy.id).unwrap();
        assert_eq!(repaired.images.len(), 1);
        assert!(env.records.blobs().exists(repaired.images[0].path()));
        assert_eq!(fs::read(repaired.images[0].path()).unwrap(), b"legacy");
        assert_eq!(env.image_files().len(), 2);

        // Second pass has nothing to do.
        assert_eq!(env.records.doctor().unwrap(), DoctorReport::default());
    }

    #[test]
    fn concurrent_creates_do_not_lose_updates() {
        let env = TestEnv::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = env.records.clone();
                std::thread::spawn(move || store.create(medicine(&format!("R{}", i))).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(env.records.count().unwrap(), 8);
    }
}
