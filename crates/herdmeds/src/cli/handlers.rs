//! Command handlers.
//!
//! Each handler validates what a form would validate, calls the API once or
//! twice, and prints a rendered result. Handlers never touch storage
//! directly.

use super::render;
use super::setup::{AddArgs, EditArgs};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use herdmedsapp::backup::RestoreMode;
use herdmedsapp::model::{Category, ImageRef, RecordDraft, RecordPatch};
use herdmedsapp::store::fs_backend::FsKvBackend;
use herdmedsapp::HerdApi;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub struct Context {
    pub api: HerdApi<FsKvBackend>,
    pub json: bool,
    pub now: DateTime<Utc>,
}

impl Context {
    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn max_images(&self) -> usize {
        self.api.config().max_images_per_record
    }
}

fn restore_mode(merge: bool) -> RestoreMode {
    if merge {
        RestoreMode::Merge
    } else {
        RestoreMode::Replace
    }
}

fn check_image_count(count: usize, max: usize) -> Result<()> {
    if count > max {
        bail!("A record can have at most {} images (got {})", max, count);
    }
    Ok(())
}

fn check_image_files(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        if !path.is_file() {
            bail!("Image not found: {}", path.display());
        }
    }
    Ok(())
}

fn check_preparation(category: Category, method: Option<&str>) -> Result<()> {
    let missing = method.map_or(true, |m| m.trim().is_empty());
    if category == Category::HomeRemedy && missing {
        bail!("Home remedies need a preparation method (--prep)");
    }
    Ok(())
}

pub fn add(ctx: &Context, args: AddArgs) -> Result<()> {
    let category = Category::from(args.category);
    if args.name.trim().is_empty() {
        bail!("Name cannot be empty");
    }
    check_preparation(category, args.preparation_method.as_deref())?;
    check_image_count(args.images.len(), ctx.max_images())?;
    check_image_files(&args.images)?;

    let mut draft = RecordDraft::new(args.name.trim(), args.animal, args.details, category)
        .with_images(args.images)
        .with_favorite(args.favorite);
    if let Some(method) = args.preparation_method {
        draft = draft.with_preparation_method(method);
    }

    let record = ctx.api.create(draft)?;
    if ctx.json {
        return ctx.print_json(&record);
    }
    print!("{}", render::render_saved("Added", &record));
    Ok(())
}

pub fn list(ctx: &Context, favorites: bool) -> Result<()> {
    let records = if favorites {
        ctx.api.list_favorites()?
    } else {
        ctx.api.list()?
    };
    if ctx.json {
        return ctx.print_json(&records);
    }
    print!("{}", render::render_list(&records, favorites, ctx.now));
    Ok(())
}

pub fn show(ctx: &Context, id: &str) -> Result<()> {
    let record = ctx.api.get(&ctx.api.resolve_id(id)?)?;
    if ctx.json {
        return ctx.print_json(&record);
    }
    print!("{}", render::render_record(&record, ctx.now));
    Ok(())
}

pub fn edit(ctx: &Context, args: EditArgs) -> Result<()> {
    let id = ctx.api.resolve_id(&args.id)?;
    let current = ctx.api.get(&id)?;

    let mut patch = RecordPatch {
        name: args.name.map(|n| n.trim().to_string()),
        animal_type: args.animal,
        details: args.details,
        category: args.category.map(Category::from),
        ..RecordPatch::default()
    };
    if args.clear_prep {
        patch.preparation_method = Some(None);
    } else if let Some(method) = args.preparation_method {
        patch.preparation_method = Some(Some(method));
    }

    if !args.add_images.is_empty() || !args.remove_images.is_empty() {
        let mut positions = args.remove_images.clone();
        positions.sort_unstable();
        positions.dedup();
        if let Some(bad) = positions.iter().find(|&&p| p == 0 || p > current.images.len()) {
            bail!(
                "No image at position {} ({} has {})",
                bad,
                current.name,
                current.images.len()
            );
        }

        let mut images: Vec<ImageRef> = current
            .images
            .iter()
            .enumerate()
            .filter(|(i, _)| !positions.contains(&(i + 1)))
            .map(|(_, p)| ImageRef::Permanent(p.clone()))
            .collect();
        check_image_files(&args.add_images)?;
        images.extend(args.add_images.into_iter().map(ImageRef::Transient));
        check_image_count(images.len(), ctx.max_images())?;
        patch.images = Some(images);
    }

    if patch.is_empty() {
        bail!("Nothing to change");
    }
    if matches!(&patch.name, Some(n) if n.is_empty()) {
        bail!("Name cannot be empty");
    }

    let category = patch.category.unwrap_or(current.category);
    let method = match &patch.preparation_method {
        Some(m) => m.as_deref(),
        None => current.preparation_method.as_deref(),
    };
    check_preparation(category, method)?;

    let record = ctx.api.update(&id, patch)?;
    if ctx.json {
        return ctx.print_json(&record);
    }
    print!("{}", render::render_saved("Updated", &record));
    Ok(())
}

pub fn delete(ctx: &Context, id: &str) -> Result<()> {
    let id = ctx.api.resolve_id(id)?;
    let record = ctx.api.get(&id)?;
    if !ctx.api.delete(&id)? {
        bail!("Record not found: {}", id);
    }
    print!("{}", render::render_saved("Deleted", &record));
    Ok(())
}

pub fn fav(ctx: &Context, id: &str) -> Result<()> {
    let id = ctx.api.resolve_id(id)?;
    let Some(record) = ctx.api.toggle_favorite(&id)? else {
        bail!("Record not found: {}", id);
    };
    let verb = if record.is_favorite {
        "Favorited"
    } else {
        "Unfavorited"
    };
    print!("{}", render::render_saved(verb, &record));
    Ok(())
}

pub fn backup(ctx: &Context) -> Result<()> {
    let snapshot = ctx.api.backup_now()?;
    println!("Backup saved ({} record(s)).", snapshot.total_count);
    Ok(())
}

pub fn restore(ctx: &Context, merge: bool) -> Result<()> {
    let Some(result) = ctx.api.restore_from_backup(restore_mode(merge))? else {
        bail!("No backup saved yet. Run `herdmeds backup` first.");
    };
    if ctx.json {
        return ctx.print_json(&result);
    }
    print!("{}", render::render_restore(&result));
    Ok(())
}

pub fn export(ctx: &Context, dir: &Path, snapshot: bool) -> Result<()> {
    let artifact = if snapshot {
        ctx.api.write_snapshot_file(dir)?
    } else {
        ctx.api.export_human_readable(dir)?
    };
    print!("{}", render::render_artifact(&artifact));
    Ok(())
}

pub fn import(ctx: &Context, file: &Path, merge: bool) -> Result<()> {
    let result = ctx.api.import_from_file(file, restore_mode(merge))?;
    if ctx.json {
        return ctx.print_json(&result);
    }
    print!("{}", render::render_restore(&result));
    Ok(())
}

pub fn stats(ctx: &Context) -> Result<()> {
    let stats = ctx.api.stats()?;
    if ctx.json {
        return ctx.print_json(&stats);
    }
    print!("{}", render::render_stats(&stats, ctx.now));
    Ok(())
}

pub fn doctor(ctx: &Context) -> Result<()> {
    let report = ctx.api.doctor()?;
    print!("{}", render::render_doctor(&report));
    Ok(())
}

pub fn startup(ctx: &Context) -> Result<()> {
    let report = ctx.api.reconcile_on_startup();
    print!("{}", render::render_startup(&report));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_count_limit() {
        assert!(check_image_count(3, 3).is_ok());
        assert!(check_image_count(4, 3).is_err());
    }

    #[test]
    fn remedies_need_preparation() {
        assert!(check_preparation(Category::Medicine, None).is_ok());
        assert!(check_preparation(Category::HomeRemedy, Some("Boil")).is_ok());
        assert!(check_preparation(Category::HomeRemedy, Some("  ")).is_err());
        assert!(check_preparation(Category::HomeRemedy, None).is_err());
    }

    #[test]
    fn missing_image_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.jpg");
        std::fs::write(&present, b"x").unwrap();
        assert!(check_image_files(&[present.clone()]).is_ok());
        assert!(check_image_files(&[present, dir.path().join("missing.jpg")]).is_err());
    }
}
