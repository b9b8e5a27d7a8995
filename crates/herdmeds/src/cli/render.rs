//! # Rendering
//!
//! Every function here turns API results into a `String`; handlers print.
//! Functions that show relative times take `now` so tests can pin it.
//!
//! ## List Layout
//!
//! ```text
//! 3f2a91c0  ★ Oxytetracycline           Cow      Medicine      2 img   3 hours ago
//! ```
//!
//! Columns: short id, favorite marker, name (padded by display width so
//! non-Latin names line up), animal, category, image count, relative time.

use super::styles;
use chrono::{DateTime, Utc};
use herdmedsapp::backup::codec::ExportArtifact;
use herdmedsapp::backup::RestoreResult;
use herdmedsapp::model::{Category, Record};
use herdmedsapp::orchestrator::{BackupStats, StartupReport, VersionChange};
use herdmedsapp::store::records::DoctorReport;
use std::fmt::Write;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use uuid::Uuid;

pub const FAVORITE_MARKER: &str = "★";
pub const COL_NAME: usize = 28;
pub const COL_ANIMAL: usize = 8;
pub const COL_CATEGORY: usize = 12;

pub fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

pub fn time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    timeago::Formatter::new().convert(elapsed.to_std().unwrap_or_default())
}

/// Truncate to `width` display columns, then pad to exactly `width`.
fn fit(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    if text.width() > width {
        for c in text.chars() {
            let w = c.width().unwrap_or(0);
            if used + w + 1 > width {
                break;
            }
            out.push(c);
            used += w;
        }
        out.push('…');
        used += 1;
    } else {
        out.push_str(text);
        used = text.width();
    }
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

pub fn render_list(records: &[Record], favorites_only: bool, now: DateTime<Utc>) -> String {
    if records.is_empty() {
        return if favorites_only {
            "No favorites yet. Mark one with `herdmeds fav <id>`.\n".to_string()
        } else {
            "No records yet. Add one with `herdmeds add`.\n".to_string()
        };
    }

    let mut out = String::new();
    for record in records {
        let marker = if record.is_favorite {
            styles::favorite().apply_to(FAVORITE_MARKER).to_string()
        } else {
            " ".to_string()
        };
        let images = if record.images.is_empty() {
            "     ".to_string()
        } else {
            format!("{} img", record.images.len())
        };
        let _ = writeln!(
            out,
            "{}  {} {}  {:<ca$}  {:<cc$}  {}  {}",
            styles::id().apply_to(short_id(&record.id)),
            marker,
            fit(&record.name, COL_NAME),
            record.animal_type.as_str(),
            record.category.label(),
            styles::muted().apply_to(images),
            styles::time().apply_to(time_ago(record.last_modified(), now)),
            ca = COL_ANIMAL,
            cc = COL_CATEGORY,
        );
    }
    out
}

pub fn render_record(record: &Record, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let star = if record.is_favorite {
        format!(" {}", styles::favorite().apply_to(FAVORITE_MARKER))
    } else {
        String::new()
    };
    let _ = writeln!(out, "{}{}", styles::title().apply_to(&record.name), star);
    let _ = writeln!(out, "{}", styles::muted().apply_to(record.id));
    let _ = writeln!(out);
    let _ = writeln!(out, "Category:  {}", record.category.label());
    let _ = writeln!(out, "Animal:    {}", record.animal_type);
    let _ = writeln!(
        out,
        "Added:     {} {}",
        record.created_at.format("%Y-%m-%d %H:%M"),
        styles::time().apply_to(format!("({})", time_ago(record.created_at, now)))
    );
    if let Some(updated) = record.updated_at {
        let _ = writeln!(
            out,
            "Updated:   {} {}",
            updated.format("%Y-%m-%d %H:%M"),
            styles::time().apply_to(format!("({})", time_ago(updated, now)))
        );
    }

    let _ = writeln!(out, "\n{}", styles::heading().apply_to("Details"));
    let _ = writeln!(out, "{}", record.details);

    if record.category == Category::HomeRemedy {
        if let Some(method) = &record.preparation_method {
            let _ = writeln!(out, "\n{}", styles::heading().apply_to("Preparation"));
            let _ = writeln!(out, "{}", method);
        }
    }

    if !record.images.is_empty() {
        let _ = writeln!(out, "\n{}", styles::heading().apply_to("Images"));
        for (n, image) in record.images.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", n + 1, image);
        }
    }
    out
}

pub fn render_saved(verb: &str, record: &Record) -> String {
    format!(
        "{} {} {}\n",
        styles::success().apply_to(verb),
        record.name,
        styles::muted().apply_to(format!("({})", short_id(&record.id)))
    )
}

pub fn render_restore(result: &RestoreResult) -> String {
    let mut out = format!(
        "{} {} of {} record(s).\n",
        styles::success().apply_to("Restored"),
        result.restored_count,
        result.total_count
    );
    if result.error_count > 0 {
        let _ = writeln!(
            out,
            "{} {} record(s) could not be restored.",
            styles::warning().apply_to("Warning:"),
            result.error_count
        );
    }
    out
}

pub fn render_artifact(artifact: &ExportArtifact) -> String {
    format!(
        "{} {}\n",
        styles::success().apply_to("Wrote"),
        artifact.path.display()
    )
}

fn optional_time(ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match ts {
        Some(ts) => format!(
            "{} {}",
            ts.format("%Y-%m-%d %H:%M"),
            styles::time().apply_to(format!("({})", time_ago(ts, now)))
        ),
        None => styles::muted().apply_to("never").to_string(),
    }
}

pub fn render_stats(stats: &BackupStats, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Device:           {}", stats.device_id);
    let _ = writeln!(out, "Records:          {}", stats.current_record_count);
    let _ = writeln!(
        out,
        "Backup:           {}",
        match stats.backup_record_count {
            Some(n) => format!("{} record(s)", n),
            None => styles::muted().apply_to("none").to_string(),
        }
    );
    let _ = writeln!(out, "Backup taken:     {}", optional_time(stats.backup_timestamp, now));
    let _ = writeln!(out, "Last auto backup: {}", optional_time(stats.last_backup_at, now));
    if stats.backup_due {
        let _ = writeln!(out, "{}", styles::warning().apply_to("A backup is due."));
    }
    out
}

pub fn render_doctor(report: &DoctorReport) -> String {
    if *report == DoctorReport::default() {
        return "Everything looks fine.\n".to_string();
    }
    let mut out = String::new();
    if report.migrated > 0 {
        let _ = writeln!(out, "Moved {} image(s) into the image directory.", report.migrated);
    }
    if report.dropped > 0 {
        let _ = writeln!(
            out,
            "{} Dropped {} missing image(s).",
            styles::warning().apply_to("Warning:"),
            report.dropped
        );
    }
    if report.orphans_removed > 0 {
        let _ = writeln!(out, "Removed {} unreferenced image file(s).", report.orphans_removed);
    }
    out
}

pub fn render_startup(report: &StartupReport) -> String {
    let mut out = String::new();
    match &report.version {
        Some(VersionChange::FirstLaunch) => {
            let _ = writeln!(out, "First launch.");
        }
        Some(VersionChange::Updated { from, to }) => {
            let _ = writeln!(out, "Updated {} → {}.", from, to);
        }
        Some(VersionChange::Unchanged) | None => {}
    }
    if let Some(n) = report.restored_count {
        let _ = writeln!(out, "{} {} record(s) from backup.", styles::success().apply_to("Restored"), n);
    }
    if report.backed_up {
        let _ = writeln!(out, "Backup saved.");
    }
    let _ = writeln!(out, "{}", styles::muted().apply_to(&report.message));
    out
}
