//! Markdown rendering of a snapshot for people, not for re-import.

use super::{Snapshot, SnapshotRecord};
use crate::model::Category;
use std::fmt::Write;

const DATE_FORMAT: &str = "%d %b %Y";

pub fn render_report(snapshot: &Snapshot) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "# Herd Medicine Records\n");
    let _ = writeln!(out, "| | |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Device | `{}` |", snapshot.device_id);
    let _ = writeln!(
        out,
        "| Exported | {} |",
        snapshot.timestamp.format("%d %b %Y %H:%M UTC")
    );
    let _ = writeln!(out, "| Records | {} |", snapshot.total_count);
    if !snapshot.app_version.is_empty() {
        let _ = writeln!(out, "| App version | {} |", snapshot.app_version);
    }

    if snapshot.records.is_empty() {
        let _ = writeln!(out, "\n_No records._");
        return out;
    }

    for (n, record) in snapshot.records.iter().enumerate() {
        render_record(&mut out, n + 1, record);
    }
    out
}

fn render_record(out: &mut String, n: usize, record: &SnapshotRecord) {
    let star = if record.is_favorite { " ★" } else { "" };
    let _ = writeln!(out, "\n## {}. {}{}\n", n, record.name, star);
    let _ = writeln!(out, "- **Category:** {}", record.category.label());
    let _ = writeln!(out, "- **Animal:** {}", record.animal_type);
    if let Some(created) = record.created_at {
        let _ = writeln!(out, "- **Added:** {}", created.format(DATE_FORMAT));
    }
    if let Some(updated) = record.updated_at {
        let _ = writeln!(out, "- **Updated:** {}", updated.format(DATE_FORMAT));
    }
    let _ = writeln!(out, "- **Images:** {}", record.images.len());

    let _ = writeln!(out, "\n### Details\n\n{}", record.details.trim());

    if record.category == Category::HomeRemedy {
        if let Some(method) = record.preparation_method.as_deref().filter(|m| !m.trim().is_empty()) {
            let _ = writeln!(out, "\n### Preparation\n\n{}", method.trim());
        }
    }
}
