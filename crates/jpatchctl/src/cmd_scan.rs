use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use jflash_patch::{discover, AutoSelector, SelectionReason};

use crate::common;

#[derive(Serialize)]
struct BundleEntry {
    index: usize,
    name: String,
    path: String,
    folder: Option<String>,
    reason: Option<&'static str>,
}

fn reason_label(reason: &SelectionReason) -> &'static str {
    match reason {
        SelectionReason::Preferred => "preferred",
        SelectionReason::OnlyCandidate => "only",
        SelectionReason::FirstOfMany { .. } => "first",
        SelectionReason::Chosen => "chosen",
    }
}

pub fn run(patches: Option<PathBuf>, json: bool) -> Result<()> {
    let root = common::resolve_patch_root(patches)?;
    let bundles =
        discover(&root).with_context(|| format!("scan patch directory {}", root.display()))?;
    info!(root = %root.display(), count = bundles.len(), "scanned patch directory");

    let entries: Vec<BundleEntry> = bundles
        .iter()
        .enumerate()
        .map(|(index, bundle)| {
            let selection = AutoSelector::choose(bundle);
            BundleEntry {
                index,
                name: common::file_name(bundle),
                path: common::display_path(bundle),
                folder: selection.as_ref().map(|s| common::file_name(&s.path)),
                reason: selection.as_ref().map(|s| reason_label(&s.reason)),
            }
        })
        .collect();

    if json {
        return common::print_json(&entries);
    }

    if entries.is_empty() {
        println!("No patch bundles in {}.", root.display());
        return Ok(());
    }

    println!("{:<6} {:<24} {:<20} {}", "INDEX", "Bundle", "Folder", "Reason");
    for entry in &entries {
        println!(
            "{:<6} {:<24} {:<20} {}",
            entry.index,
            entry.name,
            entry.folder.as_deref().unwrap_or("-"),
            entry.reason.unwrap_or("-"),
        );
    }
    Ok(())
}
