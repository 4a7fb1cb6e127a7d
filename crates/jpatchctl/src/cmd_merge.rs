use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use jflash_patch::merge_xml;
use jflash_patch::XmlMergeOutcome;

use crate::common;

#[derive(Serialize)]
struct MergeSummary {
    target: String,
    outcome: &'static str,
    added: usize,
    updated: usize,
    unnamed: usize,
}

pub fn run(
    target: PathBuf,
    source: PathBuf,
    no_backup: bool,
    keep_position: bool,
    json: bool,
) -> Result<()> {
    let options = common::merge_options(no_backup, keep_position);
    let mut sink = |line: &str| common::emit_line(line, json);
    let outcome = merge_xml(&target, &source, &options, &mut sink)
        .with_context(|| format!("merge {} into {}", source.display(), target.display()))?;

    let (label, added, updated, unnamed) = match &outcome {
        XmlMergeOutcome::SourceMissing => ("source-missing", 0, 0, 0),
        XmlMergeOutcome::Created => ("created", 0, 0, 0),
        XmlMergeOutcome::Merged(report) => {
            ("merged", report.added(), report.updated(), report.unnamed())
        }
        XmlMergeOutcome::ParseFailed { .. } => ("parse-failed", 0, 0, 0),
    };
    if json {
        common::print_json(&MergeSummary {
            target: common::display_path(&target),
            outcome: label,
            added,
            updated,
            unnamed,
        })?;
    }
    if let XmlMergeOutcome::ParseFailed { path, detail } = outcome {
        bail!("{} is not well-formed: {detail}", path.display());
    }
    Ok(())
}
