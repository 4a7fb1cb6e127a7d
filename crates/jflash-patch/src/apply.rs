//! Apply one patch bundle to an installation.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::copy::{merge_copy, CopyReport};
use crate::log::{self, LogSink};
use crate::merge::{merge_xml, MergeOptions, XmlMergeOutcome};
use crate::select::{FolderSelector, Selection, SelectionReason};
use crate::{PatchError, DEVICES_FILE_NAME};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub merge: MergeOptions,
}

/// Result of both steps of one bundle. Each step is attempted independently.
#[derive(Debug)]
pub struct ApplyReport {
    pub bundle: PathBuf,
    pub selection: Option<Selection>,
    pub xml: Result<XmlMergeOutcome, PatchError>,
    /// `None` when no folder was selected.
    pub copy: Option<Result<CopyReport, PatchError>>,
}

impl ApplyReport {
    /// Both steps ran and neither failed.
    pub fn is_success(&self) -> bool {
        let xml_ok = matches!(&self.xml, Ok(outcome) if !outcome.is_failure());
        let copy_ok = matches!(&self.copy, Some(Ok(_)));
        xml_ok && copy_ok
    }
}

/// Merge `<bundle>/JLinkDevices.xml` into `<install_root>/JLinkDevices.xml`
/// and copy the selected algorithm folder to `<install_root>/<folder name>`.
///
/// The selector runs first so interactive choices happen before anything is
/// written. The XML merge is attempted even when no folder is selected.
pub fn apply_patch(
    bundle: &Path,
    install_root: &Path,
    selector: &mut dyn FolderSelector,
    options: &ApplyOptions,
    sink: &mut dyn LogSink,
) -> ApplyReport {
    let selection = selector.select(bundle);
    match &selection {
        None => log::error(
            sink,
            format_args!(
                "no device folder selected in {}, folder copy skipped",
                bundle.display()
            ),
        ),
        Some(selection) => {
            if let SelectionReason::FirstOfMany { candidates } = selection.reason {
                log::warning(
                    sink,
                    format_args!(
                        "{candidates} subfolders found, using the first: {}",
                        selection.path.display()
                    ),
                );
            }
            log::info(
                sink,
                format_args!("device folder: {}", selection.path.display()),
            );
        }
    }

    let xml = merge_xml(
        &install_root.join(DEVICES_FILE_NAME),
        &bundle.join(DEVICES_FILE_NAME),
        &options.merge,
        sink,
    );
    if let Err(err) = &xml {
        log::error(sink, format_args!("XML merge failed: {err}"));
    }

    let copy = selection.as_ref().map(|selection| {
        let result = match selection.path.file_name() {
            Some(name) => merge_copy(&selection.path, &install_root.join(name), sink),
            None => Err(PatchError::UnnamedFolder(selection.path.clone())),
        };
        if let Err(err) = &result {
            log::error(sink, format_args!("folder copy failed: {err}"));
        }
        result
    });

    let report = ApplyReport {
        bundle: bundle.to_path_buf(),
        selection,
        xml,
        copy,
    };
    debug!(bundle = %bundle.display(), success = report.is_success(), "bundle applied");
    report
}
