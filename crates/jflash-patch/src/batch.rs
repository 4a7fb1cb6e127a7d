//! Sequential application of several bundles with cooperative cancellation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::apply::{apply_patch, ApplyOptions};
use crate::log::{self, LogSink};
use crate::select::FolderSelector;
use crate::PatchError;

/// Name of the throwaway file used by [`check_writable`].
pub const WRITE_PROBE_FILE: &str = "__jflash_patch_test.tmp";

#[derive(Debug, Default)]
struct ControlState {
    cancel: AtomicBool,
    started: AtomicUsize,
    finished: AtomicUsize,
}

/// Shared handle between a running batch and the thread that wants to stop it.
///
/// Cancellation is only honoured between bundles: a bundle that has started
/// always runs both of its steps.
#[derive(Debug, Clone, Default)]
pub struct BatchControl {
    state: Arc<ControlState>,
}

impl BatchControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the batch to stop before the next bundle.
    pub fn cancel(&self) {
        self.state.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancel.load(Ordering::SeqCst)
    }

    /// Number of bundles whose application has begun.
    pub fn started(&self) -> usize {
        self.state.started.load(Ordering::SeqCst)
    }

    /// Number of bundles whose application has completed.
    pub fn finished(&self) -> usize {
        self.state.finished.load(Ordering::SeqCst)
    }

    /// A bundle is being applied right now and will not be interrupted.
    pub fn in_progress(&self) -> bool {
        self.started() > self.finished()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub applied: usize,
    pub failed: usize,
    /// Bundles skipped because the batch was cancelled.
    pub not_started: usize,
    pub cancelled: bool,
}

/// Apply `bundles` one after another. A failing bundle never stops the batch.
pub fn run_batch(
    bundles: &[PathBuf],
    install_root: &Path,
    selector: &mut dyn FolderSelector,
    options: &ApplyOptions,
    control: &BatchControl,
    sink: &mut dyn LogSink,
) -> BatchSummary {
    let mut summary = BatchSummary {
        total: bundles.len(),
        ..BatchSummary::default()
    };

    for (index, bundle) in bundles.iter().enumerate() {
        if control.is_cancelled() {
            summary.cancelled = true;
            summary.not_started = bundles.len() - index;
            log::info(sink, "cancelled by user, stopping");
            break;
        }

        control.state.started.fetch_add(1, Ordering::SeqCst);
        let name = bundle
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| bundle.to_string_lossy());
        log::info(
            sink,
            format_args!("--- processing ({}/{}): {name} ---", index + 1, bundles.len()),
        );
        let report = apply_patch(bundle, install_root, selector, options, sink);
        if report.is_success() {
            summary.applied += 1;
        } else {
            summary.failed += 1;
        }
        control.state.finished.fetch_add(1, Ordering::SeqCst);
        debug!(index, bundle = %bundle.display(), success = report.is_success(), "bundle done");
    }

    info!(
        total = summary.total,
        applied = summary.applied,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "batch finished"
    );
    log::info(sink, "all operations finished");
    log::info(
        sink,
        "hint: restart J-Flash if it is running so the device list is reloaded",
    );
    summary
}

/// Fail fast when `dir` cannot be written, by creating and removing a probe
/// file.
pub fn check_writable(dir: &Path) -> Result<(), PatchError> {
    if !dir.is_dir() {
        return Err(PatchError::NotADirectory(dir.to_path_buf()));
    }
    let probe = dir.join(WRITE_PROBE_FILE);
    fs::write(&probe, b"test").map_err(PatchError::io("write", &probe))?;
    fs::remove_file(&probe).map_err(PatchError::io("remove", &probe))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Lines;
    use crate::select::AutoSelector;
    use crate::DEVICES_FILE_NAME;

    fn bundle(root: &Path, name: &str, device: &str) -> PathBuf {
        let dir = root.join("patchs").join(name);
        fs::create_dir_all(dir.join("Devices").join(name)).expect("bundle");
        fs::write(
            dir.join(DEVICES_FILE_NAME),
            format!(r#"<DataBase><Device Name="{device}"/></DataBase>"#),
        )
        .expect("xml");
        fs::write(dir.join("Devices").join(name).join("algo.FLM"), name).expect("flm");
        dir
    }

    fn install(root: &Path) -> PathBuf {
        let dir = root.join("JLink");
        fs::create_dir_all(&dir).expect("install");
        dir
    }

    #[test]
    fn failures_are_isolated_per_bundle() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let install = install(tmp.path());
        let good = bundle(tmp.path(), "GD32", "GD32F303");
        let missing = tmp.path().join("patchs/Gone");
        let later = bundle(tmp.path(), "AT32", "AT32F403");

        let mut lines = Lines::default();
        let summary = run_batch(
            &[good, missing, later],
            &install,
            &mut AutoSelector,
            &ApplyOptions::default(),
            &BatchControl::new(),
            &mut lines,
        );

        assert_eq!(summary.total, 3);
        assert_eq!((summary.applied, summary.failed), (2, 1));
        assert!(!summary.cancelled);
        assert!(install.join("Devices/GD32/algo.FLM").is_file());
        assert!(install.join("Devices/AT32/algo.FLM").is_file());
        assert!(lines.contains("--- processing (3/3): AT32 ---"));
        assert!(lines.contains("restart J-Flash"));
    }

    #[test]
    fn cancellation_stops_between_bundles() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let install = install(tmp.path());
        let bundles = vec![
            bundle(tmp.path(), "A", "DevA"),
            bundle(tmp.path(), "B", "DevB"),
            bundle(tmp.path(), "C", "DevC"),
        ];
        let control = BatchControl::new();
        let trigger = control.clone();
        let mut calls = 0;
        let mut selector = |dir: &Path| {
            calls += 1;
            // Cancelling mid-bundle must not abort the bundle in progress.
            assert!(trigger.in_progress());
            trigger.cancel();
            AutoSelector::choose(dir).map(|selection| selection.path)
        };

        let mut lines = Lines::default();
        let summary = run_batch(
            &bundles,
            &install,
            &mut selector,
            &ApplyOptions::default(),
            &control,
            &mut lines,
        );

        assert_eq!(calls, 1);
        assert!(summary.cancelled);
        assert_eq!((summary.applied, summary.not_started), (1, 2));
        assert_eq!((control.started(), control.finished()), (1, 1));
        assert!(!control.in_progress());
        assert!(install.join("Devices/A/algo.FLM").is_file());
        assert!(!install.join("Devices/B").exists());
        assert!(lines.contains("cancelled by user"));
    }

    #[test]
    fn later_bundles_overwrite_earlier_devices() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let install = install(tmp.path());
        let first = bundle(tmp.path(), "One", "Shared");
        let second = bundle(tmp.path(), "Two", "Shared");

        let summary = run_batch(
            &[first, second],
            &install,
            &mut AutoSelector,
            &ApplyOptions::default(),
            &BatchControl::new(),
            &mut Lines::default(),
        );
        assert_eq!(summary.applied, 2);
        let xml = fs::read_to_string(install.join(DEVICES_FILE_NAME)).expect("xml");
        assert_eq!(xml.matches("Shared").count(), 1);
    }

    #[test]
    fn writable_probe_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().expect("tempdir");
        check_writable(tmp.path()).expect("writable");
        assert!(!tmp.path().join(WRITE_PROBE_FILE).exists());
        assert!(matches!(
            check_writable(&tmp.path().join("absent")),
            Err(PatchError::NotADirectory(_))
        ));
    }
}
