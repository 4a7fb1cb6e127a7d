//! Choosing the algorithm folder of a bundle.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::discover::subdirectories;

/// Folder names preferred by the automatic heuristic, in priority order.
pub const PREFERRED_FOLDERS: [&str; 2] = ["JLinkDevices", "Devices"];

/// Why a folder was selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    /// The folder carries one of the [`PREFERRED_FOLDERS`] names.
    Preferred,
    /// The bundle has exactly one subdirectory.
    OnlyCandidate,
    /// Arbitrary pick of the first folder among `candidates`.
    FirstOfMany { candidates: usize },
    /// Decided by the caller (closure or interactive prompt).
    Chosen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub path: PathBuf,
    pub reason: SelectionReason,
}

impl Selection {
    pub fn new(path: impl Into<PathBuf>, reason: SelectionReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }
}

/// Decides which subdirectory of a bundle is installed.
///
/// Returning `None` means no folder is installed for that bundle; the device
/// XML is still merged.
pub trait FolderSelector {
    fn select(&mut self, bundle: &Path) -> Option<Selection>;
}

impl<F> FolderSelector for F
where
    F: FnMut(&Path) -> Option<PathBuf>,
{
    fn select(&mut self, bundle: &Path) -> Option<Selection> {
        self(bundle).map(|path| Selection::new(path, SelectionReason::Chosen))
    }
}

/// Non-interactive heuristic: `JLinkDevices`, then `Devices`, then the only
/// subdirectory, then the first one by name.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoSelector;

impl AutoSelector {
    pub fn choose(bundle: &Path) -> Option<Selection> {
        let dirs = match subdirectories(bundle) {
            Ok(dirs) => dirs,
            Err(err) => {
                warn!(bundle = %bundle.display(), %err, "cannot list bundle folders");
                return None;
            }
        };
        for preferred in PREFERRED_FOLDERS {
            if let Some(dir) = dirs
                .iter()
                .find(|dir| dir.file_name().map_or(false, |name| name == preferred))
            {
                return Some(Selection::new(dir.clone(), SelectionReason::Preferred));
            }
        }
        let candidates = dirs.len();
        let first = dirs.into_iter().next()?;
        let reason = if candidates == 1 {
            SelectionReason::OnlyCandidate
        } else {
            SelectionReason::FirstOfMany { candidates }
        };
        Some(Selection::new(first, reason))
    }
}

impl FolderSelector for AutoSelector {
    fn select(&mut self, bundle: &Path) -> Option<Selection> {
        Self::choose(bundle)
    }
}
