#![cfg_attr(docsrs, feature(doc_cfg))]
//! Install vendor device patches into a SEGGER J-Link / J-Flash installation.
//!
//! A patch bundle is a directory holding a `JLinkDevices.xml` next to one or
//! more algorithm folders. Applying it merges the device definitions into the
//! installation's `JLinkDevices.xml` and overlays the algorithm folder onto
//! the installation tree.
//!
//! ```rust,no_run
//! use jflash_patch::{discover, run_batch, ApplyOptions, AutoSelector, BatchControl, PathLocator};
//! use std::path::Path;
//!
//! let install_root = PathLocator::new().locate().expect("J-Flash installation");
//! let bundles = discover(Path::new("patchs"))?;
//! let mut log = |line: &str| println!("{line}");
//! let summary = run_batch(
//!     &bundles,
//!     &install_root,
//!     &mut AutoSelector,
//!     &ApplyOptions::default(),
//!     &BatchControl::new(),
//!     &mut log,
//! );
//! println!("{} applied, {} failed", summary.applied, summary.failed);
//! # Ok::<(), jflash_patch::PatchError>(())
//! ```
//!
//! All operations are synchronous and must not run concurrently against the
//! same installation root.

pub use jlink_xml as xml;

pub mod apply;
pub mod batch;
pub mod copy;
pub mod discover;
pub mod locate;
pub mod log;
pub mod merge;
pub mod select;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use apply::{apply_patch, ApplyOptions, ApplyReport};
pub use batch::{check_writable, run_batch, BatchControl, BatchSummary};
pub use copy::{merge_copy, CopyReport};
pub use discover::{default_patch_root, default_patch_root_candidates, discover, is_patch_bundle};
pub use locate::{is_installation_root, EnvSource, PathLocator, SystemEnv, JFLASH_EXECUTABLE};
pub use log::{LogSink, ERROR_PREFIX, WARNING_PREFIX};
pub use merge::{backup_path, merge_xml, MergeOptions, XmlMergeOutcome};
pub use select::{AutoSelector, FolderSelector, Selection, SelectionReason};

/// File name of the device registry, both in bundles and in the installation.
pub const DEVICES_FILE_NAME: &str = "JLinkDevices.xml";

/// Error type produced by the patch installer.
#[derive(Debug, Error)]
pub enum PatchError {
    /// A filesystem primitive failed.
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Directory traversal failed (permissions, symlink loops).
    #[error("walk: {0}")]
    Walk(#[from] walkdir::Error),
    /// A device-definition file is not well-formed.
    #[error("parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: xml::XmlError,
    },
    /// Serializing a merged document failed.
    #[error(transparent)]
    Xml(#[from] xml::XmlError),
    #[error("destination {} lies inside source {}", dest.display(), source_dir.display())]
    NestedDestination { source_dir: PathBuf, dest: PathBuf },
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("selected folder has no usable name: {}", .0.display())]
    UnnamedFolder(PathBuf),
}

impl PatchError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| PatchError::Io {
            action,
            path,
            source,
        }
    }
}
