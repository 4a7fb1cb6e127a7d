//! J-Flash device patch installer.
//!
//! Re-exports the workspace crates: [`xml`] for the `JLinkDevices.xml` tree
//! and registry merge, [`patch`] for locating installations and applying
//! patch bundles. The `jpatchctl` binary is the command-line front-end.

pub use jflash_patch as patch;
pub use jlink_xml as xml;

pub use jflash_patch::{apply_patch, discover, run_batch, PatchError, PathLocator};
