use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use jflash_patch::xml::UpdatePlacement;
use jflash_patch::{
    default_patch_root, default_patch_root_candidates, is_installation_root, MergeOptions,
    PathLocator, ERROR_PREFIX, JFLASH_EXECUTABLE, WARNING_PREFIX,
};

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialise JSON output")?;
    println!("{text}");
    Ok(())
}

pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| display_path(path))
}

/// Explicit `--jflash` directory, otherwise the located installation.
pub fn resolve_install_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let root = match explicit {
        Some(dir) => {
            if !dir.is_dir() {
                bail!("installation directory {} does not exist", dir.display());
            }
            dir
        }
        None => PathLocator::new().locate().ok_or_else(|| {
            anyhow!("no J-Flash installation found; pass --jflash or set JLINK_HOME")
        })?,
    };
    if is_installation_root(&root) {
        info!(root = %root.display(), "using installation");
    } else {
        warn!(
            root = %root.display(),
            executable = JFLASH_EXECUTABLE,
            "directory does not contain the J-Flash executable"
        );
    }
    Ok(root)
}

/// Explicit `--patches` directory, otherwise the first default location
/// holding bundles.
pub fn resolve_patch_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => default_patch_root(default_patch_root_candidates()).ok_or_else(|| {
            anyhow!("no patch bundles next to the program or in the working directory; pass --patches")
        }),
    }
}

pub fn merge_options(no_backup: bool, keep_position: bool) -> MergeOptions {
    MergeOptions {
        backup: !no_backup,
        placement: if keep_position {
            UpdatePlacement::InPlace
        } else {
            UpdatePlacement::Append
        },
    }
}

/// Human readable lines go to stdout, or to stderr when stdout carries JSON.
/// Problems always go to stderr.
pub fn emit_line(line: &str, json: bool) {
    if json || line.starts_with(WARNING_PREFIX) || line.starts_with(ERROR_PREFIX) {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}
