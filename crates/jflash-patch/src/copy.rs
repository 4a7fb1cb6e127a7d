//! Union-merge of an algorithm folder into the installation tree.

use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::log::{self, LogSink};
use crate::PatchError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// The destination did not exist before the copy.
    pub created: bool,
    pub files: usize,
    /// Files that replaced an existing destination file.
    pub overwritten: usize,
    /// Directories created under the destination, including the root.
    pub directories: usize,
}

/// Copy the tree under `source` into `dest`.
///
/// Existing files at the same relative path are overwritten, files that only
/// exist under `dest` are left alone and nothing is ever deleted. Permissions
/// and modification times are carried over where the platform allows it.
pub fn merge_copy(
    source: &Path,
    dest: &Path,
    sink: &mut dyn LogSink,
) -> Result<CopyReport, PatchError> {
    if !source.is_dir() {
        return Err(PatchError::NotADirectory(source.to_path_buf()));
    }
    reject_nested(source, dest)?;

    let mut report = CopyReport {
        created: !dest.exists(),
        ..CopyReport::default()
    };
    // Directory permissions are applied last so read-only folders still
    // accept their contents.
    let mut new_dirs: Vec<(PathBuf, PathBuf)> = Vec::new();

    for entry in WalkDir::new(source).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = if relative.as_os_str().is_empty() {
            dest.to_path_buf()
        } else {
            dest.join(relative)
        };

        if entry.file_type().is_dir() {
            if !target.is_dir() {
                fs::create_dir_all(&target).map_err(PatchError::io("create directory", &target))?;
                report.directories += 1;
                new_dirs.push((entry.path().to_path_buf(), target));
            }
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(PatchError::io("create directory", parent))?;
        }
        if target.exists() {
            report.overwritten += 1;
        }
        copy_file(entry.path(), &target)?;
        report.files += 1;
    }

    for (from, to) in new_dirs.iter().rev() {
        let permissions = fs::metadata(from)
            .map_err(PatchError::io("read metadata", from))?
            .permissions();
        fs::set_permissions(to, permissions).map_err(PatchError::io("set permissions", to))?;
    }

    debug!(
        source = %source.display(),
        dest = %dest.display(),
        files = report.files,
        overwritten = report.overwritten,
        "copied algorithm folder"
    );
    if report.created {
        log::info(sink, format_args!("created {}", dest.display()));
    } else {
        log::info(
            sink,
            format_args!(
                "merged folder into {} ({} files, {} overwritten)",
                dest.display(),
                report.files,
                report.overwritten
            ),
        );
    }
    Ok(report)
}

fn copy_file(from: &Path, to: &Path) -> Result<(), PatchError> {
    fs::copy(from, to).map_err(PatchError::io("copy", from))?;
    let modified = fs::metadata(from)
        .and_then(|meta| meta.modified())
        .map_err(PatchError::io("read metadata", from))?;
    // Timestamps are best effort: read-only copies may refuse a write handle.
    let handle = File::options().write(true).open(to).or_else(|_| File::open(to));
    if let Err(err) = handle.and_then(|file| file.set_modified(modified)) {
        debug!(path = %to.display(), %err, "modification time not preserved");
    }
    Ok(())
}

fn reject_nested(source: &Path, dest: &Path) -> Result<(), PatchError> {
    let source_dir = source
        .canonicalize()
        .map_err(PatchError::io("resolve", source))?;
    let dest_abs = resolve_existing_prefix(dest);
    if dest_abs.starts_with(&source_dir) {
        return Err(PatchError::NestedDestination {
            source_dir,
            dest: dest.to_path_buf(),
        });
    }
    Ok(())
}

/// Canonicalize the longest existing ancestor of `path` and re-append the
/// rest, so paths that do not exist yet can be compared.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(resolved) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(resolved, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}
