//! Find patch bundles below a patch root.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{PatchError, DEVICES_FILE_NAME};

/// Conventional name of the folder holding patch bundles.
pub const PATCH_ROOT_DIR_NAME: &str = "patchs";

/// Immediate subdirectories of `root` that are patch bundles, sorted by path.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>, PatchError> {
    let mut bundles = Vec::new();
    for entry in fs::read_dir(root).map_err(PatchError::io("read directory", root))? {
        let entry = entry.map_err(PatchError::io("read directory", root))?;
        let path = entry.path();
        if is_patch_bundle(&path) {
            bundles.push(path);
        }
    }
    bundles.sort();
    debug!(root = %root.display(), count = bundles.len(), "discovered patch bundles");
    Ok(bundles)
}

/// A bundle holds `JLinkDevices.xml` and at least one subdirectory.
pub fn is_patch_bundle(dir: &Path) -> bool {
    dir.is_dir()
        && dir.join(DEVICES_FILE_NAME).is_file()
        && subdirectories(dir).map_or(false, |dirs| !dirs.is_empty())
}

/// Subdirectories of `dir`, sorted by path. Symlinks to directories count.
pub fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, PatchError> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(PatchError::io("read directory", dir))? {
        let path = entry.map_err(PatchError::io("read directory", dir))?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// First candidate directory that contains at least one bundle.
pub fn default_patch_root<I, P>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    candidates.into_iter().map(Into::into).find(|dir: &PathBuf| {
        dir.is_dir() && discover(dir).map_or(false, |bundles| !bundles.is_empty())
    })
}

/// Where to look for bundles when no patch root is given: the program's
/// directory, a `patchs` folder next to it, the working directory and a
/// `patchs` folder inside it.
pub fn default_patch_root_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(program_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let sibling = program_dir.join("..").join(PATCH_ROOT_DIR_NAME);
        candidates.push(program_dir);
        candidates.push(sibling);
    }
    if let Ok(cwd) = env::current_dir() {
        let nested = cwd.join(PATCH_ROOT_DIR_NAME);
        candidates.push(cwd);
        candidates.push(nested);
    }
    candidates
}
