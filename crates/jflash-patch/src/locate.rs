//! Locate the J-Flash installation directory.

use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Environment variables naming the installation directory, checked in order.
pub const INSTALL_ENV_VARS: [&str; 3] = ["JLINK_HOME", "SEGGER_JLINK_PATH", "SEGGER_JLINK_HOME"];

/// Executable whose presence marks an installation directory.
#[cfg(windows)]
pub const JFLASH_EXECUTABLE: &str = "jflash.exe";
#[cfg(not(windows))]
pub const JFLASH_EXECUTABLE: &str = "JFlashExe";

#[cfg(windows)]
const DEFAULT_INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files\SEGGER\JLink",
    r"C:\Program Files (x86)\SEGGER\JLink",
];
#[cfg(not(windows))]
const DEFAULT_INSTALL_DIRS: &[&str] = &["/opt/SEGGER/JLink", "/usr/local/SEGGER/JLink"];

/// Read-only view of the process environment.
pub trait EnvSource {
    fn var_os(&self, key: &str) -> Option<OsString>;
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnv;

impl EnvSource for SystemEnv {
    fn var_os(&self, key: &str) -> Option<OsString> {
        env::var_os(key)
    }
}

impl EnvSource for HashMap<String, OsString> {
    fn var_os(&self, key: &str) -> Option<OsString> {
        self.get(key).cloned()
    }
}

/// Whether `dir` looks like an installation: it exists and contains the
/// J-Flash executable. The executable is never run.
pub fn is_installation_root(dir: &Path) -> bool {
    dir.is_dir() && dir.join(JFLASH_EXECUTABLE).is_file()
}

/// Finds the installation directory from the environment, `PATH` and the
/// conventional install locations, first match wins.
#[derive(Debug, Clone)]
pub struct PathLocator<E = SystemEnv> {
    env: E,
    default_dirs: Vec<PathBuf>,
}

impl PathLocator<SystemEnv> {
    pub fn new() -> Self {
        Self::with_env(SystemEnv)
    }
}

impl Default for PathLocator<SystemEnv> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EnvSource> PathLocator<E> {
    /// Locator reading variables from `env` instead of the process.
    pub fn with_env(env: E) -> Self {
        Self {
            env,
            default_dirs: DEFAULT_INSTALL_DIRS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Replace the conventional install locations probed last.
    pub fn default_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.default_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Return the first plausible installation directory, if any.
    pub fn locate(&self) -> Option<PathBuf> {
        self.from_env_vars()
            .or_else(|| self.from_search_path())
            .or_else(|| self.from_default_dirs())
    }

    fn from_env_vars(&self) -> Option<PathBuf> {
        INSTALL_ENV_VARS.iter().find_map(|key| {
            let dir = PathBuf::from(self.env.var_os(key)?);
            if dir.is_dir() {
                debug!(variable = *key, dir = %dir.display(), "installation from environment");
                Some(dir)
            } else {
                None
            }
        })
    }

    fn from_search_path(&self) -> Option<PathBuf> {
        let search_path = self.env.var_os("PATH")?;
        env::split_paths(&search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .find(|dir| dir.join(JFLASH_EXECUTABLE).is_file())
            .map(|dir| {
                debug!(dir = %dir.display(), "installation from PATH");
                dir
            })
    }

    fn from_default_dirs(&self) -> Option<PathBuf> {
        self.default_dirs.iter().find(|dir| dir.is_dir()).cloned()
    }
}
