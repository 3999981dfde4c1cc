//! OS-aware path detection for SaveState storage.
//!
//! `SAVESTATE_DATA_DIR` overrides the platform data directory.

use std::path::PathBuf;
use tracing::debug;

use crate::error::{Result, StorageError};

/// Application name used for storage directories.
pub const APP_NAME: &str = "SaveState";

/// Directory under the data root that holds the managed working tree.
pub const WORKSPACE_DIR: &str = "workspace";
pub const CONFIG_FILE: &str = "config.json";

/// Storage root for SaveState.
pub fn savestate_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("SAVESTATE_DATA_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::data_dir()
        .map(|d| d.join(APP_NAME))
        .ok_or(StorageError::HomeDirNotFound)
}

/// Locations SaveState reads and writes.
#[derive(Debug, Clone)]
pub struct SaveStatePaths {
    /// Root data directory.
    pub data_dir: PathBuf,
    /// Managed working directory whose saves are checkpointed.
    pub workspace_dir: PathBuf,
    /// Settings document.
    pub config_file: PathBuf,
    /// Installation checkout used for self-update checks.
    pub install_dir: Option<PathBuf>,
}

impl SaveStatePaths {
    /// Paths with automatic OS detection.
    pub fn new() -> Result<Self> {
        Ok(Self::from_root(savestate_data_dir()?))
    }

    /// Paths under a custom root directory.
    pub fn from_root(data_dir: PathBuf) -> Self {
        Self {
            workspace_dir: data_dir.join(WORKSPACE_DIR),
            config_file: data_dir.join(CONFIG_FILE),
            install_dir: None,
            data_dir,
        }
    }

    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = path.into();
        self
    }

    pub fn with_install_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.install_dir = dir;
        self
    }

    /// Ensure the data, workspace and config directories exist.
    pub async fn ensure_dirs_async(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::create_dir_all(&self.workspace_dir).await?;
        if let Some(parent) = self.config_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!(data_dir = %self.data_dir.display(), "SaveState directories initialized");
        Ok(())
    }
}
