//! Server configuration.

use std::path::PathBuf;

use savestate_storage::{SaveStatePaths, savestate_data_dir};

/// Default listen address. Loopback only: there is no authentication layer.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:55560";

/// Server process settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:55560").
    pub listen_addr: String,

    /// Data root. Falls back to `SAVESTATE_DATA_DIR`, then the platform data directory.
    pub data_dir: Option<PathBuf>,

    /// Managed working directory. Defaults to `<data_dir>/workspace`.
    pub workspace_dir: Option<PathBuf>,

    /// Settings document. Defaults to `<data_dir>/config.json`.
    pub config_file: Option<PathBuf>,

    /// Plugin installation checkout used by the update check.
    pub install_dir: Option<PathBuf>,

    /// Graceful shutdown timeout in seconds.
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            data_dir: None,
            workspace_dir: None,
            config_file: None,
            install_dir: None,
            shutdown_timeout: 30,
        }
    }
}

impl ServerConfig {
    /// Resolve the storage locations.
    pub fn paths(&self) -> savestate_storage::Result<SaveStatePaths> {
        let root = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => savestate_data_dir()?,
        };

        let mut paths = SaveStatePaths::from_root(root).with_install_dir(self.install_dir.clone());
        if let Some(dir) = &self.workspace_dir {
            paths = paths.with_workspace_dir(dir);
        }
        if let Some(file) = &self.config_file {
            paths = paths.with_config_file(file);
        }
        Ok(paths)
    }
}
