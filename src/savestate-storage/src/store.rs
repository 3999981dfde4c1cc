//! The settings document on disk.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::{ConfigPatch, PatchEffect, SaveStateConfig};
use crate::error::{Result, StorageError};

/// Serialized access to `config.json`.
///
/// Reads are served from memory. Every change is written to disk before it
/// becomes visible to readers, so a failed write leaves both unchanged.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<SaveStateConfig>,
}

impl ConfigStore {
    /// Load the document at `path`. A missing or unreadable document yields defaults.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.file_name().is_none() {
            return Err(StorageError::InvalidPath(path));
        }
        let config = read_or_default(&path).await?;
        Ok(Self {
            path,
            current: RwLock::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current settings.
    pub async fn get(&self) -> SaveStateConfig {
        self.current.read().await.clone()
    }

    /// Mutate the settings and persist them.
    pub async fn update<R>(&self, f: impl FnOnce(&mut SaveStateConfig) -> R) -> Result<R> {
        let mut guard = self.current.write().await;
        let mut next = guard.clone();
        let result = f(&mut next);
        if next != *guard {
            write_atomic(&self.path, &next).await?;
            *guard = next;
        }
        Ok(result)
    }

    /// Apply user-edited settings.
    pub async fn merge(&self, patch: ConfigPatch) -> Result<PatchEffect> {
        let effect = self.update(|config| patch.apply(config)).await?;
        if effect.connection_changed {
            debug!("Remote connection changed, authorization revoked");
        }
        Ok(effect)
    }

    /// Re-read the document from disk.
    pub async fn reload(&self) -> Result<SaveStateConfig> {
        let config = read_or_default(&self.path).await?;
        *self.current.write().await = config.clone();
        Ok(config)
    }
}

async fn read_or_default(path: &Path) -> Result<SaveStateConfig> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(SaveStateConfig::default());
        }
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        return Ok(SaveStateConfig::default());
    }

    match serde_json::from_str(&content) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Settings file is corrupt, using defaults");
            Ok(SaveStateConfig::default())
        }
    }
}

/// Write to a sibling temp file, fsync, then rename over the target.
async fn write_atomic(path: &Path, config: &SaveStateConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            if let Ok(dir) = fs::File::open(parent).await {
                let _ = dir.sync_all().await;
            }
        }
    }

    debug!(path = %path.display(), "Settings saved");
    Ok(())
}
