//! The checkpoint lifecycle engine.
//!
//! Each public operation lives in its own module as an `impl` block on
//! [`CheckpointEngine`]. Mutating operations go through
//! [`CheckpointEngine::exclusive`], which takes the operation lock, contains
//! panics and releases the lock on every path.

mod authorize;
mod create;
mod delete;
mod diff;
mod interrupted;
mod list;
mod load;
mod ops;
mod overwrite;
mod rename;
mod status;
mod update;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use savestate_git::{GitIdentity, GitRunner};
use savestate_storage::{ConfigStore, SaveStateConfig, SaveStatePaths};
use tracing::error;

use crate::codec::{MAX_NAME_BYTES, TagId};
use crate::error::{EngineError, Result};
use crate::lock::OperationLock;

pub use authorize::AuthorizeReport;
pub use create::CreatedCheckpoint;
pub use delete::DeleteReport;
pub use diff::{DiffReport, EMPTY_TREE};
pub use interrupted::InterruptedWorkReport;
pub use load::LoadReport;
pub use overwrite::{OverwriteMode, OverwriteReport};
pub use rename::RenameReport;
pub use status::EngineStatus;
pub use update::UpdateReport;

/// Owns the operation lock and the configuration store for one managed directory.
#[derive(Debug)]
pub struct CheckpointEngine {
    paths: SaveStatePaths,
    config: Arc<ConfigStore>,
    lock: OperationLock,
    git_binary: Option<PathBuf>,
}

impl CheckpointEngine {
    pub fn new(paths: SaveStatePaths, config: Arc<ConfigStore>) -> Self {
        Self {
            paths,
            config,
            lock: OperationLock::new(),
            git_binary: None,
        }
    }

    /// Run a specific git executable instead of `git` from `PATH`.
    pub fn with_git_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.git_binary = Some(binary.into());
        self
    }

    /// Create the directories and load the settings document.
    pub async fn open(paths: SaveStatePaths) -> Result<Self> {
        paths.ensure_dirs_async().await?;
        let config = ConfigStore::open(&paths.config_file).await?;
        Ok(Self::new(paths, Arc::new(config)))
    }

    pub fn paths(&self) -> &SaveStatePaths {
        &self.paths
    }

    pub fn config_store(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn lock(&self) -> &OperationLock {
        &self.lock
    }

    /// Name of the operation currently in flight.
    pub fn current_operation(&self) -> Option<&'static str> {
        self.lock.current()
    }

    /// Runner for the managed directory, carrying the token and the
    /// synthesized identity from `config`.
    fn git(&self, config: &SaveStateConfig) -> GitRunner {
        let runner = GitRunner::new(&self.paths.workspace_dir)
            .with_access_token(config.access_token().map(str::to_string))
            .with_identity(GitIdentity::new(
                config.author_name(),
                config.author_email(),
            ));
        match &self.git_binary {
            Some(binary) => runner.with_binary(binary),
            None => runner,
        }
    }

    /// Run `body` while holding the operation lock.
    async fn exclusive<T, F>(&self, operation: &'static str, body: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _guard = self.lock.try_acquire(operation)?;

        match AssertUnwindSafe(body).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(operation, panic = %message, "Operation panicked");
                Err(EngineError::Internal(format!("{operation} failed: {message}")))
            }
        }
    }

    /// Settings, provided the remote has been authorized.
    async fn authorized_config(&self) -> Result<SaveStateConfig> {
        let config = self.config.get().await;
        if !config.is_authorized {
            return Err(EngineError::NotAuthorized);
        }
        Ok(config)
    }

    /// A fresh tag identity for `name` that does not exist locally yet.
    async fn unused_tag_id(&self, git: &GitRunner, name: &str) -> TagId {
        let mut id = TagId::new(Utc::now().timestamp_millis(), name);
        while ops::tag_exists(git, &id.as_tag()).await {
            id = id.bumped();
        }
        id
    }
}

/// Trimmed checkpoint name, rejected when empty or too long for a tag.
fn checkpoint_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidInput(
            "checkpoint name must not be empty".into(),
        ));
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(EngineError::InvalidInput(format!(
            "checkpoint name must be at most {MAX_NAME_BYTES} bytes, got {}",
            name.len()
        )));
    }
    Ok(name)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
