use savestate_git::is_work_tree;
use savestate_storage::{CurrentSave, SaveRecord};
use serde::Serialize;
use tracing::warn;

use super::interrupted::find_entry;
use super::{CheckpointEngine, ops};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngineStatus {
    /// The managed directory is a git work tree.
    pub initialized: bool,
    pub is_authorized: bool,
    pub repo_url: String,
    pub branch: String,
    /// Checked-out branch; absent when a checkpoint is loaded.
    pub current_branch: Option<String>,
    pub head: Option<String>,
    pub has_temp_stash: bool,
    pub last_save: Option<SaveRecord>,
    pub current_save: Option<CurrentSave>,
    /// Operation holding the lock.
    pub operation: Option<String>,
}

impl CheckpointEngine {
    /// Snapshot of the engine state. Does not take the operation lock.
    pub async fn status(&self) -> Result<EngineStatus> {
        let mut config = self.config.get().await;
        let git = self.git(&config);
        let initialized = is_work_tree(&git).await;

        if initialized && config.has_temp_stash && !self.lock.is_held() {
            match find_entry(&git).await {
                Ok(None) => {
                    warn!("Interrupted work flag set without a stash entry, clearing it");
                    config = self
                        .config
                        .update(|c| {
                            c.has_temp_stash = false;
                            c.clone()
                        })
                        .await?;
                }
                Ok(Some(_)) => {}
                Err(e) => warn!(error = %e, "Could not verify interrupted work"),
            }
        }

        let (current_branch, head) = if initialized {
            (ops::current_branch(&git).await, ops::head_commit(&git).await)
        } else {
            (None, None)
        };

        Ok(EngineStatus {
            initialized,
            is_authorized: config.is_authorized,
            repo_url: config.repo_url.clone(),
            branch: config.target_branch().to_string(),
            current_branch,
            head,
            has_temp_stash: config.has_temp_stash,
            last_save: config.last_save,
            current_save: config.current_save,
            operation: self.lock.current().map(str::to_string),
        })
    }
}
