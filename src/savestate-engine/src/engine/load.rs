use chrono::Utc;
use savestate_git::GitRunner;
use savestate_storage::CurrentSave;
use serde::Serialize;
use tracing::{info, warn};

use super::interrupted::{find_entry, label_for};
use super::{CheckpointEngine, ops};
use crate::codec::display_name;
use crate::error::{EngineError, Result};
use crate::outcome::Outcome;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LoadReport {
    pub tag: String,
    pub name: String,
    pub commit: String,
    /// Uncommitted changes were set aside as interrupted work.
    pub interrupted_work_saved: bool,
}

impl CheckpointEngine {
    /// Switch the working directory to a checkpoint (detached HEAD).
    pub async fn load(&self, tag: &str) -> Result<Outcome<LoadReport>> {
        self.exclusive("load", self.load_locked(tag)).await
    }

    async fn load_locked(&self, tag: &str) -> Result<Outcome<LoadReport>> {
        let config = self.authorized_config().await?;
        let git = self.git(&config);

        if !ops::tag_exists(&git, tag).await {
            return Err(EngineError::NotFound(format!("checkpoint {tag}")));
        }

        let stashed = if ops::is_dirty(&git).await? {
            if config.has_temp_stash {
                if find_entry(&git).await?.is_some() {
                    return Err(EngineError::InterruptedWorkPending);
                }
                warn!("Interrupted work flag was stale, clearing it");
                self.config.update(|c| c.has_temp_stash = false).await?;
            }
            self.stash_interrupted_work(&git, tag).await?
        } else {
            false
        };

        let commit = match ops::resolve_commit(&git, tag).await {
            Some(commit) => commit,
            None => {
                self.recover_interrupted_work(&git, stashed).await;
                return Err(EngineError::NotFound(format!("commit for checkpoint {tag}")));
            }
        };

        let checkout = git.run(&["checkout", "--detach", &commit]).await;
        if !checkout.success {
            self.recover_interrupted_work(&git, stashed).await;
            return Err(EngineError::git(
                format!("Failed to switch to checkpoint {tag}"),
                &checkout,
            ));
        }

        let name = display_name(tag);
        self.config
            .update(|c| {
                c.current_save = Some(CurrentSave {
                    tag: tag.to_string(),
                    name: name.clone(),
                    loaded_at: Utc::now(),
                });
            })
            .await?;

        info!(tag, stashed, "Checkpoint loaded");
        let message = if stashed {
            format!("Loaded checkpoint '{name}'; uncommitted changes were kept as interrupted work")
        } else {
            format!("Loaded checkpoint '{name}'")
        };
        Ok(Outcome::new(
            LoadReport {
                tag: tag.to_string(),
                name,
                commit,
                interrupted_work_saved: stashed,
            },
            message,
        ))
    }

    /// Stash everything, untracked files included. Returns whether an entry was made.
    async fn stash_interrupted_work(&self, git: &GitRunner, tag: &str) -> Result<bool> {
        let label = label_for(tag);
        let output = git
            .run(&["stash", "push", "--include-untracked", "-m", &label])
            .await;
        if !output.success {
            return Err(EngineError::git("Failed to set aside uncommitted changes", &output));
        }
        if output.mentions("No local changes to save") {
            return Ok(false);
        }

        self.config.update(|c| c.has_temp_stash = true).await?;
        info!(tag, "Uncommitted changes set aside as interrupted work");
        Ok(true)
    }

    async fn recover_interrupted_work(&self, git: &GitRunner, stashed: bool) {
        if !stashed {
            return;
        }
        if let Some(problem) = self.restore_after_failed_load(git).await {
            warn!(%problem, "Interrupted work not restored after failed load");
        }
    }
}
