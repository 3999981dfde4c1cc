use chrono::Utc;
use savestate_storage::SaveRecord;
use serde::Serialize;
use tracing::{info, warn};

use super::{CheckpointEngine, ops};
use crate::checkpoint::{annotation, parse_annotation};
use crate::codec::display_name;
use crate::error::{EngineError, Result};
use crate::outcome::Outcome;

/// Who asked for the overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteMode {
    /// A user action; records the checkpoint as the last save.
    Manual,
    /// The auto-save timer; leaves the last save alone.
    Autonomous,
}

impl OverwriteMode {
    fn operation(self) -> &'static str {
        match self {
            Self::Manual => "overwrite",
            Self::Autonomous => "auto-save",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OverwriteReport {
    pub tag: String,
    pub name: String,
    pub commit: String,
    pub previous_commit: String,
    pub committed: bool,
}

impl CheckpointEngine {
    /// Point an existing checkpoint at the current working directory,
    /// keeping its tag identity.
    pub async fn overwrite(
        &self,
        tag: &str,
        mode: OverwriteMode,
    ) -> Result<Outcome<OverwriteReport>> {
        self.exclusive(mode.operation(), self.overwrite_locked(tag, mode))
            .await
    }

    async fn overwrite_locked(
        &self,
        tag: &str,
        mode: OverwriteMode,
    ) -> Result<Outcome<OverwriteReport>> {
        let config = self.authorized_config().await?;
        let git = self.git(&config);

        if !ops::tag_exists(&git, tag).await {
            return Err(EngineError::NotFound(format!("checkpoint {tag}")));
        }
        let previous_commit = ops::resolve_commit(&git, tag)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("commit for checkpoint {tag}")))?;
        let previous_message = ops::tag_message(&git, tag).await;
        let description = previous_message
            .as_deref()
            .map(|m| parse_annotation(m).description)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("Overwrite of {tag}"));

        let name = display_name(tag);
        let mut warnings = Vec::new();

        let committed =
            ops::stage_and_commit(&git, &format!("Overwrite checkpoint: {name}")).await?;
        let commit = ops::head_commit(&git)
            .await
            .ok_or_else(|| EngineError::NotFound("HEAD commit".into()))?;

        if committed {
            let branch = config.target_branch();
            let push = ops::push_branch(&git, branch).await;
            if !push.success {
                let err = EngineError::remote("branch push failed", &push);
                warnings.push(format!(
                    "Branch {branch} could not be pushed: {}",
                    err.details().unwrap_or("unknown error")
                ));
            }
        }

        let local = ops::delete_local_tag(&git, tag).await;
        if !local.success {
            return Err(EngineError::git(format!("Failed to remove old tag {tag}"), &local));
        }
        warnings.extend(ops::delete_remote_tag(&git, tag).await.warning(tag));

        let now = Utc::now();
        if let Err(err) =
            ops::create_annotated_tag(&git, tag, &commit, &annotation(&description, now), false)
                .await
        {
            let restore_message = previous_message.unwrap_or_else(|| description.clone());
            if ops::create_annotated_tag(&git, tag, &previous_commit, &restore_message, true)
                .await
                .is_err()
            {
                warn!(tag, "Old tag could not be restored after failed overwrite");
            }
            return Err(err);
        }

        let push = ops::push_tag(&git, tag, false).await;
        if !push.success {
            ops::discard_local_tag(&git, tag).await;
            return Err(EngineError::remote(
                format!("Overwritten checkpoint '{name}' could not be pushed"),
                &push,
            ));
        }

        if mode == OverwriteMode::Manual {
            self.config
                .update(|c| {
                    c.last_save = Some(SaveRecord {
                        tag: tag.to_string(),
                        name: name.clone(),
                        timestamp: now,
                    });
                })
                .await?;
        }

        info!(tag, ?mode, committed, "Checkpoint overwritten");
        Ok(Outcome::new(
            OverwriteReport {
                tag: tag.to_string(),
                name: name.clone(),
                commit,
                previous_commit,
                committed,
            },
            format!("Checkpoint '{name}' overwritten"),
        )
        .with_warnings(warnings))
    }
}
