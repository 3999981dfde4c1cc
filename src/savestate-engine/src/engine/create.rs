use chrono::Utc;
use savestate_storage::SaveRecord;
use serde::Serialize;
use tracing::{info, warn};

use super::{CheckpointEngine, checkpoint_name, ops};
use crate::checkpoint::{DEFAULT_DESCRIPTION, annotation};
use crate::error::{EngineError, Result};
use crate::outcome::Outcome;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreatedCheckpoint {
    pub tag: String,
    pub name: String,
    pub description: String,
    pub commit: String,
    /// Whether a new commit was made for this checkpoint.
    pub committed: bool,
}

impl CheckpointEngine {
    /// Commit the working directory and publish it as a new checkpoint.
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Outcome<CreatedCheckpoint>> {
        self.exclusive("create", self.create_locked(name, description))
            .await
    }

    async fn create_locked(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Outcome<CreatedCheckpoint>> {
        let name = checkpoint_name(name)?;
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION);

        let config = self.authorized_config().await?;
        let git = self.git(&config);
        let mut warnings = Vec::new();

        let committed = ops::stage_and_commit(&git, &format!("Checkpoint: {name}")).await?;
        let commit = ops::head_commit(&git)
            .await
            .ok_or_else(|| EngineError::NotFound("HEAD commit".into()))?;

        let id = self.unused_tag_id(&git, name).await;
        let tag = id.as_tag();
        let now = Utc::now();
        ops::create_annotated_tag(&git, &tag, &commit, &annotation(description, now), false)
            .await?;

        let branch = config.target_branch();
        if committed && ops::current_branch(&git).await.as_deref() == Some(branch) {
            let push = ops::push_branch(&git, branch).await;
            if !push.success {
                let err = EngineError::remote("branch push failed", &push);
                warn!(branch, "Checkpoint branch push failed");
                warnings.push(format!(
                    "Branch {branch} could not be pushed: {}",
                    err.details().unwrap_or("unknown error")
                ));
            }
        }

        let push = ops::push_tag(&git, &tag, false).await;
        if !push.success {
            ops::discard_local_tag(&git, &tag).await;
            return Err(EngineError::remote(
                format!("Checkpoint '{name}' could not be pushed to the remote"),
                &push,
            ));
        }

        self.config
            .update(|c| {
                c.last_save = Some(SaveRecord {
                    tag: tag.clone(),
                    name: name.to_string(),
                    timestamp: now,
                });
            })
            .await?;

        info!(%tag, committed, "Checkpoint created");
        Ok(Outcome::new(
            CreatedCheckpoint {
                tag,
                name: name.to_string(),
                description: description.to_string(),
                commit,
                committed,
            },
            format!("Checkpoint '{name}' created"),
        )
        .with_warnings(warnings))
    }
}
