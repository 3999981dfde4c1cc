use serde::Serialize;
use tracing::info;

use super::ops::RemoteDelete;
use super::{CheckpointEngine, ops};
use crate::codec::display_name;
use crate::error::{EngineError, Result};
use crate::outcome::Outcome;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeleteReport {
    pub tag: String,
    pub remote_deleted: bool,
    /// The current-checkpoint pointer referenced this tag and was cleared.
    pub cleared_current: bool,
}

impl CheckpointEngine {
    /// Remove a checkpoint locally and from the remote.
    pub async fn delete(&self, tag: &str) -> Result<Outcome<DeleteReport>> {
        self.exclusive("delete", self.delete_locked(tag)).await
    }

    async fn delete_locked(&self, tag: &str) -> Result<Outcome<DeleteReport>> {
        let config = self.authorized_config().await?;
        let git = self.git(&config);

        if !ops::tag_exists(&git, tag).await {
            return Err(EngineError::NotFound(format!("checkpoint {tag}")));
        }

        let local = ops::delete_local_tag(&git, tag).await;
        if !local.success {
            return Err(EngineError::git(format!("Failed to delete tag {tag}"), &local));
        }

        let remote = ops::delete_remote_tag(&git, tag).await;
        let warnings: Vec<String> = remote.warning(tag).into_iter().collect();

        let cleared_current = self
            .config
            .update(|c| {
                let matches = c.current_save.as_ref().is_some_and(|s| s.tag == tag);
                if matches {
                    c.current_save = None;
                }
                matches
            })
            .await?;

        info!(tag, ?remote, cleared_current, "Checkpoint deleted");
        Ok(Outcome::new(
            DeleteReport {
                tag: tag.to_string(),
                remote_deleted: !matches!(remote, RemoteDelete::Failed(_)),
                cleared_current,
            },
            format!("Checkpoint '{}' deleted", display_name(tag)),
        )
        .with_warnings(warnings))
    }
}
