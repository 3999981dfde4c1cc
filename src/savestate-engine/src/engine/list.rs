use savestate_git::DEFAULT_REMOTE;
use tracing::debug;

use super::CheckpointEngine;
use crate::checkpoint::{Checkpoint, LIST_FORMAT, parse_listing};
use crate::codec::TAG_PREFIX;
use crate::error::{EngineError, Result};

impl CheckpointEngine {
    /// Checkpoints as the remote sees them, newest first.
    pub async fn list(&self) -> Result<Vec<Checkpoint>> {
        self.exclusive("list", self.list_locked()).await
    }

    async fn list_locked(&self) -> Result<Vec<Checkpoint>> {
        let config = self.authorized_config().await?;
        let git = self.git(&config);

        let fetch = git
            .run(&[
                "fetch",
                DEFAULT_REMOTE,
                "--tags",
                "--force",
                "--prune",
                "--prune-tags",
            ])
            .await;
        if !fetch.success {
            return Err(EngineError::remote(
                "Could not fetch checkpoints from the remote",
                &fetch,
            ));
        }

        let format = format!("--format={LIST_FORMAT}");
        let pattern = format!("refs/tags/{TAG_PREFIX}*");
        let output = git
            .run(&["for-each-ref", "--sort=-creatordate", &format, &pattern])
            .await;
        if !output.success {
            return Err(EngineError::git("Failed to enumerate checkpoints", &output));
        }

        let checkpoints = parse_listing(&output.stdout);
        debug!(count = checkpoints.len(), "Listed checkpoints");
        Ok(checkpoints)
    }
}
