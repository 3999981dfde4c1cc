use savestate_git::{DEFAULT_REMOTE, GitRunner};
use serde::Serialize;
use tracing::info;

use super::CheckpointEngine;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpdateReport {
    pub update_available: bool,
    /// Commits the installation is behind its upstream.
    pub behind: u64,
    pub local: String,
    pub remote: String,
}

impl CheckpointEngine {
    /// Compare the installation checkout with its upstream.
    ///
    /// Runs outside the managed directory, so no credentials are injected.
    pub async fn check_for_update(&self) -> Result<UpdateReport> {
        let install_dir = self.paths.install_dir.as_deref().ok_or_else(|| {
            EngineError::InvalidInput("no installation directory is configured".into())
        })?;
        let config = self.config.get().await;
        let git = self.git(&config);

        let fetch = git.run_in(install_dir, &["fetch", DEFAULT_REMOTE]).await;
        if !fetch.success {
            return Err(EngineError::remote("Could not fetch plugin updates", &fetch));
        }

        let local = rev_parse(&git, install_dir, "HEAD").await?;
        let remote = rev_parse(&git, install_dir, "@{u}").await?;
        let count = git
            .run_in(install_dir, &["rev-list", "--count", "HEAD..@{u}"])
            .await;
        if !count.success {
            return Err(EngineError::git("Failed to count upstream commits", &count));
        }
        let behind = count.stdout_trimmed().parse().unwrap_or(0);

        info!(behind, "Checked for plugin update");
        Ok(UpdateReport {
            update_available: behind > 0,
            behind,
            local,
            remote,
        })
    }
}

async fn rev_parse(git: &GitRunner, dir: &std::path::Path, reference: &str) -> Result<String> {
    let output = git.run_in(dir, &["rev-parse", reference]).await;
    if !output.success {
        return Err(EngineError::git(format!("Failed to resolve {reference}"), &output));
    }
    Ok(output.stdout_trimmed().to_string())
}
