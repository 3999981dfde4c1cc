use savestate_git::{DEFAULT_REMOTE, GitRunner, configure_remote, initialize};
use serde::Serialize;
use tracing::{debug, info};

use super::{CheckpointEngine, ops};
use crate::error::{EngineError, Result};
use crate::outcome::Outcome;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthorizeReport {
    pub branch: String,
    /// The branch did not exist on the remote and was pushed.
    pub created_branch: bool,
    /// A fresh repository was initialized in the managed directory.
    pub initialized_repository: bool,
}

impl CheckpointEngine {
    /// Connect the managed directory to the configured remote.
    pub async fn authorize(&self, branch: Option<&str>) -> Result<Outcome<AuthorizeReport>> {
        self.exclusive("initialize", self.authorize_locked(branch))
            .await
    }

    /// Drop the local repository metadata and authorize from scratch.
    /// Working-directory files are left in place.
    pub async fn force_reinitialize(&self) -> Result<Outcome<AuthorizeReport>> {
        self.exclusive("reinitialize", async {
            let git_dir = self.paths.workspace_dir.join(".git");
            match tokio::fs::remove_dir_all(&git_dir).await {
                Ok(()) => info!(dir = %git_dir.display(), "Removed repository metadata"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }

            self.config
                .update(|c| {
                    c.is_authorized = false;
                    c.current_save = None;
                    c.last_save = None;
                    c.has_temp_stash = false;
                })
                .await?;

            let report = self.authorize_locked(None).await?.value;
            let message = format!("Repository reinitialized on branch {}", report.branch);
            Ok(Outcome::new(report, message))
        })
        .await
    }

    async fn authorize_locked(&self, branch: Option<&str>) -> Result<Outcome<AuthorizeReport>> {
        let config = self.config.get().await;
        let repo_url = config.repo_url.trim();
        if repo_url.is_empty() {
            return Err(EngineError::InvalidInput(
                "repository URL is not configured".into(),
            ));
        }
        let branch = branch
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(config.target_branch())
            .to_string();

        let git = self.git(&config);
        let bootstrap = initialize(&git).await?;
        configure_remote(&git, repo_url).await?;

        let heads = git.run(&["ls-remote", "--heads", DEFAULT_REMOTE]).await;
        if !heads.success {
            return Err(EngineError::remote(
                "Could not reach the remote repository; check the URL and token",
                &heads,
            ));
        }
        let remote_ref = format!("refs/heads/{branch}");
        let remote_has_branch = heads
            .stdout
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(remote_ref.as_str()));

        let created_branch = if remote_has_branch {
            track_remote_branch(&git, &branch).await?;
            false
        } else {
            publish_new_branch(&git, &branch).await?;
            true
        };

        self.config
            .update(|c| {
                c.branch = branch.clone();
                c.is_authorized = true;
            })
            .await?;

        info!(%branch, created_branch, initialized = bootstrap.created, "Repository authorized");
        Ok(Outcome::new(
            AuthorizeReport {
                branch: branch.clone(),
                created_branch,
                initialized_repository: bootstrap.created,
            },
            format!("Connected to the remote on branch {branch}"),
        ))
    }
}

/// Fetch the remote branch and check out a local branch tracking it.
async fn track_remote_branch(git: &GitRunner, branch: &str) -> Result<()> {
    let fetch = git.run(&["fetch", DEFAULT_REMOTE]).await;
    if !fetch.success {
        return Err(EngineError::remote("Could not fetch from the remote", &fetch));
    }
    let upstream = format!("{DEFAULT_REMOTE}/{branch}");
    ops::checkout_branch(git, branch, Some(&upstream)).await?;
    debug!(branch, "Tracking remote branch");
    Ok(())
}

/// Create the branch locally and push it, proving write access.
async fn publish_new_branch(git: &GitRunner, branch: &str) -> Result<()> {
    if ops::head_commit(git).await.is_none() {
        let head = format!("refs/heads/{branch}");
        let symref = git.run(&["symbolic-ref", "HEAD", &head]).await;
        if !symref.success {
            return Err(EngineError::git("Failed to name the initial branch", &symref));
        }
        let add = git.run(&["add", "-A"]).await;
        if !add.success {
            return Err(EngineError::git("Failed to stage initial files", &add));
        }
        let commit = git
            .run(&["commit", "--allow-empty", "-m", "Initial commit"])
            .await;
        if !commit.success {
            return Err(EngineError::git("Failed to create the initial commit", &commit));
        }
    } else {
        ops::checkout_branch(git, branch, None).await?;
    }

    let push = git.run(&["push", "-u", DEFAULT_REMOTE, branch]).await;
    if !push.success {
        return Err(EngineError::remote(
            format!("Could not push branch {branch}; check that the token has write access"),
            &push,
        ));
    }
    Ok(())
}
