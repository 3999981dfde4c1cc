//! Repository bootstrap: idempotent init and remote registration.

use std::path::Path;

use tracing::info;

use crate::runner::{DEFAULT_REMOTE, GitRunner, same_dir};
use crate::{GitError, Result};

/// What [`initialize`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    /// A fresh repository was created.
    pub created: bool,
}

/// What [`configure_remote`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteChange {
    Added,
    Updated,
}

/// Whether the managed directory is itself the top of a git work tree.
///
/// A directory nested inside some other repository does not count.
pub async fn is_work_tree(runner: &GitRunner) -> bool {
    if !runner.managed_dir().is_dir() {
        return false;
    }
    let output = runner.run(&["rev-parse", "--show-toplevel"]).await;
    output.success && same_dir(Path::new(output.stdout_trimmed()), runner.managed_dir())
}

/// Initialize the managed directory as a repository unless it already is one.
pub async fn initialize(runner: &GitRunner) -> Result<BootstrapReport> {
    tokio::fs::create_dir_all(runner.managed_dir()).await?;

    if is_work_tree(runner).await {
        return Ok(BootstrapReport { created: false });
    }

    let output = runner.run(&["init"]).await;
    if !output.success {
        return Err(GitError::command("git init", &output));
    }

    info!(dir = %runner.managed_dir().display(), "Initialized repository");
    Ok(BootstrapReport { created: true })
}

/// Point `origin` at `url`, adding the remote when it does not exist yet.
pub async fn configure_remote(runner: &GitRunner, url: &str) -> Result<RemoteChange> {
    let remotes = runner.run(&["remote"]).await;
    if !remotes.success {
        return Err(GitError::command("git remote", &remotes));
    }

    let exists = remotes
        .stdout
        .lines()
        .any(|line| line.trim() == DEFAULT_REMOTE);

    let (args, change) = if exists {
        (["remote", "set-url", DEFAULT_REMOTE, url], RemoteChange::Updated)
    } else {
        (["remote", "add", DEFAULT_REMOTE, url], RemoteChange::Added)
    };

    let output = runner.run(&args).await;
    if !output.success {
        return Err(GitError::command(format!("git remote {}", args[1]), &output));
    }

    info!(remote = DEFAULT_REMOTE, ?change, "Configured remote");
    Ok(change)
}
