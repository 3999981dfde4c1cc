//! Git building blocks shared by the operations.

use savestate_git::{DEFAULT_REMOTE, GitOutput, GitRunner};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

fn tag_ref(tag: &str) -> String {
    format!("refs/tags/{tag}")
}

pub(super) async fn tag_exists(git: &GitRunner, tag: &str) -> bool {
    git.run(&["rev-parse", "-q", "--verify", &tag_ref(tag)])
        .await
        .success
}

/// Commit a ref points at, if it resolves to one.
pub(super) async fn resolve_commit(git: &GitRunner, reference: &str) -> Option<String> {
    let rev = format!("{reference}^{{commit}}");
    let output = git.run(&["rev-parse", "-q", "--verify", &rev]).await;
    (output.success && !output.stdout_trimmed().is_empty())
        .then(|| output.stdout_trimmed().to_string())
}

pub(super) async fn head_commit(git: &GitRunner) -> Option<String> {
    resolve_commit(git, "HEAD").await
}

/// Checked-out branch; `None` when detached.
pub(super) async fn current_branch(git: &GitRunner) -> Option<String> {
    let output = git.run(&["symbolic-ref", "--short", "-q", "HEAD"]).await;
    (output.success && !output.stdout_trimmed().is_empty())
        .then(|| output.stdout_trimmed().to_string())
}

/// Uncommitted changes, untracked files included.
pub(super) async fn is_dirty(git: &GitRunner) -> Result<bool> {
    let output = git
        .run(&["status", "--porcelain", "--untracked-files=all"])
        .await;
    if !output.success {
        return Err(EngineError::git("Failed to read working directory status", &output));
    }
    Ok(!output.stdout_trimmed().is_empty())
}

/// Stage everything and commit when the stage differs from HEAD.
///
/// Returns whether a commit was made.
pub(super) async fn stage_and_commit(git: &GitRunner, message: &str) -> Result<bool> {
    let add = git.run(&["add", "-A"]).await;
    if !add.success {
        return Err(EngineError::git("Failed to stage changes", &add));
    }

    let unborn = head_commit(git).await.is_none();
    if !unborn {
        let diff = git.run(&["diff", "--cached", "--quiet"]).await;
        match diff.exit_code {
            Some(0) => {
                debug!("Nothing staged, no commit needed");
                return Ok(false);
            }
            Some(1) => {}
            _ => return Err(EngineError::git("Failed to compare staged changes", &diff)),
        }
    }

    let mut args = vec!["commit", "-m", message];
    if unborn {
        args.push("--allow-empty");
    }
    let commit = git.run(&args).await;
    if commit.success {
        return Ok(true);
    }
    if commit.mentions("nothing to commit") {
        debug!("Commit reported nothing to commit");
        return Ok(false);
    }
    Err(EngineError::git("Failed to commit changes", &commit))
}

/// Create (or with `force`, replace) an annotated tag at `commit`.
pub(super) async fn create_annotated_tag(
    git: &GitRunner,
    tag: &str,
    commit: &str,
    message: &str,
    force: bool,
) -> Result<()> {
    let mut args = vec!["tag", "-a"];
    if force {
        args.push("-f");
    }
    args.extend(["--cleanup=whitespace", "-F", "-", tag, commit]);

    let output = git.run_with_input(&args, message).await;
    if !output.success {
        return Err(EngineError::git(format!("Failed to create tag {tag}"), &output));
    }
    Ok(())
}

pub(super) async fn push_tag(git: &GitRunner, tag: &str, force: bool) -> GitOutput {
    let refspec = tag_ref(tag);
    let mut args = vec!["push"];
    if force {
        args.push("--force");
    }
    args.extend([DEFAULT_REMOTE, refspec.as_str()]);
    git.run(&args).await
}

pub(super) async fn push_branch(git: &GitRunner, branch: &str) -> GitOutput {
    git.run(&["push", DEFAULT_REMOTE, branch]).await
}

pub(super) async fn delete_local_tag(git: &GitRunner, tag: &str) -> GitOutput {
    git.run(&["tag", "-d", tag]).await
}

/// Best-effort local tag removal after a failed push.
pub(super) async fn discard_local_tag(git: &GitRunner, tag: &str) {
    let output = delete_local_tag(git, tag).await;
    if !output.success {
        warn!(tag, "Could not remove local tag after failed push");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum RemoteDelete {
    Deleted,
    /// The remote never had the tag.
    Missing,
    Failed(String),
}

impl RemoteDelete {
    /// Warning text for a failed delete.
    pub(super) fn warning(&self, tag: &str) -> Option<String> {
        match self {
            Self::Failed(details) => Some(format!(
                "Remote tag {tag} could not be deleted: {details}"
            )),
            _ => None,
        }
    }
}

pub(super) async fn delete_remote_tag(git: &GitRunner, tag: &str) -> RemoteDelete {
    let refspec = tag_ref(tag);
    let output = git
        .run(&["push", DEFAULT_REMOTE, "--delete", refspec.as_str()])
        .await;

    if output.success {
        RemoteDelete::Deleted
    } else if output.mentions("remote ref does not exist") {
        debug!(tag, "Remote tag already absent");
        RemoteDelete::Missing
    } else {
        let err = EngineError::remote("delete failed", &output);
        warn!(tag, "Failed to delete remote tag");
        RemoteDelete::Failed(err.details().unwrap_or("unknown error").to_string())
    }
}

/// Full annotation message of a tag.
pub(super) async fn tag_message(git: &GitRunner, tag: &str) -> Option<String> {
    let output = git
        .run(&["for-each-ref", "--format=%(contents)", &tag_ref(tag)])
        .await;
    let message = output.stdout.trim();
    (output.success && !message.is_empty()).then(|| message.to_string())
}

/// Optimistic branch switch: create it, or switch to it when it already exists.
pub(super) async fn checkout_branch(
    git: &GitRunner,
    branch: &str,
    track: Option<&str>,
) -> Result<bool> {
    let mut args = vec!["checkout", "-b", branch];
    if let Some(upstream) = track {
        args.extend(["--track", upstream]);
    }

    let create = git.run(&args).await;
    if create.success {
        return Ok(true);
    }
    if !create.mentions("already exists") {
        return Err(EngineError::git(format!("Failed to create branch {branch}"), &create));
    }

    debug!(branch, "Branch already exists, switching to it");
    let switch = git.run(&["checkout", branch]).await;
    if !switch.success {
        return Err(EngineError::git(format!("Failed to switch to branch {branch}"), &switch));
    }
    Ok(false)
}
