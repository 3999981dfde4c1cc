use serde::Serialize;
use tracing::debug;

use super::{CheckpointEngine, ops};
use crate::checkpoint::{DiffEntry, all_added, parse_name_status};
use crate::error::{EngineError, Result};

/// Git's well-known empty tree object.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DiffReport {
    pub ref1: String,
    pub ref2: String,
    /// `ref1` was the parent of a root commit and was replaced by the empty tree.
    pub against_empty_tree: bool,
    pub files: Vec<DiffEntry>,
}

/// `HEAD^`, `tag~`, `tag~1`, `tag^2`: a parent selector.
fn is_parent_selector(reference: &str) -> bool {
    let stem = reference.trim_end_matches(|c: char| c.is_ascii_digit());
    stem.ends_with('^') || stem.ends_with('~')
}

impl CheckpointEngine {
    /// Files that differ between two refs.
    pub async fn diff(&self, ref1: &str, ref2: &str) -> Result<DiffReport> {
        self.exclusive("diff", self.diff_locked(ref1, ref2)).await
    }

    async fn diff_locked(&self, ref1: &str, ref2: &str) -> Result<DiffReport> {
        let config = self.authorized_config().await?;
        let git = self.git(&config);

        let (base, against_empty_tree) = match ops::resolve_commit(&git, ref1).await {
            Some(commit) => (commit, false),
            None if is_parent_selector(ref1) => {
                debug!(ref1, "Parent of a root commit, diffing against the empty tree");
                (EMPTY_TREE.to_string(), true)
            }
            None => return Err(EngineError::NotFound(format!("ref {ref1}"))),
        };
        let target = ops::resolve_commit(&git, ref2)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("ref {ref2}")))?;

        let diff = git
            .run(&["diff", "--name-status", "-z", "-M", &base, &target])
            .await;

        let files = if diff.success {
            parse_name_status(&diff.stdout)
        } else if against_empty_tree {
            let tree = git
                .run(&["ls-tree", "-r", "--name-only", "-z", &target])
                .await;
            if !tree.success {
                return Err(EngineError::git(format!("Failed to list files in {ref2}"), &tree));
            }
            all_added(&tree.stdout)
        } else {
            return Err(EngineError::git(format!("Failed to diff {ref1}..{ref2}"), &diff));
        };

        Ok(DiffReport {
            ref1: ref1.to_string(),
            ref2: ref2.to_string(),
            against_empty_tree,
            files,
        })
    }
}
