//! Interrupted work: uncommitted changes set aside by a load.
//!
//! The stash entry is found by its label rather than by position, so stash
//! entries made by other tools are never applied or dropped by mistake.

use savestate_git::GitRunner;
use serde::Serialize;
use tracing::{info, warn};

use super::CheckpointEngine;
use crate::error::{EngineError, Result};
use crate::outcome::Outcome;

const LABEL_PREFIX: &str = "savestate: interrupted work before loading";

pub(super) fn label_for(tag: &str) -> String {
    format!("{LABEL_PREFIX} {tag}")
}

/// A labelled stash entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct StashEntry {
    /// `stash@{n}`
    pub reference: String,
    pub subject: String,
}

/// Newest stash entry carrying our label.
pub(super) async fn find_entry(git: &GitRunner) -> Result<Option<StashEntry>> {
    let output = git.run(&["stash", "list", "--format=%gd%x1f%gs"]).await;
    if !output.success {
        return Err(EngineError::git("Failed to list stash entries", &output));
    }
    Ok(parse_stash_list(&output.stdout))
}

fn parse_stash_list(output: &str) -> Option<StashEntry> {
    output.lines().find_map(|line| {
        let (reference, subject) = line.split_once('\u{1f}')?;
        subject.contains(LABEL_PREFIX).then(|| StashEntry {
            reference: reference.trim().to_string(),
            subject: subject.trim().to_string(),
        })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StashAction {
    Apply,
    Discard,
}

impl StashAction {
    fn operation(self) -> &'static str {
        match self {
            Self::Apply => "stash-apply",
            Self::Discard => "stash-discard",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InterruptedWorkReport {
    /// The stash entry's subject line.
    pub entry: String,
}

impl CheckpointEngine {
    /// Bring the interrupted work back into the working directory.
    pub async fn apply_interrupted_work(&self) -> Result<Outcome<InterruptedWorkReport>> {
        self.exclusive(
            StashAction::Apply.operation(),
            self.resolve_interrupted_work(StashAction::Apply),
        )
        .await
    }

    /// Throw the interrupted work away.
    pub async fn discard_interrupted_work(&self) -> Result<Outcome<InterruptedWorkReport>> {
        self.exclusive(
            StashAction::Discard.operation(),
            self.resolve_interrupted_work(StashAction::Discard),
        )
        .await
    }

    async fn resolve_interrupted_work(
        &self,
        action: StashAction,
    ) -> Result<Outcome<InterruptedWorkReport>> {
        let config = self.config.get().await;
        if !config.has_temp_stash {
            return Err(EngineError::NoInterruptedWork);
        }
        let git = self.git(&config);

        let Some(entry) = find_entry(&git).await? else {
            warn!("Interrupted work flag was set without a stash entry, clearing it");
            self.config.update(|c| c.has_temp_stash = false).await?;
            return Err(EngineError::NotFound("interrupted work stash entry".into()));
        };

        let (verb, message) = match action {
            StashAction::Apply => ("pop", "Interrupted work restored"),
            StashAction::Discard => ("drop", "Interrupted work discarded"),
        };
        let output = git.run(&["stash", verb, entry.reference.as_str()]).await;
        if !output.success {
            return Err(EngineError::git(
                format!("Failed to {verb} interrupted work"),
                &output,
            ));
        }

        self.config.update(|c| c.has_temp_stash = false).await?;
        info!(entry = %entry.reference, ?action, "Interrupted work resolved");
        Ok(Outcome::new(
            InterruptedWorkReport {
                entry: entry.subject,
            },
            message,
        ))
    }

    /// Put back interrupted work after a load failed. Best effort.
    pub(super) async fn restore_after_failed_load(&self, git: &GitRunner) -> Option<String> {
        let entry = match find_entry(git).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Some("Interrupted work could not be located for restore".into()),
            Err(e) => return Some(format!("Interrupted work could not be located: {e}")),
        };

        let pop = git.run(&["stash", "pop", entry.reference.as_str()]).await;
        if !pop.success {
            warn!(entry = %entry.reference, "Could not restore interrupted work after failed load");
            return Some(format!(
                "Interrupted work is still saved as {}; apply it manually",
                entry.reference
            ));
        }

        if let Err(e) = self.config.update(|c| c.has_temp_stash = false).await {
            return Some(format!("Interrupted work restored but settings not saved: {e}"));
        }
        None
    }
}
