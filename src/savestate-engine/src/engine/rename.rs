use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::{CheckpointEngine, checkpoint_name, ops};
use crate::checkpoint::{DEFAULT_DESCRIPTION, annotation, parse_annotation};
use crate::codec::TagId;
use crate::error::{EngineError, Result};
use crate::outcome::Outcome;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RenameReport {
    pub old_tag: String,
    pub tag: String,
    pub name: String,
    pub description: String,
    /// `false` when only the description changed and the tag was kept.
    pub identity_changed: bool,
}

impl CheckpointEngine {
    /// Rename a checkpoint or update its description.
    ///
    /// Keeping the same name rewrites the annotation in place. A new name
    /// mints a new tag at the same commit and removes the old one.
    pub async fn rename(
        &self,
        old_tag: &str,
        new_name: &str,
        description: Option<&str>,
    ) -> Result<Outcome<RenameReport>> {
        self.exclusive("rename", self.rename_locked(old_tag, new_name, description))
            .await
    }

    async fn rename_locked(
        &self,
        old_tag: &str,
        new_name: &str,
        description: Option<&str>,
    ) -> Result<Outcome<RenameReport>> {
        let new_name = checkpoint_name(new_name)?;

        let config = self.authorized_config().await?;
        let git = self.git(&config);

        let old_id = TagId::parse(old_tag)
            .ok_or_else(|| EngineError::NotFound(format!("checkpoint {old_tag}")))?;
        if !ops::tag_exists(&git, old_tag).await {
            return Err(EngineError::NotFound(format!("checkpoint {old_tag}")));
        }
        let commit = ops::resolve_commit(&git, old_tag)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("commit for checkpoint {old_tag}")))?;

        let description = match description.map(str::trim).filter(|d| !d.is_empty()) {
            Some(d) => d.to_string(),
            None => ops::tag_message(&git, old_tag)
                .await
                .map(|m| parse_annotation(&m).description)
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        };
        let message = annotation(&description, Utc::now());

        let old_name = old_id.decode();
        if old_name.lossless && old_name.name == new_name {
            ops::create_annotated_tag(&git, old_tag, &commit, &message, true).await?;
            let push = ops::push_tag(&git, old_tag, true).await;
            if !push.success {
                warn!(tag = old_tag, "Forced tag update was rejected by the remote");
                return Err(EngineError::remote(
                    format!(
                        "Checkpoint {old_tag} was updated locally but the remote rejected it; \
                         check that the token may overwrite tags"
                    ),
                    &push,
                ));
            }

            info!(tag = old_tag, "Checkpoint description updated");
            return Ok(Outcome::new(
                RenameReport {
                    old_tag: old_tag.to_string(),
                    tag: old_tag.to_string(),
                    name: new_name.to_string(),
                    description,
                    identity_changed: false,
                },
                format!("Checkpoint '{new_name}' updated"),
            ));
        }

        let tag = self.unused_tag_id(&git, new_name).await.as_tag();
        ops::create_annotated_tag(&git, &tag, &commit, &message, false).await?;
        let push = ops::push_tag(&git, &tag, false).await;
        if !push.success {
            ops::discard_local_tag(&git, &tag).await;
            return Err(EngineError::remote(
                format!("Renamed checkpoint '{new_name}' could not be pushed"),
                &push,
            ));
        }

        let mut warnings = Vec::new();
        let local = ops::delete_local_tag(&git, old_tag).await;
        if !local.success {
            warnings.push(format!("Old tag {old_tag} could not be removed locally"));
        }
        warnings.extend(ops::delete_remote_tag(&git, old_tag).await.warning(old_tag));

        self.config
            .update(|c| {
                if let Some(current) = c.current_save.as_mut().filter(|s| s.tag == old_tag) {
                    current.tag = tag.clone();
                    current.name = new_name.to_string();
                }
                if let Some(last) = c.last_save.as_mut().filter(|s| s.tag == old_tag) {
                    last.tag = tag.clone();
                    last.name = new_name.to_string();
                }
                if c.auto_save.target() == Some(old_tag) {
                    c.auto_save.target_tag = Some(tag.clone());
                }
            })
            .await?;

        info!(old_tag, %tag, "Checkpoint renamed");
        Ok(Outcome::new(
            RenameReport {
                old_tag: old_tag.to_string(),
                tag,
                name: new_name.to_string(),
                description,
                identity_changed: true,
            },
            format!("Checkpoint renamed to '{new_name}'"),
        )
        .with_warnings(warnings))
    }
}
