//! Persisted settings.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Branch used when none is configured.
pub const DEFAULT_BRANCH: &str = "main";

/// Auto-save interval, in minutes, used when the configured one is not positive.
pub const DEFAULT_AUTO_SAVE_MINUTES: i64 = 30;

/// What `get-config` shows instead of the access token.
pub const TOKEN_MASK: &str = "********";

/// Fallback author name when neither a display name nor a username is set.
pub const FALLBACK_AUTHOR: &str = "SaveState";

/// Placeholder email recorded on every commit and tag.
pub const AUTHOR_EMAIL: &str = "savestate@localhost";

/// The settings document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SaveStateConfig {
    /// Remote repository URL.
    pub repo_url: String,
    /// Branch checkpoints are committed on.
    pub branch: String,
    /// Hosting username.
    pub username: String,
    /// Access token embedded into HTTPS remote URLs.
    pub token: String,
    /// Name recorded as checkpoint author.
    pub display_name: String,
    /// Set once authorization against the remote succeeded.
    pub is_authorized: bool,
    /// Most recent checkpoint created or overwritten by the user.
    pub last_save: Option<SaveRecord>,
    /// Checkpoint the working directory was last switched to.
    pub current_save: Option<CurrentSave>,
    /// Interrupted work from a load is waiting to be applied or discarded.
    pub has_temp_stash: bool,
    pub auto_save: AutoSaveConfig,
}

impl Default for SaveStateConfig {
    fn default() -> Self {
        Self {
            repo_url: String::new(),
            branch: DEFAULT_BRANCH.to_string(),
            username: String::new(),
            token: String::new(),
            display_name: String::new(),
            is_authorized: false,
            last_save: None,
            current_save: None,
            has_temp_stash: false,
            auto_save: AutoSaveConfig::default(),
        }
    }
}

impl SaveStateConfig {
    /// Configured branch, or [`DEFAULT_BRANCH`] when blank.
    pub fn target_branch(&self) -> &str {
        let branch = self.branch.trim();
        if branch.is_empty() {
            DEFAULT_BRANCH
        } else {
            branch
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        let token = self.token.trim();
        (!token.is_empty()).then_some(token)
    }

    /// Display name, then username, then a fixed fallback.
    pub fn author_name(&self) -> &str {
        [self.display_name.trim(), self.username.trim()]
            .into_iter()
            .find(|name| !name.is_empty())
            .unwrap_or(FALLBACK_AUTHOR)
    }

    pub fn author_email(&self) -> &str {
        AUTHOR_EMAIL
    }

    /// Copy safe to hand out: the token is masked.
    pub fn view(&self) -> ConfigView {
        ConfigView {
            repo_url: self.repo_url.clone(),
            branch: self.branch.clone(),
            username: self.username.clone(),
            token: self.access_token().map(|_| TOKEN_MASK.to_string()),
            has_token: self.access_token().is_some(),
            display_name: self.display_name.clone(),
            is_authorized: self.is_authorized,
            last_save: self.last_save.clone(),
            current_save: self.current_save.clone(),
            has_temp_stash: self.has_temp_stash,
            auto_save: self.auto_save.clone(),
        }
    }
}

/// A checkpoint the user created or overwrote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveRecord {
    pub tag: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

/// The checkpoint the working directory was switched to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentSave {
    pub tag: String,
    pub name: String,
    pub loaded_at: DateTime<Utc>,
}

/// Timer-driven overwrite of a single checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    /// Minutes between runs; values below 1 fall back to the default.
    pub interval_minutes: i64,
    /// Tag overwritten on every run.
    pub target_tag: Option<String>,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: DEFAULT_AUTO_SAVE_MINUTES,
            target_tag: None,
        }
    }
}

impl AutoSaveConfig {
    pub fn effective_minutes(&self) -> u64 {
        if self.interval_minutes > 0 {
            self.interval_minutes as u64
        } else {
            DEFAULT_AUTO_SAVE_MINUTES as u64
        }
    }

    pub fn effective_interval(&self) -> Duration {
        Duration::from_secs(self.effective_minutes() * 60)
    }

    pub fn target(&self) -> Option<&str> {
        self.target_tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Settings as returned by `get-config`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConfigView {
    pub repo_url: String,
    pub branch: String,
    pub username: String,
    pub token: Option<String>,
    pub has_token: bool,
    pub display_name: String,
    pub is_authorized: bool,
    pub last_save: Option<SaveRecord>,
    pub current_save: Option<CurrentSave>,
    pub has_temp_stash: bool,
    pub auto_save: AutoSaveConfig,
}

/// What applying a [`ConfigPatch`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchEffect {
    /// Remote URL or branch changed; authorization was revoked.
    pub connection_changed: bool,
    /// Any auto-save field changed.
    pub auto_save_changed: bool,
}

/// User-editable settings. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub repo_url: Option<String>,
    pub branch: Option<String>,
    pub username: Option<String>,
    /// Ignored when it equals [`TOKEN_MASK`], so a masked view can be posted back.
    pub token: Option<String>,
    pub display_name: Option<String>,
    pub auto_save_enabled: Option<bool>,
    pub auto_save_interval_minutes: Option<i64>,
    /// An empty string clears the target.
    pub auto_save_target_tag: Option<String>,
}

impl ConfigPatch {
    /// Apply onto `config`.
    pub fn apply(self, config: &mut SaveStateConfig) -> PatchEffect {
        let mut connection_changed = false;
        let auto_save_before = config.auto_save.clone();

        if let Some(url) = self.repo_url {
            let url = url.trim().to_string();
            if url != config.repo_url {
                config.repo_url = url;
                connection_changed = true;
            }
        }
        if let Some(branch) = self.branch {
            let branch = branch.trim().to_string();
            if branch != config.branch {
                config.branch = branch;
                connection_changed = true;
            }
        }
        if let Some(username) = self.username {
            config.username = username.trim().to_string();
        }
        if let Some(token) = self.token {
            if token != TOKEN_MASK {
                config.token = token.trim().to_string();
            }
        }
        if let Some(name) = self.display_name {
            config.display_name = name.trim().to_string();
        }
        if let Some(enabled) = self.auto_save_enabled {
            config.auto_save.enabled = enabled;
        }
        if let Some(minutes) = self.auto_save_interval_minutes {
            config.auto_save.interval_minutes = minutes;
        }
        if let Some(tag) = self.auto_save_target_tag {
            let tag = tag.trim();
            config.auto_save.target_tag = (!tag.is_empty()).then(|| tag.to_string());
        }

        if connection_changed {
            config.is_authorized = false;
        }
        PatchEffect {
            connection_changed,
            auto_save_changed: config.auto_save != auto_save_before,
        }
    }
}
