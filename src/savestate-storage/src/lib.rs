//! SaveState storage: OS-aware paths and the persisted settings document.
//!
//! - **Linux**: `~/.local/share/SaveState/`
//! - **macOS**: `~/Library/Application Support/SaveState/`
//! - **Windows**: `%APPDATA%\SaveState\`
//!
//! The settings live in a single JSON document (`config.json`) that is
//! default-filled on read and rewritten atomically on every change.

pub mod config;
pub mod error;
pub mod paths;
pub mod store;

pub use config::{
    AUTHOR_EMAIL, AutoSaveConfig, ConfigPatch, ConfigView, CurrentSave,
    DEFAULT_AUTO_SAVE_MINUTES, DEFAULT_BRANCH, FALLBACK_AUTHOR, PatchEffect, SaveRecord,
    SaveStateConfig, TOKEN_MASK,
};
pub use error::{Result, StorageError};
pub use paths::{SaveStatePaths, savestate_data_dir};
pub use store::ConfigStore;
