//! Engine error taxonomy.

use savestate_git::{GitError, GitOutput, redact};
use savestate_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The referenced checkpoint, tag or ref does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or credential failure talking to the remote.
    #[error("{message}")]
    Remote { message: String, details: String },

    /// A local git command failed.
    #[error("{message}")]
    Git { message: String, details: String },

    #[error("Another operation is in progress: {operation}")]
    Busy { operation: String },

    #[error("Not authorized: connect a repository first")]
    NotAuthorized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("There is no interrupted work to restore")]
    NoInterruptedWork,

    #[error("Interrupted work from an earlier load must be applied or discarded first")]
    InterruptedWorkPending,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation panicked; the lock was released.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn git(message: impl Into<String>, output: &GitOutput) -> Self {
        Self::Git {
            message: message.into(),
            details: redact::mask_url_credentials(&output.diagnostics()).into_owned(),
        }
    }

    pub fn remote(message: impl Into<String>, output: &GitOutput) -> Self {
        Self::Remote {
            message: message.into(),
            details: redact::mask_url_credentials(&output.diagnostics()).into_owned(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Remote { .. } => "remote_error",
            Self::Git { .. } => "git_error",
            Self::Busy { .. } => "busy",
            Self::NotAuthorized => "not_authorized",
            Self::InvalidInput(_) => "invalid_input",
            Self::NoInterruptedWork => "no_interrupted_work",
            Self::InterruptedWorkPending => "interrupted_work_pending",
            Self::Storage(_) => "storage_error",
            Self::Io(_) => "io_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Raw diagnostics attached for troubleshooting.
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Remote { details, .. } | Self::Git { details, .. } if !details.is_empty() => {
                Some(details.as_str())
            }
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

impl From<GitError> for EngineError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::CommandFailed {
                command, message, ..
            } => Self::Git {
                message: format!("{command} failed"),
                details: redact::mask_url_credentials(&message).into_owned(),
            },
            GitError::Io(e) => Self::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
