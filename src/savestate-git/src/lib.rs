//! Git plumbing for SaveState.
//!
//! Runs git as a subprocess against the managed working directory. Every
//! invocation reports failure as data ([`GitOutput`]) instead of an error,
//! network commands get a temporary credential-bearing remote URL, and
//! command output is redacted before it reaches the logs.

pub mod bootstrap;
pub mod credentials;
pub mod redact;
pub mod runner;

pub use bootstrap::{BootstrapReport, RemoteChange, configure_remote, initialize, is_work_tree};
pub use credentials::{RemoteUrlGuard, TOKEN_USER, with_token};
pub use runner::{DEFAULT_REMOTE, GitIdentity, GitOutput, GitRunner};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git command '{command}' failed: {message}")]
    CommandFailed {
        command: String,
        message: String,
        stdout: String,
        stderr: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// Build a failure from the raw output of a command.
    pub fn command(command: impl Into<String>, output: &GitOutput) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: output.diagnostics(),
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
        }
    }

    /// Raw stdout/stderr of the failed command, if any.
    pub fn raw_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::CommandFailed { stdout, stderr, .. } => Some((stdout, stderr)),
            Self::Io(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GitError>;
