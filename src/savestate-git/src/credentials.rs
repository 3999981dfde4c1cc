//! Temporary credential substitution for remote URLs.
//!
//! Network commands against the managed directory run with an HTTPS remote
//! URL that embeds the access token. The original URL is put back by
//! [`RemoteUrlGuard`], which restores explicitly after the command and again
//! from `Drop` if the explicit restore never ran or failed.

use std::path::PathBuf;
use std::process::Stdio;

use tracing::{debug, warn};
use url::Url;

use crate::redact;

/// Username GitHub expects alongside a token in an HTTPS URL.
pub const TOKEN_USER: &str = "x-access-token";

/// Embed `token` into an HTTPS URL that carries no credentials yet.
///
/// Returns `None` for non-HTTPS URLs, URLs that already carry credentials,
/// and anything that does not parse.
pub fn with_token(remote: &str, token: &str) -> Option<String> {
    let mut url = Url::parse(remote.trim()).ok()?;
    if url.scheme() != "https" || !url.username().is_empty() || url.password().is_some() {
        return None;
    }
    url.set_username(TOKEN_USER).ok()?;
    url.set_password(Some(token)).ok()?;
    Some(url.to_string())
}

/// Rewrite clone URLs in place. Works on the argument list itself, so it
/// applies whatever directory the clone targets.
pub(crate) fn rewrite_clone_args(args: &mut [String], token: &str) {
    for arg in args.iter_mut() {
        if let Some(authed) = with_token(arg, token) {
            *arg = authed;
        }
    }
}

/// Puts a remote's original URL back.
#[derive(Debug)]
pub struct RemoteUrlGuard {
    binary: PathBuf,
    dir: PathBuf,
    remote: String,
    original: String,
    restored: bool,
}

impl RemoteUrlGuard {
    pub fn new(
        binary: impl Into<PathBuf>,
        dir: impl Into<PathBuf>,
        remote: impl Into<String>,
        original: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            dir: dir.into(),
            remote: remote.into(),
            original: original.into(),
            restored: false,
        }
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Restore the original URL. Idempotent; returns whether the URL is
    /// known to be restored.
    pub async fn restore(&mut self) -> bool {
        if self.restored {
            return true;
        }

        let status = tokio::process::Command::new(&self.binary)
            .args(["remote", "set-url", &self.remote, &self.original])
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                debug!(remote = %self.remote, "Restored remote URL");
                self.restored = true;
            }
            Ok(status) => warn!(remote = %self.remote, %status, "Failed to restore remote URL"),
            Err(e) => warn!(remote = %self.remote, error = %e, "Failed to restore remote URL"),
        }
        self.restored
    }
}

impl Drop for RemoteUrlGuard {
    fn drop(&mut self) {
        if self.restored {
            return;
        }

        let status = std::process::Command::new(&self.binary)
            .args(["remote", "set-url", &self.remote, &self.original])
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => {
                debug!(remote = %self.remote, "Restored remote URL during cleanup");
            }
            Ok(status) => warn!(
                remote = %self.remote,
                url = %redact::mask_url_credentials(&self.original),
                %status,
                "Remote URL could not be restored during cleanup"
            ),
            Err(e) => warn!(
                remote = %self.remote,
                error = %e,
                "Remote URL could not be restored during cleanup"
            ),
        }
    }
}
