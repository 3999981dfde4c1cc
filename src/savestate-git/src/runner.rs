//! Git subprocess execution.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, trace, warn};

use crate::credentials::{self, RemoteUrlGuard};
use crate::redact;

/// Environment override for the optional per-command timeout.
const TIMEOUT_ENV: &str = "SAVESTATE_GIT_TIMEOUT_SECS";

/// Remote the managed directory pushes to and fetches from.
pub const DEFAULT_REMOTE: &str = "origin";

/// Subcommands that talk to a remote and may need credentials.
const NETWORK_COMMANDS: &[&str] = &["push", "pull", "fetch", "ls-remote", "clone"];

fn timeout_from_env() -> Option<Duration> {
    std::env::var(TIMEOUT_ENV)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

/// Author/committer identity applied to every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

impl GitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Outcome of a single git invocation.
///
/// A failed command (non-zero exit, spawn failure, timeout) is still a
/// `GitOutput` with `success == false`; the runner never returns an error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub exit_code: Option<i32>,
}

impl GitOutput {
    fn from_output(output: &Output) -> Self {
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let success = output.status.success();
        let error = if success {
            None
        } else {
            let trimmed = stderr.trim();
            Some(if trimmed.is_empty() {
                format!("git exited with {}", output.status)
            } else {
                trimmed.to_string()
            })
        };

        Self {
            success,
            stdout,
            stderr,
            error,
            exit_code: output.status.code(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Stdout without surrounding whitespace.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Everything git said, for attaching to failure reports.
    pub fn diagnostics(&self) -> String {
        let mut parts = Vec::new();
        if let Some(error) = &self.error {
            parts.push(error.trim().to_string());
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() && self.error.as_deref().map(str::trim) != Some(stderr) {
            parts.push(stderr.to_string());
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            parts.push(stdout.to_string());
        }
        parts.join("\n")
    }

    /// Case-insensitive search across stdout, stderr and the error text.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.stdout.to_lowercase().contains(&needle)
            || self.stderr.to_lowercase().contains(&needle)
            || self
                .error
                .as_deref()
                .is_some_and(|e| e.to_lowercase().contains(&needle))
    }
}

/// Runs git commands, by default inside the managed directory.
#[derive(Debug, Clone)]
pub struct GitRunner {
    binary: PathBuf,
    managed_dir: PathBuf,
    access_token: Option<String>,
    identity: Option<GitIdentity>,
    timeout: Option<Duration>,
}

impl GitRunner {
    pub fn new(managed_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("git"),
            managed_dir: managed_dir.into(),
            access_token: None,
            identity: None,
            timeout: timeout_from_env(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Token embedded into HTTPS remote URLs for network commands.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_identity(mut self, identity: GitIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn managed_dir(&self) -> &Path {
        &self.managed_dir
    }

    /// Run in the managed directory.
    pub async fn run(&self, args: &[&str]) -> GitOutput {
        self.execute(args, None, None).await
    }

    /// Run in an unrelated directory. Remote URLs there are never rewritten.
    pub async fn run_in(&self, dir: &Path, args: &[&str]) -> GitOutput {
        self.execute(args, Some(dir), None).await
    }

    /// Run in the managed directory with `input` piped to stdin.
    pub async fn run_with_input(&self, args: &[&str], input: &str) -> GitOutput {
        self.execute(args, None, Some(input)).await
    }

    pub async fn execute(&self, args: &[&str], dir: Option<&Path>, input: Option<&str>) -> GitOutput {
        let cwd = dir.unwrap_or(&self.managed_dir);
        let mut args: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
        let mut guard = None;

        if let Some(token) = self.access_token.as_deref() {
            let sub = subcommand(&args).map(str::to_string);
            match sub.as_deref() {
                Some("clone") => credentials::rewrite_clone_args(&mut args, token),
                Some(cmd) if NETWORK_COMMANDS.contains(&cmd) && self.targets_managed_dir(cwd) => {
                    guard = self.substitute_remote_url(cwd, token).await;
                }
                _ => {}
            }
        }

        let output = self.spawn(&args, cwd, input).await;

        // Restores on both the success and failure paths; the guard's Drop
        // covers a panic or a dropped future.
        if let Some(guard) = guard.as_mut() {
            guard.restore().await;
        }

        output
    }

    fn targets_managed_dir(&self, dir: &Path) -> bool {
        same_dir(dir, &self.managed_dir)
    }

    async fn substitute_remote_url(&self, cwd: &Path, token: &str) -> Option<RemoteUrlGuard> {
        let current = self
            .spawn(
                &["remote".into(), "get-url".into(), DEFAULT_REMOTE.into()],
                cwd,
                None,
            )
            .await;
        if !current.success {
            debug!("No remote URL configured, running without credentials");
            return None;
        }

        let original = current.stdout_trimmed().to_string();
        let authed = credentials::with_token(&original, token)?;

        let set = self
            .spawn(
                &[
                    "remote".into(),
                    "set-url".into(),
                    DEFAULT_REMOTE.into(),
                    authed,
                ],
                cwd,
                None,
            )
            .await;
        if !set.success {
            warn!(
                error = %redact::for_log(&set.diagnostics(), Some(token)),
                "Failed to install credential URL, running without credentials"
            );
            return None;
        }

        Some(RemoteUrlGuard::new(
            self.binary.clone(),
            cwd.to_path_buf(),
            DEFAULT_REMOTE,
            original,
        ))
    }

    async fn spawn(&self, args: &[String], cwd: &Path, input: Option<&str>) -> GitOutput {
        let token = self.access_token.as_deref();
        let printable = redact::command_line(args, token);
        debug!(command = %printable, cwd = %cwd.display(), "Running git");

        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(identity) = &self.identity {
            command
                .env("GIT_AUTHOR_NAME", &identity.name)
                .env("GIT_AUTHOR_EMAIL", &identity.email)
                .env("GIT_COMMITTER_NAME", &identity.name)
                .env("GIT_COMMITTER_EMAIL", &identity.email);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %printable, error = %e, "Failed to start git");
                return GitOutput::failure(format!("failed to start git: {e}"));
            }
        };

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, collect(child, input)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(command = %printable, timeout_secs = limit.as_secs(), "Git command timed out");
                    return GitOutput::failure(format!(
                        "{printable} timed out after {}s",
                        limit.as_secs()
                    ));
                }
            },
            None => collect(child, input).await,
        };

        match result {
            Ok(output) => {
                let output = GitOutput::from_output(&output);
                if output.success {
                    trace!(stdout = %redact::for_log(&output.stdout, token), "Git finished");
                } else {
                    debug!(
                        command = %printable,
                        code = ?output.exit_code,
                        stderr = %redact::for_log(&output.stderr, token),
                        "Git exited with failure"
                    );
                }
                output
            }
            Err(e) => {
                warn!(command = %printable, error = %e, "Git command I/O failed");
                GitOutput::failure(format!("git I/O error: {e}"))
            }
        }
    }
}

async fn collect(mut child: Child, input: Option<&str>) -> std::io::Result<Output> {
    if let Some(input) = input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await?;
        }
    }
    child.wait_with_output().await
}

/// First non-option argument, skipping the values of global options.
pub(crate) fn subcommand(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" | "-C" | "--git-dir" | "--work-tree" => {
                iter.next();
            }
            a if a.starts_with('-') => {}
            a => return Some(a),
        }
    }
    None
}

pub(crate) fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
