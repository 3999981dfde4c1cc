//! Log redaction for git commands and their output.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Stands in for binary diff output in logs.
pub const BINARY_PLACEHOLDER: &str = "[binary output omitted]";

/// Replacement for secrets.
pub const MASK: &str = "***";

const MAX_LOGGED_CHARS: usize = 2000;

static URL_CREDENTIALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<scheme>[a-zA-Z][a-zA-Z0-9+.-]*://)[^/\s@]+@").expect("valid regex")
});

/// Replace `user:password@` in any URL with a mask.
pub fn mask_url_credentials(text: &str) -> Cow<'_, str> {
    URL_CREDENTIALS.replace_all(text, format!("${{scheme}}{MASK}@"))
}

/// Mask every occurrence of `secret` and any URL-embedded credentials.
pub fn mask_secret<'a>(text: &'a str, secret: Option<&str>) -> Cow<'a, str> {
    let masked = mask_url_credentials(text);
    match secret.filter(|s| !s.is_empty()) {
        Some(secret) if masked.contains(secret) => Cow::Owned(masked.replace(secret, MASK)),
        _ => masked,
    }
}

/// Whether the text is (or contains) binary diff output.
pub fn looks_binary(text: &str) -> bool {
    text.contains('\0')
        || text.contains("GIT binary patch")
        || (text.contains("Binary files ") && text.contains(" differ"))
}

/// Prepare command output for a log line.
pub fn for_log(text: &str, secret: Option<&str>) -> String {
    if looks_binary(text) {
        return BINARY_PLACEHOLDER.to_string();
    }
    let masked = mask_secret(text.trim(), secret);
    if masked.chars().count() > MAX_LOGGED_CHARS {
        let cut: String = masked.chars().take(MAX_LOGGED_CHARS).collect();
        format!("{cut}... [truncated]")
    } else {
        masked.into_owned()
    }
}

/// Printable `git ...` line with secrets masked.
pub fn command_line(args: &[String], secret: Option<&str>) -> String {
    let joined = args.join(" ");
    format!("git {}", mask_secret(&joined, secret))
}
