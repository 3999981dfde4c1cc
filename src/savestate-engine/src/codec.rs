//! Reversible mapping between display names and tag identities.

use std::fmt;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use regex::Regex;
use serde::Serialize;

/// Prefix shared by every checkpoint tag.
pub const TAG_PREFIX: &str = "save_";

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^save_(\d+)_([A-Za-z0-9_-]+)$").expect("valid regex"));

/// Longest display name, in bytes, whose tag stays within git's 255-byte
/// limit for a ref component even with a 19-digit timestamp.
pub const MAX_NAME_BYTES: usize = 160;

/// Encode a display name as a tag-safe token.
pub fn encode_name(name: &str) -> String {
    URL_SAFE_NO_PAD.encode(name.as_bytes())
}

/// Result of decoding a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedName {
    pub name: String,
    /// `false` when the token did not decode and `name` is the raw token.
    pub lossless: bool,
}

/// Decode a token. Never fails: malformed tokens come back verbatim.
pub fn decode_name(token: &str) -> DecodedName {
    let decoded = URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());

    match decoded {
        Some(name) => DecodedName {
            name,
            lossless: true,
        },
        None => DecodedName {
            name: token.to_string(),
            lossless: false,
        },
    }
}

/// Parsed checkpoint tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagId {
    pub millis: i64,
    pub token: String,
}

impl TagId {
    pub fn new(millis: i64, name: &str) -> Self {
        Self {
            millis,
            token: encode_name(name),
        }
    }

    /// `None` for tags that are not checkpoints.
    pub fn parse(tag: &str) -> Option<Self> {
        let caps = TAG_PATTERN.captures(tag)?;
        let millis = caps.get(1)?.as_str().parse().ok()?;
        Some(Self {
            millis,
            token: caps.get(2)?.as_str().to_string(),
        })
    }

    pub fn as_tag(&self) -> String {
        format!("{TAG_PREFIX}{}_{}", self.millis, self.token)
    }

    pub fn decode(&self) -> DecodedName {
        decode_name(&self.token)
    }

    /// Same token, one millisecond later.
    pub fn bumped(&self) -> Self {
        Self {
            millis: self.millis + 1,
            token: self.token.clone(),
        }
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TAG_PREFIX}{}_{}", self.millis, self.token)
    }
}

/// Display name for any tag, falling back to the tag itself for foreign tags.
pub fn display_name(tag: &str) -> String {
    TagId::parse(tag)
        .map(|id| id.decode().name)
        .unwrap_or_else(|| tag.to_string())
}
