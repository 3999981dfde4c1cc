//! Checkpoint records and the git output they are parsed from.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::codec::TagId;

/// Description used when the user gives none.
pub const DEFAULT_DESCRIPTION: &str = "No description";

const LAST_UPDATED: &str = "Last Updated:";

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// `for-each-ref` format producing one record per tag.
pub(crate) const LIST_FORMAT: &str = "%(refname:strip=2)%1f%(creatordate:iso-strict)%1f%(taggername)%1f%(contents:subject)%1f%(contents)%1e";

/// A named snapshot as shown to the user.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Checkpoint {
    pub tag: String,
    pub name: String,
    /// `false` when the name could not be decoded and is the raw token.
    pub name_decoded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub description: String,
    pub author: String,
}

/// Parsed annotation message.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub description: String,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Annotation body: the description plus a `Last Updated` line.
pub fn annotation(description: &str, updated_at: DateTime<Utc>) -> String {
    format!(
        "{}\n{LAST_UPDATED} {}",
        description.trim(),
        updated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Split an annotation into description and `Last Updated` time.
pub fn parse_annotation(message: &str) -> Annotation {
    let mut updated_at = None;
    let mut lines = Vec::new();

    for line in message.lines() {
        match line.trim().strip_prefix(LAST_UPDATED) {
            Some(value) if updated_at.is_none() => {
                updated_at = DateTime::parse_from_rfc3339(value.trim())
                    .ok()
                    .map(|t| t.with_timezone(&Utc));
            }
            _ => lines.push(line),
        }
    }

    Annotation {
        description: lines.join("\n").trim().to_string(),
        updated_at,
    }
}

/// Parse `for-each-ref --format=LIST_FORMAT` output, newest first.
///
/// Foreign tags and records with missing fields are skipped.
pub(crate) fn parse_listing(output: &str) -> Vec<Checkpoint> {
    let mut checkpoints: Vec<(i64, Checkpoint)> = output
        .split(RECORD_SEP)
        .filter_map(|record| {
            let record = record.trim_start_matches(['\n', '\r']);
            if record.trim().is_empty() {
                return None;
            }
            let parsed = parse_record(record);
            if parsed.is_none() {
                debug!(record = %record.lines().next().unwrap_or_default(), "Skipping tag record");
            }
            parsed
        })
        .collect();

    checkpoints.sort_by(|(a_ms, a), (b_ms, b)| {
        b.created_at.cmp(&a.created_at).then_with(|| b_ms.cmp(a_ms))
    });
    checkpoints.into_iter().map(|(_, c)| c).collect()
}

fn parse_record(record: &str) -> Option<(i64, Checkpoint)> {
    let fields: Vec<&str> = record.splitn(5, FIELD_SEP).collect();
    if fields.len() < 5 {
        return None;
    }

    let tag = fields[0].trim();
    let id = TagId::parse(tag)?;
    let decoded = id.decode();

    let created_at = DateTime::parse_from_rfc3339(fields[1].trim())
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| Utc.timestamp_millis_opt(id.millis).single())?;

    let annotation = parse_annotation(fields[4]);
    let description = if annotation.description.is_empty() {
        fields[3].trim().to_string()
    } else {
        annotation.description
    };

    Some((
        id.millis,
        Checkpoint {
            tag: tag.to_string(),
            name: decoded.name,
            name_decoded: decoded.lossless,
            created_at,
            updated_at: annotation.updated_at.unwrap_or(created_at),
            description,
            author: fields[2].trim().to_string(),
        },
    ))
}

/// Change classification in a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    /// Any other git status letter, passed through.
    Other(String),
}

impl FileStatus {
    fn from_code(code: &str) -> Self {
        match code.chars().next() {
            Some('A') => Self::Added,
            Some('M') => Self::Modified,
            Some('D') => Self::Deleted,
            Some('R') => Self::Renamed,
            Some('C') => Self::Copied,
            _ => Self::Other(code.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Renamed => "renamed",
            Self::Copied => "copied",
            Self::Other(code) => code,
        }
    }
}

impl Serialize for FileStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DiffEntry {
    pub status: FileStatus,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
}

/// Parse `diff --name-status -z` output.
pub(crate) fn parse_name_status(output: &str) -> Vec<DiffEntry> {
    let mut fields = output.split('\0').filter(|f| !f.is_empty());
    let mut entries = Vec::new();

    while let Some(code) = fields.next() {
        let status = FileStatus::from_code(code.trim());
        let entry = match status {
            FileStatus::Renamed | FileStatus::Copied => {
                let (Some(from), Some(to)) = (fields.next(), fields.next()) else {
                    break;
                };
                DiffEntry {
                    status,
                    file_name: to.to_string(),
                    previous_name: Some(from.to_string()),
                }
            }
            _ => {
                let Some(path) = fields.next() else {
                    break;
                };
                DiffEntry {
                    status,
                    file_name: path.to_string(),
                    previous_name: None,
                }
            }
        };
        entries.push(entry);
    }

    entries
}

/// Every path from `ls-tree -r --name-only -z`, classified as added.
pub(crate) fn all_added(output: &str) -> Vec<DiffEntry> {
    output
        .split('\0')
        .map(|p| p.trim_matches('\n'))
        .filter(|p| !p.is_empty())
        .map(|path| DiffEntry {
            status: FileStatus::Added,
            file_name: path.to_string(),
            previous_name: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(tag: &str, date: &str, author: &str, subject: &str, body: &str) -> String {
        format!("{tag}\u{1f}{date}\u{1f}{author}\u{1f}{subject}\u{1f}{body}\u{1e}\n")
    }

    #[test]
    fn test_annotation_round_trip() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let message = annotation("  Before the boss  ", now);
        assert_eq!(message, "Before the boss\nLast Updated: 2023-11-14T22:13:20.123Z");

        let parsed = parse_annotation(&message);
        assert_eq!(parsed.description, "Before the boss");
        assert_eq!(parsed.updated_at, Some(now));
    }

    #[test]
    fn test_annotation_without_timestamp() {
        let parsed = parse_annotation("Line one\nline two\n");
        assert_eq!(parsed.description, "Line one\nline two");
        assert_eq!(parsed.updated_at, None);
    }

    #[test]
    fn test_parse_listing_orders_and_skips() {
        let output = [
            record(
                "save_1000_b2xk",
                "2024-01-01T10:00:00+00:00",
                "Mona",
                "old save",
                "old save\n",
            ),
            record(
                "save_2000_bmV3",
                "2024-01-02T10:00:00+01:00",
                "Mona",
                "fresh Last Updated: 2024-01-03T00:00:00.000Z",
                "fresh\nLast Updated: 2024-01-03T00:00:00.000Z\n",
            ),
            record("v1.0.0", "2024-01-05T10:00:00+00:00", "x", "release", "release"),
            "save_3000_YQ\u{1f}truncated\u{1e}\n".to_string(),
        ]
        .concat();

        let list = parse_listing(&output);

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].tag, "save_2000_bmV3");
        assert_eq!(list[0].name, "new");
        assert_eq!(list[0].description, "fresh");
        assert_eq!(list[0].updated_at.to_rfc3339(), "2024-01-03T00:00:00+00:00");
        assert_eq!(list[1].name, "old");
        assert_eq!(list[1].updated_at, list[1].created_at);
        assert_eq!(list[1].author, "Mona");
    }

    #[test]
    fn test_undecodable_name_is_flagged() {
        let output = record("save_5_gA", "2024-01-01T00:00:00Z", "", "s", "s");
        let list = parse_listing(&output);
        assert_eq!(list[0].name, "gA");
        assert!(!list[0].name_decoded);
    }

    #[test]
    fn test_parse_name_status() {
        let output = "M\0src/a.rs\0R087\0old.txt\0new.txt\0A\0dir/new file.txt\0T\0link\0";
        let entries = parse_name_status(output);

        assert_eq!(
            entries.iter().map(|e| e.status.as_str()).collect::<Vec<_>>(),
            vec!["modified", "renamed", "added", "T"]
        );
        assert_eq!(entries[1].file_name, "new.txt");
        assert_eq!(entries[1].previous_name.as_deref(), Some("old.txt"));
        assert_eq!(entries[2].file_name, "dir/new file.txt");
    }

    #[test]
    fn test_status_serializes_as_string() {
        let entry = DiffEntry {
            status: FileStatus::Deleted,
            file_name: "gone".into(),
            previous_name: None,
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({"status": "deleted", "file_name": "gone"})
        );
    }

    #[test]
    fn test_all_added() {
        let entries = all_added("a.txt\0b/c.txt\0");
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.status == FileStatus::Added));
    }
}
