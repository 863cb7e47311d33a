//! Note model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a note. Assigned by the server on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A note owned by an authenticated user.
///
/// Timestamps are server-assigned; `updated_at` is bumped by the server on
/// every update, so `updated_at >= created_at` always holds. The owner never
/// changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: NoteId,
    /// Id of the owning user
    #[serde(rename = "user_id")]
    pub owner: String,
    /// Note title
    pub title: String,
    /// Note body; absent when never written to
    pub content: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Get the note body, treating an absent body as empty.
    #[must_use]
    pub fn content_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// First line of the title truncated to `max_len` characters, for lists.
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.title
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }

    /// Case-insensitive match against title and content.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self
                .content
                .as_ref()
                .is_some_and(|content| content.to_lowercase().contains(&query))
    }
}

/// A partial update to a note. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NotePatch {
    /// A patch that changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note(title: &str, content: Option<&str>) -> Note {
        let now = Utc::now();
        Note {
            id: "4f9c7f2e-8f3a-4f0e-9b1a-111111111111".parse().unwrap(),
            owner: "owner".to_string(),
            title: title.to_string(),
            content: content.map(ToString::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn note_id_parse_round_trip() {
        let id: NoteId = "4f9c7f2e-8f3a-4f0e-9b1a-111111111111".parse().unwrap();
        let parsed: NoteId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn note_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<NoteId>().is_err());
    }

    #[test]
    fn content_or_empty_handles_absent_body() {
        let note = sample_note("Untitled Note", None);
        assert_eq!(note.content_or_empty(), "");
    }

    #[test]
    fn title_preview_truncates() {
        let note = sample_note("First line\nSecond line", None);
        assert_eq!(note.title_preview(50), "First line");
        assert_eq!(note.title_preview(5), "First");
    }

    #[test]
    fn matches_query_checks_title_and_content() {
        let note = sample_note("Groceries", Some("buy milk"));
        assert!(note.matches_query("grocer"));
        assert!(note.matches_query("MILK"));
        assert!(note.matches_query(""));
        assert!(!note.matches_query("taxes"));
    }

    #[test]
    fn patch_skips_unset_fields_in_json() {
        let patch = NotePatch {
            title: Some("New title".to_string()),
            content: None,
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"title":"New title"}"#);
        assert!(NotePatch::default().is_empty());
    }

    #[test]
    fn note_deserializes_postgrest_row() {
        let row = r#"{
            "id": "4f9c7f2e-8f3a-4f0e-9b1a-111111111111",
            "user_id": "owner",
            "title": "Untitled Note",
            "content": null,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        }"#;
        let note: Note = serde_json::from_str(row).unwrap();
        assert_eq!(note.title, "Untitled Note");
        assert_eq!(note.content, None);
        assert_eq!(note.created_at, note.updated_at);
    }
}
