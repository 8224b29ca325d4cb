//! Document state, save status and the persisted local record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The live, editable document of an authoring session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentState {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<SmolStr>,
    /// Remote draft this document saves into, once one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<SmolStr>,
    /// Set when editing an already-published record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_id: Option<SmolStr>,
}

impl DocumentState {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate from a draft fetched from the server.
    pub fn from_remote_draft(
        draft_id: impl Into<SmolStr>,
        title: impl Into<String>,
        content: impl Into<String>,
        tags: Vec<SmolStr>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            tags,
            draft_id: Some(draft_id.into()),
            published_id: None,
        }
    }

    /// Hydrate for editing an already-published record.
    pub fn editing_published(
        published_id: impl Into<SmolStr>,
        title: impl Into<String>,
        content: impl Into<String>,
        tags: Vec<SmolStr>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            tags,
            draft_id: None,
            published_id: Some(published_id.into()),
        }
    }

    /// Builder-style title setter.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Builder-style content setter.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Builder-style tags setter.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SmolStr>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// True when both title and body are empty. Tags alone do not count.
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }

    /// Editing an already-published record.
    pub fn is_published(&self) -> bool {
        self.published_id.is_some()
    }

    /// Capture the editable fields for change detection.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            title: self.title.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Build the record written to the local draft slot.
    pub fn to_local_record(&self, saved_at: DateTime<Utc>) -> LocalDraftRecord {
        LocalDraftRecord {
            title: self.title.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
            draft_id: self.draft_id.clone(),
            saved_at,
        }
    }
}

/// Immutable copy of the editable fields at the moment a tier wrote them.
///
/// Identifiers are excluded: a draft id assigned by the server is not an edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub title: String,
    pub content: String,
    pub tags: Vec<SmolStr>,
}

/// Save indicator state exposed to the UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    /// Current document matches what a tier last wrote.
    #[default]
    Saved,
    /// A remote write is in flight.
    Saving,
    /// Current document has diverged from both tiers.
    Unsaved,
}

impl SaveStatus {
    /// Indicator text.
    pub fn label(self) -> &'static str {
        match self {
            SaveStatus::Saved => "Saved",
            SaveStatus::Saving => "Saving...",
            SaveStatus::Unsaved => "Unsaved",
        }
    }
}

impl std::fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SaveStatus::Saved => "saved",
            SaveStatus::Saving => "saving",
            SaveStatus::Unsaved => "unsaved",
        })
    }
}

/// Snapshot persisted in the single local draft slot.
///
/// Serialized as `{ title, content, tags, draftId?, savedAt }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDraftRecord {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<SmolStr>,
    pub saved_at: DateTime<Utc>,
}

impl LocalDraftRecord {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            title: self.title.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
        }
    }

    /// First `max_chars` characters of the body, for the recovery prompt.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{head}…")
        } else {
            head
        }
    }
}
