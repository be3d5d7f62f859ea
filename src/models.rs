//! Core data models shared by the directory, ingestion, and command bus.

use serde::{Deserialize, Serialize};

/// A catalog entry as stored in the channel directory.
///
/// `id` is the dense 0-based ordinal assigned at ingestion time. `name` is
/// kept exactly as given; only the name-index key is normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    pub name: String,
    /// `None` when the entry has no group. The store writes it as an empty
    /// string, so `Some("")` is not a valid value and `save` rejects it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub url: String,
}

impl ChannelRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            url: url.into(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// One parsed playlist entry, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub name: String,
    pub category: Option<String>,
    pub url: String,
    /// 1-based line number of the metadata line.
    pub line: usize,
}

impl PlaylistEntry {
    /// Turn the entry into a record with the given ordinal id.
    pub fn into_record(self, ordinal: usize) -> ChannelRecord {
        ChannelRecord {
            id: ordinal.to_string(),
            name: self.name,
            category: self.category,
            url: self.url,
        }
    }
}
