use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    #[serde(default)]
    pub author_id: Option<String>,
    /// Set for stories posted on behalf of a group
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub college_id: Option<String>,
    pub timestamp: u64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub viewed_by: Vec<String>,
}

impl Story {
    /// Group stories are keyed by group even when an author is also recorded.
    pub fn poster_key(&self) -> Option<PosterKey> {
        if let Some(group_id) = self.group_id.as_deref().filter(|g| !g.is_empty()) {
            return Some(PosterKey::Group(group_id.to_string()));
        }
        self.author_id
            .as_deref()
            .filter(|a| !a.is_empty())
            .map(|a| PosterKey::User(a.to_string()))
    }

    pub fn is_viewed_by(&self, user_id: &str) -> bool {
        self.viewed_by.iter().any(|v| v == user_id)
    }

    /// Whether the story is still inside its window at `now`.
    pub fn is_live(&self, now: u64, ttl_secs: u64) -> bool {
        now.saturating_sub(self.timestamp) < ttl_secs
    }
}

/// Grouping key stories are aggregated under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PosterKey {
    User(String),
    Group(String),
}

impl fmt::Display for PosterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{}", id),
            Self::Group(id) => write!(f, "group:{}", id),
        }
    }
}

impl Serialize for PosterKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Stories of one poster, ready for the story tray.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryEntity {
    pub key: PosterKey,
    /// Poster display name, empty when the poster is not cached yet
    pub display_name: String,
    /// Oldest first
    pub stories: Vec<Story>,
    pub has_unviewed: bool,
    pub latest_timestamp: u64,
}
