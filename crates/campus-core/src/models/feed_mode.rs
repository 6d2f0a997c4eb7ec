use serde::{Deserialize, Serialize};

/// Feed ordering selected by the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedMode {
    /// Server order, newest first
    Latest,
    #[default]
    ForYou,
}

impl FeedMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::ForYou => "for-you",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "latest" => Some(Self::Latest),
            "for-you" | "foryou" => Some(Self::ForYou),
            _ => None,
        }
    }
}
