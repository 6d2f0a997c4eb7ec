use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Keeps identical texts sent within the same second distinct in the array
    #[serde(default)]
    pub id: String,
    pub sender_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub participant_ids: Vec<String>,
    #[serde(default)]
    pub college_id: Option<String>,
    /// Oldest first, as appended by senders
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_ids.iter().any(|p| p == user_id)
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn last_activity(&self) -> u64 {
        self.last_message().map(|m| m.timestamp).unwrap_or(0)
    }

    /// Participants other than `user_id`
    pub fn counterparts<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a str> {
        self.participant_ids
            .iter()
            .map(String::as_str)
            .filter(move |p| *p != user_id)
    }
}

/// Conversation row for list views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub counterpart_ids: Vec<String>,
    pub last_message: Option<ChatMessage>,
    pub message_count: usize,
}
