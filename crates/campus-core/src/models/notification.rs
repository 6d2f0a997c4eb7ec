use serde::Serialize;

/// Whether the host application is visible to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum AppState {
    #[default]
    Foreground,
    Background,
}

/// Request to show a local (on-device) notification for a new message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNotification {
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub timestamp: u64,
    /// Message count of the conversation when the notification was raised
    pub message_count: usize,
}
