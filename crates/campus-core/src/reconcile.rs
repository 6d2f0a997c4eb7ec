//! New-message detection across conversation snapshots.
//!
//! Keeps the last seen message count per conversation. A snapshot raises at most
//! one notification per conversation, naming only its newest message, however
//! many messages arrived since the previous snapshot.

use std::collections::HashMap;
use tracing::debug;

use crate::constants::UNKNOWN_SENDER_NAME;
use crate::models::{AppState, Conversation, LocalNotification, UserProfile};

#[derive(Debug, Default)]
pub struct ChangeReconciler {
    /// Conversation id -> highest message count observed
    seen_counts: HashMap<String, usize>,
}

impl ChangeReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all conversations (scope change).
    pub fn reset(&mut self) {
        self.seen_counts.clear();
    }

    pub fn seen_count(&self, conversation_id: &str) -> Option<usize> {
        self.seen_counts.get(conversation_id).copied()
    }

    /// Diff a conversations snapshot against the previous one.
    ///
    /// Counts are recorded whatever the app state, so messages read while in the
    /// foreground never notify later. Conversations missing from the snapshot are
    /// forgotten; new ones start from zero.
    pub fn observe(
        &mut self,
        conversations: &[Conversation],
        self_id: &str,
        app_state: AppState,
        users: &HashMap<String, UserProfile>,
    ) -> Vec<LocalNotification> {
        let mut notifications = Vec::new();
        let mut next_counts = HashMap::with_capacity(conversations.len());

        for conversation in conversations {
            let previous = self.seen_count(&conversation.id).unwrap_or(0);
            let count = conversation.messages.len();

            if count > previous && app_state == AppState::Background {
                if let Some(latest) = conversation
                    .last_message()
                    .filter(|m| m.sender_id != self_id)
                {
                    let sender_name = users
                        .get(&latest.sender_id)
                        .map(|u| u.name.as_str())
                        .filter(|n| !n.is_empty())
                        .unwrap_or(UNKNOWN_SENDER_NAME);
                    notifications.push(LocalNotification {
                        conversation_id: conversation.id.clone(),
                        sender_id: latest.sender_id.clone(),
                        sender_name: sender_name.to_string(),
                        text: latest.text.clone(),
                        timestamp: latest.timestamp,
                        message_count: count,
                    });
                }
            }

            next_counts.insert(conversation.id.clone(), count.max(previous));
        }

        if !notifications.is_empty() {
            debug!(
                "reconcile: {} notification(s) from {} conversations",
                notifications.len(),
                conversations.len()
            );
        }
        self.seen_counts = next_counts;
        notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, Role};

    fn message(sender: &str, text: &str, timestamp: u64) -> ChatMessage {
        ChatMessage {
            id: format!("{}-{}", sender, timestamp),
            sender_id: sender.to_string(),
            text: text.to_string(),
            timestamp,
        }
    }

    fn conversation(id: &str, messages: Vec<ChatMessage>) -> Conversation {
        Conversation {
            id: id.to_string(),
            participant_ids: vec!["me".to_string(), "bob".to_string()],
            college_id: Some("A".to_string()),
            messages,
        }
    }

    fn users() -> HashMap<String, UserProfile> {
        let bob = UserProfile {
            id: "bob".to_string(),
            name: "Bob".to_string(),
            role: Role::Student,
            department: "cs".to_string(),
            college_id: Some("A".to_string()),
            interests: Vec::new(),
        };
        HashMap::from([("bob".to_string(), bob)])
    }

    #[test]
    fn test_batched_arrivals_notify_once_per_transition() {
        let mut reconciler = ChangeReconciler::new();
        let users = users();
        let bg = AppState::Background;

        let first = reconciler.observe(&[conversation("c1", vec![])], "me", bg, &users);
        assert!(first.is_empty());

        let one = vec![message("bob", "hey", 1)];
        let second = reconciler.observe(&[conversation("c1", one.clone())], "me", bg, &users);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].text, "hey");
        assert_eq!(second[0].sender_name, "Bob");

        let mut three = one;
        three.push(message("bob", "are you there", 2));
        three.push(message("bob", "ping", 3));
        let third = reconciler.observe(&[conversation("c1", three)], "me", bg, &users);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].text, "ping");
        assert_eq!(third[0].message_count, 3);
    }

    #[test]
    fn test_no_notification_for_own_message() {
        let mut reconciler = ChangeReconciler::new();
        let out = reconciler.observe(
            &[conversation("c1", vec![message("me", "hello", 1)])],
            "me",
            AppState::Background,
            &users(),
        );
        assert!(out.is_empty());
        assert_eq!(reconciler.seen_count("c1"), Some(1));
    }

    #[test]
    fn test_foreground_arrivals_are_recorded_not_notified() {
        let mut reconciler = ChangeReconciler::new();
        let users = users();
        let msgs = vec![message("bob", "hi", 1)];

        let fg = reconciler.observe(
            &[conversation("c1", msgs.clone())],
            "me",
            AppState::Foreground,
            &users,
        );
        assert!(fg.is_empty());

        // Same snapshot after backgrounding: nothing new
        let bg = reconciler.observe(
            &[conversation("c1", msgs)],
            "me",
            AppState::Background,
            &users,
        );
        assert!(bg.is_empty());
    }

    #[test]
    fn test_new_conversation_starts_from_zero() {
        let mut reconciler = ChangeReconciler::new();
        let out = reconciler.observe(
            &[conversation("c9", vec![message("stranger", "hi", 5)])],
            "me",
            AppState::Background,
            &users(),
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sender_name, UNKNOWN_SENDER_NAME);
    }

    #[test]
    fn test_disappearing_conversation_is_forgotten() {
        let mut reconciler = ChangeReconciler::new();
        let users = users();
        let msgs = vec![message("bob", "hi", 1)];

        reconciler.observe(&[conversation("c1", msgs.clone())], "me", AppState::Foreground, &users);
        reconciler.observe(&[], "me", AppState::Foreground, &users);
        assert_eq!(reconciler.seen_count("c1"), None);

        let back = reconciler.observe(
            &[conversation("c1", msgs)],
            "me",
            AppState::Background,
            &users,
        );
        assert_eq!(back.len(), 1);
    }

    #[test]
    fn test_count_never_decreases() {
        let mut reconciler = ChangeReconciler::new();
        let users = users();
        let two = vec![message("bob", "a", 1), message("bob", "b", 2)];

        reconciler.observe(&[conversation("c1", two.clone())], "me", AppState::Foreground, &users);
        reconciler.observe(
            &[conversation("c1", two[..1].to_vec())],
            "me",
            AppState::Background,
            &users,
        );
        assert_eq!(reconciler.seen_count("c1"), Some(2));
    }
}
