//! Write intents.
//!
//! Reactions go through [`ReactionTransactor`]; every other array-valued field
//! uses the store's append/remove primitives, which commute and need no
//! transaction.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::clock::unix_now;
use crate::config::RetryConfig;
use crate::constants::fields;
use crate::error::{CoreError, Result};
use crate::models::{ChatMessage, Comment, Post};
use crate::reactions::ReactionTransactor;
use crate::store::{Collection, Document, DocumentStore, TxOutcome};

/// Cloneable handle for issuing writes.
#[derive(Clone)]
pub struct WriteIntents {
    store: Arc<dyn DocumentStore>,
    reactions: ReactionTransactor,
}

impl WriteIntents {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryConfig) -> Self {
        Self {
            reactions: ReactionTransactor::new(store.clone(), retry),
            store,
        }
    }

    // ===== Reactions =====

    pub async fn react(
        &self,
        post_id: &str,
        reaction_type: &str,
        user_id: &str,
    ) -> Result<TxOutcome> {
        self.reactions.react(post_id, reaction_type, user_id).await
    }

    pub async fn unreact(&self, post_id: &str, user_id: &str) -> Result<TxOutcome> {
        self.reactions.unreact(post_id, user_id).await
    }

    // ===== Conversations =====

    /// Open a conversation between `participant_ids`. Returns its id.
    pub async fn start_conversation(
        &self,
        college_id: Option<&str>,
        participant_ids: &[String],
    ) -> Result<String> {
        let mut doc = Document::new();
        doc.insert(fields::PARTICIPANT_IDS.to_string(), to_value(participant_ids)?);
        if let Some(college_id) = college_id {
            doc.insert(fields::COLLEGE_ID.to_string(), Value::from(college_id));
        }
        doc.insert(fields::MESSAGES.to_string(), Value::Array(Vec::new()));
        Ok(self.store.create_document(Collection::Conversations, doc).await?)
    }

    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<ChatMessage> {
        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            timestamp: unix_now(),
        };
        self.store
            .append_to_set(
                Collection::Conversations,
                conversation_id,
                fields::MESSAGES,
                to_value(&message)?,
            )
            .await?;
        debug!("intents: message appended to conversations/{}", conversation_id);
        Ok(message)
    }

    // ===== Posts =====

    /// Store a new post. An empty `post.id` is assigned by the store; a zero
    /// timestamp is replaced with the current time. Returns the post id.
    pub async fn create_post(&self, mut post: Post) -> Result<String> {
        if post.timestamp == 0 {
            post.timestamp = unix_now();
        }
        let mut doc = to_document(&post)?;
        if post.id.is_empty() {
            doc.remove(fields::ID);
        }
        Ok(self.store.create_document(Collection::Posts, doc).await?)
    }

    pub async fn edit_post_content(&self, post_id: &str, content: &str) -> Result<()> {
        self.store
            .set_field(Collection::Posts, post_id, fields::CONTENT, Value::from(content))
            .await?;
        Ok(())
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<()> {
        Ok(self.store.delete_document(Collection::Posts, post_id).await?)
    }

    pub async fn add_comment(&self, post_id: &str, author_id: &str, text: &str) -> Result<Comment> {
        let comment = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            author_id: author_id.to_string(),
            text: text.to_string(),
            timestamp: unix_now(),
        };
        self.store
            .append_to_set(Collection::Posts, post_id, fields::COMMENTS, to_value(&comment)?)
            .await?;
        Ok(comment)
    }

    pub async fn remove_comment(&self, post_id: &str, comment: &Comment) -> Result<()> {
        self.store
            .remove_from_set(Collection::Posts, post_id, fields::COMMENTS, to_value(comment)?)
            .await?;
        Ok(())
    }

    // ===== Stories =====

    pub async fn mark_story_viewed(&self, story_id: &str, user_id: &str) -> Result<()> {
        self.store
            .append_to_set(Collection::Stories, story_id, fields::VIEWED_BY, Value::from(user_id))
            .await?;
        Ok(())
    }

    // ===== Groups =====

    pub async fn join_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        self.group_set(group_id, fields::MEMBER_IDS, user_id, true).await
    }

    pub async fn leave_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        self.group_set(group_id, fields::MEMBER_IDS, user_id, false).await
    }

    pub async fn follow_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        self.group_set(group_id, fields::FOLLOWERS, user_id, true).await
    }

    pub async fn unfollow_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        self.group_set(group_id, fields::FOLLOWERS, user_id, false).await
    }

    async fn group_set(&self, group_id: &str, field: &str, user_id: &str, add: bool) -> Result<()> {
        let value = Value::from(user_id);
        if add {
            self.store
                .append_to_set(Collection::Groups, group_id, field, value)
                .await?;
        } else {
            self.store
                .remove_from_set(Collection::Groups, group_id, field, value)
                .await?;
        }
        Ok(())
    }
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match to_value(value)? {
        Value::Object(doc) => Ok(doc),
        other => Err(CoreError::Store(crate::error::StoreError::Malformed(format!(
            "expected an object, got {}",
            other
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Conversation, Group, PostVariant, Reactions};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, WriteIntents) {
        let store = Arc::new(MemoryStore::new());
        let intents = WriteIntents::new(store.clone(), RetryConfig::default());
        (store, intents)
    }

    fn decode<T: serde::de::DeserializeOwned>(doc: Document) -> T {
        serde_json::from_value(Value::Object(doc)).unwrap()
    }

    #[tokio::test]
    async fn test_send_message_appends() {
        let (store, intents) = setup();
        let participants = vec!["u1".to_string(), "u2".to_string()];
        let id = intents
            .start_conversation(Some("A"), &participants)
            .await
            .unwrap();

        intents.send_message(&id, "u1", "hi").await.unwrap();
        intents.send_message(&id, "u2", "hello").await.unwrap();

        let conversation: Conversation =
            decode(store.document(Collection::Conversations, &id).unwrap());
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[1].text, "hello");
        assert_eq!(conversation.college_id.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_repeated_message_text_is_kept() {
        let (store, intents) = setup();
        let participants = vec!["me".to_string(), "bob".to_string()];
        let id = intents.start_conversation(None, &participants).await.unwrap();

        let first = intents.send_message(&id, "bob", "ok").await.unwrap();
        let second = intents.send_message(&id, "bob", "ok").await.unwrap();

        assert_ne!(first.id, second.id);
        let conversation: Conversation =
            decode(store.document(Collection::Conversations, &id).unwrap());
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0], first);
        assert_eq!(conversation.messages[1], second);
    }

    #[tokio::test]
    async fn test_create_post_and_comment_round() {
        let (store, intents) = setup();
        let post = Post {
            id: String::new(),
            author_id: "u1".to_string(),
            college_id: Some("A".to_string()),
            group_id: None,
            timestamp: 0,
            content: "Library open late".to_string(),
            reactions: Reactions::new(),
            comments: Vec::new(),
            variant: PostVariant::Plain,
        };

        let id = intents.create_post(post).await.unwrap();
        assert!(!id.is_empty());

        let comment = intents.add_comment(&id, "u2", "nice").await.unwrap();
        let stored: Post = decode(store.document(Collection::Posts, &id).unwrap());
        assert!(stored.timestamp > 0);
        assert_eq!(stored.comments, vec![comment.clone()]);

        intents.edit_post_content(&id, "Library open until 2am").await.unwrap();
        intents.remove_comment(&id, &comment).await.unwrap();
        let stored: Post = decode(store.document(Collection::Posts, &id).unwrap());
        assert!(stored.comments.is_empty());
        assert_eq!(stored.content, "Library open until 2am");

        intents.delete_post(&id).await.unwrap();
        assert!(store.document(Collection::Posts, &id).is_none());
    }

    #[tokio::test]
    async fn test_group_follow_cycle() {
        let (store, intents) = setup();
        store
            .insert(
                Collection::Groups,
                json!({"id": "g1", "name": "Chess"}).as_object().cloned().unwrap(),
            )
            .unwrap();

        intents.follow_group("g1", "u1").await.unwrap();
        intents.join_group("g1", "u2").await.unwrap();
        let group: Group = decode(store.document(Collection::Groups, "g1").unwrap());
        assert!(group.is_follower("u1"));
        assert!(group.is_member("u2"));

        intents.unfollow_group("g1", "u1").await.unwrap();
        intents.leave_group("g1", "u2").await.unwrap();
        let group: Group = decode(store.document(Collection::Groups, "g1").unwrap());
        assert!(!group.is_follower("u1"));
        assert!(!group.is_member("u2"));
    }

    #[tokio::test]
    async fn test_message_to_missing_conversation_fails() {
        let (_store, intents) = setup();
        let err = intents.send_message("nope", "u1", "hi").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Store(crate::error::StoreError::NotFound { .. })
        ));
    }
}
