use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::affiliation::GroupAffiliation;
use crate::models::{
    College, Conversation, ConversationSummary, Course, DepartmentChannel, Group, Identity,
    Notice, Post, Story, UserProfile,
};
use crate::store::{Collection, Document, Snapshot};

/// Local cache of the latest snapshot of every collection.
///
/// Each accepted snapshot replaces its collection wholesale; nothing here is
/// patched in place. Cross-references (post → author, story → poster) stay as ids
/// and are resolved through the id-keyed maps at read time.
pub struct AppDataStore {
    pub users: HashMap<String, UserProfile>,
    pub colleges: HashMap<String, College>,
    /// Server delivery order (newest first)
    pub posts: Vec<Post>,
    /// Only stories inside their window at ingest time
    pub stories: Vec<Story>,
    pub groups: HashMap<String, Group>,
    pub conversations: Vec<Conversation>,
    pub courses: Vec<Course>,
    pub notices: Vec<Notice>,
    pub department_channels: Vec<DepartmentChannel>,

    /// Conversations not naming this user are dropped on ingest
    viewer_id: Option<String>,
    story_ttl_secs: u64,
}

impl AppDataStore {
    pub fn new(story_ttl_secs: u64) -> Self {
        Self {
            users: HashMap::new(),
            colleges: HashMap::new(),
            posts: Vec::new(),
            stories: Vec::new(),
            groups: HashMap::new(),
            conversations: Vec::new(),
            courses: Vec::new(),
            notices: Vec::new(),
            department_channels: Vec::new(),
            viewer_id: None,
            story_ttl_secs,
        }
    }

    /// Forget everything, e.g. on scope change.
    pub fn clear(&mut self) {
        self.users.clear();
        self.colleges.clear();
        self.posts.clear();
        self.stories.clear();
        self.groups.clear();
        self.conversations.clear();
        self.courses.clear();
        self.notices.clear();
        self.department_channels.clear();
    }

    pub fn set_viewer(&mut self, viewer_id: Option<String>) {
        self.viewer_id = viewer_id;
    }

    pub fn story_ttl_secs(&self) -> u64 {
        self.story_ttl_secs
    }

    /// Replace one collection from a snapshot. Returns how many documents decoded.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot, now: u64) -> usize {
        let collection = snapshot.collection;
        let docs = snapshot.documents;

        let count = match collection {
            Collection::Users => {
                self.users = keyed(decode_all::<UserProfile>(collection, docs), |u| &u.id);
                self.users.len()
            }
            Collection::Colleges => {
                self.colleges = keyed(decode_all::<College>(collection, docs), |c| &c.id);
                self.colleges.len()
            }
            Collection::Posts => {
                self.posts = decode_all(collection, docs);
                self.posts.len()
            }
            Collection::Stories => {
                let ttl = self.story_ttl_secs;
                self.stories = decode_all::<Story>(collection, docs)
                    .into_iter()
                    .filter(|s| s.is_live(now, ttl))
                    .collect();
                self.stories.len()
            }
            Collection::Groups => {
                self.groups = keyed(decode_all::<Group>(collection, docs), |g| &g.id);
                self.groups.len()
            }
            Collection::Conversations => {
                let mut conversations: Vec<Conversation> = decode_all(collection, docs);
                if let Some(viewer) = self.viewer_id.as_deref() {
                    conversations.retain(|c| c.has_participant(viewer));
                }
                self.conversations = conversations;
                self.conversations.len()
            }
            Collection::Courses => {
                self.courses = decode_all(collection, docs);
                self.courses.len()
            }
            Collection::Notices => {
                self.notices = decode_all(collection, docs);
                self.notices.len()
            }
            Collection::DepartmentChannels => {
                self.department_channels = decode_all(collection, docs);
                self.department_channels.len()
            }
        };

        debug!("app_data_store: {} now holds {} documents", collection, count);
        count
    }

    // ===== Lookups =====

    pub fn post(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn affiliation(&self, identity: &Identity) -> GroupAffiliation {
        GroupAffiliation::resolve(identity, self.groups.values())
    }

    // ===== Views =====

    /// Conversations by latest activity, empty ones last.
    pub fn conversation_summaries(&self, identity: &Identity) -> Vec<ConversationSummary> {
        let mut conversations: Vec<&Conversation> = self
            .conversations
            .iter()
            .filter(|c| c.has_participant(&identity.id))
            .collect();
        conversations.sort_by(|a, b| {
            b.last_activity()
                .cmp(&a.last_activity())
                .then_with(|| a.id.cmp(&b.id))
        });

        conversations
            .into_iter()
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                counterpart_ids: c.counterparts(&identity.id).map(str::to_string).collect(),
                last_message: c.last_message().cloned(),
                message_count: c.messages.len(),
            })
            .collect()
    }

    pub fn notices_latest_first(&self) -> Vec<Notice> {
        let mut notices = self.notices.clone();
        notices.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        notices
    }

    /// Department channels by name.
    pub fn department_channels_by_name(&self) -> Vec<DepartmentChannel> {
        let mut channels = self.department_channels.clone();
        channels.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        channels
    }
}

fn decode_all<T: DeserializeOwned>(collection: Collection, docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_string();
            match serde_json::from_value::<T>(Value::Object(doc)) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("app_data_store: skipping malformed {}/{}: {}", collection, id, e);
                    None
                }
            }
        })
        .collect()
}

fn keyed<T>(items: Vec<T>, key: impl Fn(&T) -> &String) -> HashMap<String, T> {
    items.into_iter().map(|item| (key(&item).clone(), item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::STORY_TTL_SECS;
    use crate::models::Role;
    use serde_json::json;

    const NOW: u64 = 1_700_000_000;

    fn snapshot(collection: Collection, docs: Value) -> Snapshot {
        Snapshot {
            collection,
            documents: docs
                .as_array()
                .unwrap()
                .iter()
                .map(|d| d.as_object().cloned().unwrap())
                .collect(),
        }
    }

    #[test]
    fn test_snapshot_replaces_collection() {
        let mut store = AppDataStore::new(STORY_TTL_SECS);
        store.apply_snapshot(
            snapshot(Collection::Posts, json!([{"id": "p1", "authorId": "u1"}])),
            NOW,
        );
        store.apply_snapshot(
            snapshot(Collection::Posts, json!([{"id": "p2", "authorId": "u1"}])),
            NOW,
        );

        assert_eq!(store.posts.len(), 1);
        assert_eq!(store.posts[0].id, "p2");
    }

    #[test]
    fn test_malformed_documents_are_skipped() {
        let mut store = AppDataStore::new(STORY_TTL_SECS);
        let count = store.apply_snapshot(
            snapshot(
                Collection::Stories,
                json!([
                    {"id": "s1", "timestamp": "yesterday"},
                    {"id": "s2", "authorId": "u1", "timestamp": NOW},
                ]),
            ),
            NOW,
        );

        assert_eq!(count, 1);
        assert_eq!(store.stories[0].id, "s2");
    }

    #[test]
    fn test_expired_stories_dropped_on_ingest() {
        let mut store = AppDataStore::new(STORY_TTL_SECS);
        store.apply_snapshot(
            snapshot(
                Collection::Stories,
                json!([
                    {"id": "old", "authorId": "u1", "timestamp": NOW - 25 * 3600},
                    {"id": "fresh", "authorId": "u1", "timestamp": NOW - 3600}
                ]),
            ),
            NOW,
        );

        let ids: Vec<&str> = store.stories.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["fresh"]);
    }

    #[test]
    fn test_conversations_restricted_to_viewer() {
        let mut store = AppDataStore::new(STORY_TTL_SECS);
        store.set_viewer(Some("u1".to_string()));
        store.apply_snapshot(
            snapshot(
                Collection::Conversations,
                json!([
                    {"id": "c1", "participantIds": ["u1", "u2"]},
                    {"id": "c2", "participantIds": ["u3", "u2"]}
                ]),
            ),
            NOW,
        );

        assert_eq!(store.conversations.len(), 1);
        assert_eq!(store.conversations[0].id, "c1");
    }

    #[test]
    fn test_conversation_summaries_order() {
        let mut store = AppDataStore::new(STORY_TTL_SECS);
        store.apply_snapshot(
            snapshot(
                Collection::Conversations,
                json!([
                    {"id": "quiet", "participantIds": ["u1", "u2"]},
                    {"id": "old", "participantIds": ["u1", "u3"],
                     "messages": [{"senderId": "u3", "text": "hi", "timestamp": 10}]},
                    {"id": "new", "participantIds": ["u1", "u4"],
                     "messages": [{"senderId": "u1", "text": "yo", "timestamp": 20}]}
                ]),
            ),
            NOW,
        );

        let identity = Identity::new("u1", Role::Student, Some("A"));
        let summaries = store.conversation_summaries(&identity);
        let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "quiet"]);
        assert_eq!(summaries[1].counterpart_ids, vec!["u3".to_string()]);
    }
}
