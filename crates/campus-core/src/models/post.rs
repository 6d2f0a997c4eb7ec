use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Reaction buckets of a post: reaction type -> user ids.
///
/// A user occupies at most one bucket. All mutation goes through
/// [`Reactions::set_exclusive`] and [`Reactions::remove_user`], which keep that true
/// and drop buckets that become empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reactions(BTreeMap<String, BTreeSet<String>>);

impl Reactions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `user_id` into the `reaction_type` bucket, leaving every other bucket.
    pub fn set_exclusive(&mut self, reaction_type: &str, user_id: &str) {
        self.remove_user(user_id);
        self.0
            .entry(reaction_type.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    /// Remove `user_id` from every bucket. Returns true if anything changed.
    pub fn remove_user(&mut self, user_id: &str) -> bool {
        let mut changed = false;
        for users in self.0.values_mut() {
            changed |= users.remove(user_id);
        }
        self.0.retain(|_, users| !users.is_empty());
        changed
    }

    pub fn bucket_of(&self, user_id: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, users)| users.contains(user_id))
            .map(|(kind, _)| kind.as_str())
    }

    pub fn count(&self, reaction_type: &str) -> usize {
        self.0.get(reaction_type).map(|u| u.len()).unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().map(|u| u.len()).sum()
    }

    /// Reaction counts sorted by count descending, then type name.
    pub fn counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> =
            self.0.iter().map(|(k, u)| (k.clone(), u.len())).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Number of buckets containing `user_id`. Always 0 or 1 for maps built through
    /// this type, but decoded maps may violate it.
    pub fn occurrences(&self, user_id: &str) -> usize {
        self.0.values().filter(|u| u.contains(user_id)).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityDetails {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedPost {
    #[serde(default)]
    pub original_post_id: String,
    #[serde(default)]
    pub original_author_id: String,
    #[serde(default)]
    pub original_content: String,
}

/// Content variant of a post. Variants are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PostVariant {
    #[default]
    Plain,
    Event(EventDetails),
    Confession,
    Opportunity(OpportunityDetails),
    Shared(SharedPost),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PostDocument", into = "PostDocument")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub college_id: Option<String>,
    pub group_id: Option<String>,
    pub timestamp: u64,
    pub content: String,
    pub reactions: Reactions,
    pub comments: Vec<Comment>,
    pub variant: PostVariant,
}

impl Post {
    pub fn is_confession(&self) -> bool {
        matches!(self.variant, PostVariant::Confession)
    }

    /// All text a reader sees for this post, used for interest matching.
    pub fn searchable_text(&self) -> Vec<&str> {
        let mut parts = vec![self.content.as_str()];
        match &self.variant {
            PostVariant::Event(details) => parts.push(&details.title),
            PostVariant::Opportunity(details) => parts.push(&details.title),
            PostVariant::Shared(shared) => parts.push(&shared.original_content),
            PostVariant::Plain | PostVariant::Confession => {}
        }
        parts
    }
}

/// Stored shape of a post: variants are flag + detail pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostDocument {
    id: String,
    #[serde(default)]
    author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    college_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_id: Option<String>,
    #[serde(default)]
    timestamp: u64,
    #[serde(default)]
    content: String,
    #[serde(default)]
    reactions: Reactions,
    #[serde(default)]
    comments: Vec<Comment>,
    #[serde(default)]
    is_event: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_details: Option<EventDetails>,
    #[serde(default)]
    is_confession: bool,
    #[serde(default)]
    is_opportunity: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    opportunity_details: Option<OpportunityDetails>,
    #[serde(default)]
    is_shared: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shared_post: Option<SharedPost>,
}

impl From<PostDocument> for Post {
    fn from(doc: PostDocument) -> Self {
        // Confession wins so a malformed multi-flag post never leaks into the feed
        let variant = if doc.is_confession {
            PostVariant::Confession
        } else if doc.is_event {
            PostVariant::Event(doc.event_details.unwrap_or_default())
        } else if doc.is_opportunity {
            PostVariant::Opportunity(doc.opportunity_details.unwrap_or_default())
        } else if doc.is_shared {
            PostVariant::Shared(doc.shared_post.unwrap_or_default())
        } else {
            PostVariant::Plain
        };

        Self {
            id: doc.id,
            author_id: doc.author_id,
            college_id: doc.college_id,
            group_id: doc.group_id,
            timestamp: doc.timestamp,
            content: doc.content,
            reactions: doc.reactions,
            comments: doc.comments,
            variant,
        }
    }
}

impl From<Post> for PostDocument {
    fn from(post: Post) -> Self {
        let mut doc = PostDocument {
            id: post.id,
            author_id: post.author_id,
            college_id: post.college_id,
            group_id: post.group_id,
            timestamp: post.timestamp,
            content: post.content,
            reactions: post.reactions,
            comments: post.comments,
            ..Default::default()
        };
        match post.variant {
            PostVariant::Plain => {}
            PostVariant::Confession => doc.is_confession = true,
            PostVariant::Event(details) => {
                doc.is_event = true;
                doc.event_details = Some(details);
            }
            PostVariant::Opportunity(details) => {
                doc.is_opportunity = true;
                doc.opportunity_details = Some(details);
            }
            PostVariant::Shared(shared) => {
                doc.is_shared = true;
                doc.shared_post = Some(shared);
            }
        }
        doc
    }
}
