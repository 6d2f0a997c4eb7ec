//! Story tray aggregation.

use std::collections::{BTreeMap, HashMap};

use crate::affiliation::GroupAffiliation;
use crate::models::{Group, Identity, PosterKey, Story, StoryEntity, UserProfile};

pub struct StoryContext<'a> {
    pub identity: &'a Identity,
    pub affiliation: &'a GroupAffiliation,
    /// The visible user set
    pub users: &'a HashMap<String, UserProfile>,
    pub groups: &'a HashMap<String, Group>,
    pub now: u64,
    pub ttl_secs: u64,
}

impl StoryContext<'_> {
    fn admits(&self, key: &PosterKey) -> bool {
        match key {
            PosterKey::Group(group_id) => self.affiliation.is_following(group_id),
            PosterKey::User(user_id) => {
                user_id == &self.identity.id || self.users.contains_key(user_id)
            }
        }
    }

    fn display_name(&self, key: &PosterKey) -> String {
        let name = match key {
            PosterKey::Group(id) => self.groups.get(id).map(|g| g.name.as_str()),
            PosterKey::User(id) if id == &self.identity.id && !self.identity.name.is_empty() => {
                Some(self.identity.name.as_str())
            }
            PosterKey::User(id) => self.users.get(id).map(|u| u.name.as_str()),
        };
        name.unwrap_or_default().to_string()
    }
}

/// Group live stories into poster entities and order them for the tray.
///
/// Order: the viewer's own entity, then entities with unviewed stories, then
/// most recent first.
pub fn aggregate_stories(stories: &[Story], ctx: &StoryContext<'_>) -> Vec<StoryEntity> {
    let mut by_poster: BTreeMap<PosterKey, Vec<Story>> = BTreeMap::new();

    for story in stories {
        if !story.is_live(ctx.now, ctx.ttl_secs) {
            continue;
        }
        let Some(key) = story.poster_key() else {
            continue;
        };
        if !ctx.admits(&key) {
            continue;
        }
        by_poster.entry(key).or_default().push(story.clone());
    }

    let mut entities: Vec<StoryEntity> = by_poster
        .into_iter()
        .map(|(key, mut stories)| {
            stories.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
            let has_unviewed = stories.iter().any(|s| !s.is_viewed_by(&ctx.identity.id));
            let latest_timestamp = stories.iter().map(|s| s.timestamp).max().unwrap_or(0);
            StoryEntity {
                display_name: ctx.display_name(&key),
                key,
                stories,
                has_unviewed,
                latest_timestamp,
            }
        })
        .collect();

    let own_key = PosterKey::User(ctx.identity.id.clone());
    entities.sort_by(|a, b| {
        (b.key == own_key)
            .cmp(&(a.key == own_key))
            .then_with(|| b.has_unviewed.cmp(&a.has_unviewed))
            .then_with(|| b.latest_timestamp.cmp(&a.latest_timestamp))
            .then_with(|| a.key.cmp(&b.key))
    });
    entities
}
