//! Feed visibility and ranking.
//!
//! Pure functions of the cached posts and the viewer; recomputed on every
//! snapshot, never cached.

use std::collections::HashMap;

use crate::affiliation::GroupAffiliation;
use crate::constants::{GROUP_MEMBER_BONUS, INTEREST_MATCH_BONUS, SAME_DEPARTMENT_BONUS};
use crate::models::{FeedMode, Identity, Post, UserProfile};

/// Everything the ranker needs to know about the viewer.
pub struct FeedContext<'a> {
    pub identity: &'a Identity,
    pub affiliation: &'a GroupAffiliation,
    /// Author lookup; authors missing here just earn no department bonus
    pub users: &'a HashMap<String, UserProfile>,
}

/// Confessions never appear in the feed; group posts only for members and
/// followers of that group.
pub fn is_visible(post: &Post, ctx: &FeedContext<'_>) -> bool {
    if post.is_confession() {
        return false;
    }
    match post.group_id.as_deref().filter(|g| !g.is_empty()) {
        Some(group_id) => ctx.affiliation.can_see(group_id),
        None => true,
    }
}

/// Number of distinct interest keywords found in the post's text.
///
/// Keywords are trimmed, lowercased and deduplicated before matching, so an
/// interest listed twice (or as `"AI"` and `" ai"`) still counts once. Blank
/// keywords never match.
pub fn interest_matches(post: &Post, interests: &[String]) -> u32 {
    let haystack: Vec<String> = post
        .searchable_text()
        .into_iter()
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut keywords: Vec<String> = interests
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    keywords.sort();
    keywords.dedup();

    keywords
        .iter()
        .filter(|k| haystack.iter().any(|text| text.contains(k.as_str())))
        .count() as u32
}

pub fn score_post(post: &Post, ctx: &FeedContext<'_>) -> u32 {
    let identity = ctx.identity;
    let mut score = 0;

    if post.author_id != identity.id && !identity.department.is_empty() {
        let same_department = ctx
            .users
            .get(&post.author_id)
            .map(|author| author.department.eq_ignore_ascii_case(&identity.department))
            .unwrap_or(false);
        if same_department {
            score += SAME_DEPARTMENT_BONUS;
        }
    }

    if let Some(group_id) = post.group_id.as_deref() {
        if ctx.affiliation.is_member(group_id) {
            score += GROUP_MEMBER_BONUS;
        }
    }

    score + INTEREST_MATCH_BONUS * interest_matches(post, &identity.interests)
}

/// Visible posts in feed order.
///
/// `posts` must be in server order (newest first); `Latest` keeps it as is.
pub fn rank_feed(posts: &[Post], ctx: &FeedContext<'_>, mode: FeedMode) -> Vec<Post> {
    let visible = posts.iter().filter(|p| is_visible(p, ctx));

    match mode {
        FeedMode::Latest => visible.cloned().collect(),
        FeedMode::ForYou => {
            let mut scored: Vec<(u32, &Post)> = visible.map(|p| (score_post(p, ctx), p)).collect();
            scored.sort_by(|a, b| {
                b.0.cmp(&a.0)
                    .then_with(|| b.1.timestamp.cmp(&a.1.timestamp))
            });
            scored.into_iter().map(|(_, p)| p.clone()).collect()
        }
    }
}
