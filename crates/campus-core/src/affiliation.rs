use std::collections::HashSet;

use crate::models::{Group, Identity};

/// Groups an identity belongs to or follows.
///
/// Combines what the identity document says with what the groups snapshot says,
/// since either can lag behind the other after a join or follow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupAffiliation {
    pub member_of: HashSet<String>,
    pub following: HashSet<String>,
}

impl GroupAffiliation {
    pub fn resolve<'a>(identity: &Identity, groups: impl IntoIterator<Item = &'a Group>) -> Self {
        let mut member_of: HashSet<String> = identity.group_ids.iter().cloned().collect();
        let mut following: HashSet<String> =
            identity.followed_group_ids.iter().cloned().collect();

        for group in groups {
            if group.is_member(&identity.id) {
                member_of.insert(group.id.clone());
            }
            if group.is_follower(&identity.id) {
                following.insert(group.id.clone());
            }
        }

        Self {
            member_of,
            following,
        }
    }

    pub fn is_member(&self, group_id: &str) -> bool {
        self.member_of.contains(group_id)
    }

    pub fn is_following(&self, group_id: &str) -> bool {
        self.following.contains(group_id)
    }

    /// Member or follower
    pub fn can_see(&self, group_id: &str) -> bool {
        self.is_member(group_id) || self.is_following(group_id)
    }
}
