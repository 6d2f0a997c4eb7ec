//! Application-wide constants
//!
//! Collection names, field names and ranking weights shared across modules.

/// Stories drop out of every view this long after they were posted
pub const STORY_TTL_SECS: u64 = 24 * 60 * 60;

/// Display name used when a message sender is not in the users snapshot yet
pub const UNKNOWN_SENDER_NAME: &str = "New message";

// For-you ranking weights
pub const SAME_DEPARTMENT_BONUS: u32 = 5;
pub const GROUP_MEMBER_BONUS: u32 = 8;
pub const INTEREST_MATCH_BONUS: u32 = 3;

/// Document field names used in queries and write primitives
pub mod fields {
    pub const ID: &str = "id";
    pub const COLLEGE_ID: &str = "collegeId";
    pub const DEPARTMENT: &str = "department";
    pub const PARTICIPANT_IDS: &str = "participantIds";
    pub const TIMESTAMP: &str = "timestamp";
    pub const CONTENT: &str = "content";
    pub const REACTIONS: &str = "reactions";
    pub const COMMENTS: &str = "comments";
    pub const MESSAGES: &str = "messages";
    pub const VIEWED_BY: &str = "viewedBy";
    pub const MEMBER_IDS: &str = "memberIds";
    pub const FOLLOWERS: &str = "followers";
}
