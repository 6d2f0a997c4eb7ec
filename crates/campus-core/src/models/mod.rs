pub mod conversation;
pub mod directory;
pub mod feed_mode;
pub mod identity;
pub mod notification;
pub mod post;
pub mod preferences;
pub mod story;

pub use conversation::{ChatMessage, Conversation, ConversationSummary};
pub use directory::{College, Course, DepartmentChannel, Group, Notice, UserProfile};
pub use feed_mode::FeedMode;
pub use identity::{Identity, Role};
pub use notification::{AppState, LocalNotification};
pub use post::{
    Comment, EventDetails, OpportunityDetails, Post, PostVariant, Reactions, SharedPost,
};
pub use preferences::{Preferences, PreferencesStorage};
pub use story::{PosterKey, Story, StoryEntity};
