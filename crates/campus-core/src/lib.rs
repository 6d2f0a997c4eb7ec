pub mod affiliation;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod feed;
pub mod intents;
pub mod models;
pub mod reactions;
pub mod reconcile;
pub mod runtime;
pub mod scope;
pub mod stats;
pub mod stories;
pub mod store;
pub mod subscriptions;

pub use config::{CoreConfig, RetryConfig};
pub use error::{CoreError, StoreError};
pub use events::CoreEvent;
pub use runtime::CoreRuntime;
pub use scope::{Resolution, Scope, ScopeResolver};
