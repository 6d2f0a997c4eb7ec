//! Conflict-safe reaction writes.
//!
//! A reaction change is one store transaction over the post's reaction map, so no
//! committed state ever has the user in zero-then-two buckets. Conflicts are
//! retried with exponential backoff up to the configured budget.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::constants::fields;
use crate::error::{CoreError, Result};
use crate::models::Reactions;
use crate::store::{Collection, Document, DocumentStore, TxOutcome, TxUpdate};

#[derive(Clone)]
pub struct ReactionTransactor {
    store: Arc<dyn DocumentStore>,
    retry: RetryConfig,
}

impl ReactionTransactor {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Put `user_id` in the `reaction_type` bucket of `post_id` and nowhere else.
    ///
    /// Reacting again with the same type commits nothing. A missing post is a
    /// no-op, reported as [`TxOutcome::Skipped`].
    pub async fn react(
        &self,
        post_id: &str,
        reaction_type: &str,
        user_id: &str,
    ) -> Result<TxOutcome> {
        let update = move |current: Option<&Document>| {
            let mut reactions = read_reactions(current?, post_id)?;
            if reactions.bucket_of(user_id) == Some(reaction_type)
                && reactions.occurrences(user_id) == 1
            {
                return None;
            }
            reactions.set_exclusive(reaction_type, user_id);
            write_reactions(current?, &reactions)
        };
        self.transact(post_id, &update).await
    }

    /// Remove `user_id` from every bucket of `post_id`.
    pub async fn unreact(&self, post_id: &str, user_id: &str) -> Result<TxOutcome> {
        let update = move |current: Option<&Document>| {
            let mut reactions = read_reactions(current?, post_id)?;
            if !reactions.remove_user(user_id) {
                return None;
            }
            write_reactions(current?, &reactions)
        };
        self.transact(post_id, &update).await
    }

    async fn transact(&self, post_id: &str, update: &TxUpdate<'_>) -> Result<TxOutcome> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self
                .store
                .run_transaction(Collection::Posts, post_id, update)
                .await
            {
                Ok(outcome) => {
                    debug!(
                        "reactions: posts/{} {:?} after {} attempt(s)",
                        post_id, outcome, attempt
                    );
                    return Ok(outcome);
                }
                Err(e) if e.is_conflict() => {
                    if attempt > self.retry.max_retries {
                        warn!(
                            "reactions: giving up on posts/{} after {} attempts",
                            post_id, attempt
                        );
                        return Err(CoreError::WriteFailed {
                            target: format!("{}/{}", Collection::Posts, post_id),
                            attempts: attempt,
                        });
                    }
                    let delay = self.retry.backoff_for(attempt);
                    warn!(
                        "reactions: conflict on posts/{}, retry {}/{} in {:?}",
                        post_id, attempt, self.retry.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn read_reactions(doc: &Document, post_id: &str) -> Option<Reactions> {
    match doc.get(fields::REACTIONS) {
        None | Some(Value::Null) => Some(Reactions::new()),
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(reactions) => Some(reactions),
            Err(e) => {
                // Rewriting would drop whatever the other buckets hold
                warn!("reactions: posts/{} has unreadable reactions: {}", post_id, e);
                None
            }
        },
    }
}

fn write_reactions(doc: &Document, reactions: &Reactions) -> Option<Document> {
    let mut updated = doc.clone();
    updated.insert(fields::REACTIONS.to_string(), serde_json::to_value(reactions).ok()?);
    Some(updated)
}
