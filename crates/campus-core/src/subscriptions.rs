//! Live-query lifecycle for one scope at a time.
//!
//! Every delivery carries the epoch its query was opened under. Tearing down a
//! scope bumps the epoch, so anything still in flight from the old queries is
//! rejected by [`SubscriptionManager::accept`].

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::constants::fields;
use crate::error::StoreError;
use crate::models::Identity;
use crate::scope::Scope;
use crate::stats::SnapshotStats;
use crate::store::{
    Collection, Delivery, DocumentStore, Filter, ListenerId, Query, Snapshot, SnapshotSink,
};

pub struct SubscriptionManager {
    store: Arc<dyn DocumentStore>,
    tx: UnboundedSender<Delivery>,
    epoch: u64,
    scope: Scope,
    listeners: Vec<(Collection, ListenerId)>,
    stats: SnapshotStats,
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn DocumentStore>, tx: UnboundedSender<Delivery>) -> Self {
        Self {
            store,
            tx,
            epoch: 0,
            scope: Scope::Empty,
            listeners: Vec::new(),
            stats: SnapshotStats::new(),
        }
    }

    /// The queries a scope opens, one per collection.
    pub fn queries_for(scope: &Scope, identity: &Identity) -> Vec<Query> {
        let college_id = match scope {
            Scope::Empty => return Vec::new(),
            Scope::Global { .. } => None,
            Scope::College { college_id, .. } => Some(college_id.as_str()),
        };

        Collection::ALL
            .into_iter()
            .map(|collection| {
                let mut query = Query::new(collection);
                if let Some(college_id) = college_id {
                    let field = match collection {
                        Collection::Colleges => fields::ID,
                        _ => fields::COLLEGE_ID,
                    };
                    query = query.filter(Filter::eq(field, college_id));
                }

                match collection {
                    // Participants only, whatever the role
                    Collection::Conversations => {
                        query = query.filter(Filter::array_contains(
                            fields::PARTICIPANT_IDS,
                            identity.id.as_str(),
                        ));
                    }
                    Collection::DepartmentChannels => {
                        if college_id.is_some() && !identity.department.is_empty() {
                            query = query.filter(Filter::eq(
                                fields::DEPARTMENT,
                                identity.department.as_str(),
                            ));
                        }
                    }
                    Collection::Posts => query = query.order_desc(fields::TIMESTAMP),
                    _ => {}
                }
                query
            })
            .collect()
    }

    /// Tear down the current scope and open every query for `scope`.
    ///
    /// All-or-nothing: if any subscription fails, the ones already opened are
    /// closed again and the manager is left with no active scope.
    pub fn open(&mut self, scope: Scope, identity: &Identity) -> Result<u64, StoreError> {
        self.teardown();

        let queries = Self::queries_for(&scope, identity);
        if queries.is_empty() {
            info!("subscriptions: scope {} has nothing to subscribe to", scope);
            self.scope = scope;
            return Ok(self.epoch);
        }

        for query in queries {
            let collection = query.collection;
            let sink = SnapshotSink::new(self.epoch, collection, self.tx.clone());
            match self.store.subscribe(query, sink) {
                Ok(listener) => self.listeners.push((collection, listener)),
                Err(e) => {
                    warn!(
                        "subscriptions: failed to subscribe to {} for {}: {}",
                        collection, scope, e
                    );
                    self.teardown();
                    return Err(e);
                }
            }
        }

        info!(
            "subscriptions: opened {} queries for {} (epoch {})",
            self.listeners.len(),
            scope,
            self.epoch
        );
        self.scope = scope;
        Ok(self.epoch)
    }

    /// Close every live query and invalidate in-flight deliveries.
    pub fn teardown(&mut self) {
        for (collection, listener) in self.listeners.drain(..) {
            debug!("subscriptions: closing {} listener {:?}", collection, listener);
            self.store.unsubscribe(listener);
        }
        self.epoch += 1;
        self.scope = Scope::Empty;
    }

    /// Admit a delivery if it belongs to the current epoch.
    pub fn accept(&mut self, delivery: Delivery) -> Option<Snapshot> {
        if delivery.epoch != self.epoch || self.listeners.is_empty() {
            debug!(
                "subscriptions: discarding stale {} snapshot (epoch {} != {})",
                delivery.snapshot.collection, delivery.epoch, self.epoch
            );
            self.stats.record_stale();
            return None;
        }
        self.stats.record(
            delivery.snapshot.collection,
            delivery.snapshot.documents.len(),
        );
        Some(delivery.snapshot)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn active_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::MemoryStore;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn student() -> Identity {
        Identity::new("u1", Role::Student, Some("A")).with_department("cs")
    }

    fn college_scope(id: &str) -> Scope {
        Scope::College {
            college_id: id.to_string(),
            role: Role::Student,
        }
    }

    #[test]
    fn test_college_queries_filter_by_college() {
        let queries = SubscriptionManager::queries_for(&college_scope("A"), &student());
        assert_eq!(queries.len(), Collection::ALL.len());

        for query in &queries {
            let field = if query.collection == Collection::Colleges {
                fields::ID
            } else {
                fields::COLLEGE_ID
            };
            assert!(
                query.filters.contains(&Filter::eq(field, "A")),
                "{} missing college filter",
                query.collection
            );
        }

        let conversations = queries
            .iter()
            .find(|q| q.collection == Collection::Conversations)
            .unwrap();
        assert!(conversations
            .filters
            .contains(&Filter::array_contains(fields::PARTICIPANT_IDS, "u1")));

        let channels = queries
            .iter()
            .find(|q| q.collection == Collection::DepartmentChannels)
            .unwrap();
        assert!(channels.filters.contains(&Filter::eq(fields::DEPARTMENT, "cs")));

        let posts = queries
            .iter()
            .find(|q| q.collection == Collection::Posts)
            .unwrap();
        assert!(posts.order_by.as_ref().map(|o| o.descending).unwrap_or(false));
    }

    #[test]
    fn test_global_queries_only_filter_conversations() {
        let admin = Identity::new("root", Role::SuperAdmin, None);
        let queries = SubscriptionManager::queries_for(
            &Scope::Global {
                role: Role::SuperAdmin,
            },
            &admin,
        );

        for query in queries {
            if query.collection == Collection::Conversations {
                assert_eq!(query.filters.len(), 1);
            } else {
                assert!(query.filters.is_empty(), "{} filtered", query.collection);
            }
        }
    }

    #[test]
    fn test_empty_scope_opens_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut manager = SubscriptionManager::new(store.clone(), tx);

        manager.open(Scope::Empty, &student()).unwrap();

        assert_eq!(manager.active_count(), 0);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_reopen_discards_stale_deliveries() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(
                Collection::Posts,
                json!({"id": "p1", "collegeId": "A"}).as_object().cloned().unwrap(),
            )
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = SubscriptionManager::new(store.clone(), tx);

        let first_epoch = manager.open(college_scope("A"), &student()).unwrap();
        let second_epoch = manager.open(college_scope("B"), &student()).unwrap();
        assert!(second_epoch > first_epoch);
        assert_eq!(store.listener_count(), Collection::ALL.len());

        let mut accepted = 0;
        while let Ok(delivery) = rx.try_recv() {
            let epoch = delivery.epoch;
            match manager.accept(delivery) {
                Some(snapshot) => {
                    assert_eq!(epoch, second_epoch);
                    assert!(snapshot.documents.is_empty(), "college B sees no A posts");
                    accepted += 1;
                }
                None => assert_eq!(epoch, first_epoch),
            }
        }

        assert_eq!(accepted, Collection::ALL.len());
        assert_eq!(manager.stats().discarded_stale, Collection::ALL.len() as u64);
    }
}
