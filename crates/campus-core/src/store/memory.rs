//! In-memory [`DocumentStore`] used by tests and the CLI.
//!
//! Every write re-delivers a full snapshot to each listener on the touched
//! collection, which is the delivery contract of the real store.

use futures::future::{self, FutureExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::backend::{
    Collection, Document, DocumentStore, ListenerId, Query, SnapshotSink, StoreFuture,
    TxOutcome, TxUpdate,
};
use crate::error::StoreError;

#[derive(Default)]
struct Inner {
    collections: HashMap<Collection, BTreeMap<String, Document>>,
    listeners: BTreeMap<u64, (Query, SnapshotSink)>,
    next_listener: u64,
    /// Transactions that will abort with a conflict before one is allowed through
    pending_conflicts: u32,
    transaction_attempts: u32,
}

impl Inner {
    fn snapshot_for(&self, query: &Query) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .collections
            .get(&query.collection)
            .map(|docs| docs.values().filter(|d| query.matches(d)).cloned().collect())
            .unwrap_or_default();
        query.sort(&mut docs);
        docs
    }

    fn notify(&mut self, collection: Collection) {
        let mut closed = Vec::new();
        for (id, (query, sink)) in &self.listeners {
            if query.collection != collection {
                continue;
            }
            if !sink.deliver(self.snapshot_for(query)) {
                closed.push(*id);
            }
        }
        for id in closed {
            self.listeners.remove(&id);
        }
    }

    fn document_mut(
        &mut self,
        collection: Collection,
        id: &str,
    ) -> Result<&mut Document, StoreError> {
        self.collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.name().to_string(),
                id: id.to_string(),
            })
    }

    fn array_mut<'a>(
        doc: &'a mut Document,
        collection: Collection,
        id: &str,
        field: &str,
    ) -> Result<&'a mut Vec<Value>, StoreError> {
        let slot = doc
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        slot.as_array_mut().ok_or_else(|| StoreError::NotAnArray {
            collection: collection.name().to_string(),
            id: id.to_string(),
            field: field.to_string(),
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document synchronously, notifying listeners. Documents
    /// without a string `id` are rejected.
    pub fn insert(&self, collection: Collection, document: Document) -> Result<(), StoreError> {
        let id = document
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Malformed(format!("{} document without id", collection)))?
            .to_string();
        let mut inner = self.inner.lock();
        inner
            .collections
            .entry(collection)
            .or_default()
            .insert(id, document);
        inner.notify(collection);
        Ok(())
    }

    pub fn document(&self, collection: Collection, id: &str) -> Option<Document> {
        self.inner
            .lock()
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.inner
            .lock()
            .collections
            .get(&collection)
            .map(|d| d.len())
            .unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Make the next `count` transactions abort as if a concurrent writer won.
    pub fn inject_conflicts(&self, count: u32) {
        self.inner.lock().pending_conflicts = count;
    }

    pub fn transaction_attempts(&self) -> u32 {
        self.inner.lock().transaction_attempts
    }

    fn write<T>(
        &self,
        collection: Collection,
        op: impl FnOnce(&mut Inner) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut inner = self.inner.lock();
        let result = op(&mut inner)?;
        inner.notify(collection);
        Ok(result)
    }
}

impl DocumentStore for MemoryStore {
    fn subscribe(&self, query: Query, sink: SnapshotSink) -> Result<ListenerId, StoreError> {
        let mut inner = self.inner.lock();
        let id = inner.next_listener;
        inner.next_listener += 1;

        // Initial snapshot, like a real listener's first callback
        sink.deliver(inner.snapshot_for(&query));
        inner.listeners.insert(id, (query, sink));
        Ok(ListenerId(id))
    }

    fn unsubscribe(&self, listener: ListenerId) {
        self.inner.lock().listeners.remove(&listener.0);
    }

    fn create_document(
        &self,
        collection: Collection,
        mut document: Document,
    ) -> StoreFuture<'_, String> {
        let result = self.write(collection, |inner| {
            let id = match document.get("id").and_then(Value::as_str) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => uuid::Uuid::new_v4().to_string(),
            };
            document.insert("id".to_string(), Value::String(id.clone()));
            inner
                .collections
                .entry(collection)
                .or_default()
                .insert(id.clone(), document);
            Ok(id)
        });
        future::ready(result).boxed()
    }

    fn delete_document<'a>(&'a self, collection: Collection, id: &'a str) -> StoreFuture<'a, ()> {
        let result = self.write(collection, |inner| {
            if let Some(docs) = inner.collections.get_mut(&collection) {
                docs.remove(id);
            }
            Ok(())
        });
        future::ready(result).boxed()
    }

    fn set_field<'a>(
        &'a self,
        collection: Collection,
        id: &'a str,
        field: &'a str,
        value: Value,
    ) -> StoreFuture<'a, ()> {
        let result = self.write(collection, |inner| {
            inner
                .document_mut(collection, id)?
                .insert(field.to_string(), value);
            Ok(())
        });
        future::ready(result).boxed()
    }

    fn append_to_set<'a>(
        &'a self,
        collection: Collection,
        id: &'a str,
        field: &'a str,
        value: Value,
    ) -> StoreFuture<'a, ()> {
        let result = self.write(collection, |inner| {
            let doc = inner.document_mut(collection, id)?;
            let items = Inner::array_mut(doc, collection, id, field)?;
            if !items.contains(&value) {
                items.push(value);
            }
            Ok(())
        });
        future::ready(result).boxed()
    }

    fn remove_from_set<'a>(
        &'a self,
        collection: Collection,
        id: &'a str,
        field: &'a str,
        value: Value,
    ) -> StoreFuture<'a, ()> {
        let result = self.write(collection, |inner| {
            let doc = inner.document_mut(collection, id)?;
            let items = Inner::array_mut(doc, collection, id, field)?;
            items.retain(|item| item != &value);
            Ok(())
        });
        future::ready(result).boxed()
    }

    fn run_transaction<'a>(
        &'a self,
        collection: Collection,
        id: &'a str,
        update: &'a TxUpdate<'a>,
    ) -> StoreFuture<'a, TxOutcome> {
        let mut inner = self.inner.lock();
        inner.transaction_attempts += 1;

        if inner.pending_conflicts > 0 {
            inner.pending_conflicts -= 1;
            return future::ready(Err(StoreError::TransactionConflict {
                collection: collection.name().to_string(),
                id: id.to_string(),
            }))
            .boxed();
        }

        let current = inner
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id));
        let outcome = match update(current) {
            Some(mut replacement) => {
                replacement.insert("id".to_string(), Value::String(id.to_string()));
                inner
                    .collections
                    .entry(collection)
                    .or_default()
                    .insert(id.to_string(), replacement);
                inner.notify(collection);
                TxOutcome::Committed
            }
            None => TxOutcome::Skipped,
        };
        future::ready(Ok(outcome)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::{Delivery, Filter};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Delivery>) -> Vec<Delivery> {
        let mut out = Vec::new();
        while let Ok(delivery) = rx.try_recv() {
            out.push(delivery);
        }
        out
    }

    #[test]
    fn test_subscribe_delivers_initial_and_filtered_updates() {
        let store = MemoryStore::new();
        store
            .insert(Collection::Posts, doc(json!({"id": "p1", "collegeId": "A"})))
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let query = Query::new(Collection::Posts).filter(Filter::eq("collegeId", "A"));
        store
            .subscribe(query, SnapshotSink::new(7, Collection::Posts, tx))
            .unwrap();

        store
            .insert(Collection::Posts, doc(json!({"id": "p2", "collegeId": "B"})))
            .unwrap();

        let deliveries = drain(&mut rx);
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries.iter().all(|d| d.epoch == 7));
        assert_eq!(deliveries[1].snapshot.documents.len(), 1, "B post filtered out");
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let store = MemoryStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = store
            .subscribe(
                Query::new(Collection::Users),
                SnapshotSink::new(0, Collection::Users, tx),
            )
            .unwrap();
        drain(&mut rx);

        store.unsubscribe(listener);
        store
            .insert(Collection::Users, doc(json!({"id": "u1"})))
            .unwrap();

        assert!(drain(&mut rx).is_empty());
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_append_and_remove_from_set() {
        let store = MemoryStore::new();
        store
            .insert(Collection::Groups, doc(json!({"id": "g1"})))
            .unwrap();

        store
            .append_to_set(Collection::Groups, "g1", "followers", json!("u1"))
            .await
            .unwrap();
        store
            .append_to_set(Collection::Groups, "g1", "followers", json!("u1"))
            .await
            .unwrap();
        assert_eq!(
            store.document(Collection::Groups, "g1").unwrap()["followers"],
            json!(["u1"])
        );

        store
            .remove_from_set(Collection::Groups, "g1", "followers", json!("u1"))
            .await
            .unwrap();
        assert_eq!(
            store.document(Collection::Groups, "g1").unwrap()["followers"],
            json!([])
        );
    }

    #[tokio::test]
    async fn test_append_to_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store
            .append_to_set(Collection::Groups, "nope", "followers", json!("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let store = MemoryStore::new();
        let id = store
            .create_document(Collection::Notices, doc(json!({"title": "Exam"})))
            .await
            .unwrap();

        let stored = store.document(Collection::Notices, &id).unwrap();
        assert_eq!(stored["id"], json!(id));
    }

    #[tokio::test]
    async fn test_injected_conflict_aborts_transaction() {
        let store = MemoryStore::new();
        store
            .insert(Collection::Posts, doc(json!({"id": "p1"})))
            .unwrap();
        store.inject_conflicts(1);

        let update = |current: Option<&Document>| current.cloned();
        let first = store
            .run_transaction(Collection::Posts, "p1", &update)
            .await;
        assert!(first.unwrap_err().is_conflict());

        let second = store
            .run_transaction(Collection::Posts, "p1", &update)
            .await;
        assert_eq!(second.unwrap(), TxOutcome::Committed);
        assert_eq!(store.transaction_attempts(), 2);
    }
}
