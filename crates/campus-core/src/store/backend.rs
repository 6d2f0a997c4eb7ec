//! The seam between the core and the remote document store.

use futures::future::BoxFuture;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::StoreError;

/// A stored document: a JSON object that always carries its `id`.
pub type Document = serde_json::Map<String, Value>;

pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, StoreError>>;

/// Read-modify-write body of a transaction. Receives the current document (None if
/// it does not exist) and returns the replacement, or None to commit nothing.
/// May run several times when the store retries internally.
pub type TxUpdate<'a> = dyn Fn(Option<&Document>) -> Option<Document> + Send + Sync + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Colleges,
    Posts,
    Stories,
    Groups,
    Conversations,
    Courses,
    Notices,
    DepartmentChannels,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Users,
        Collection::Colleges,
        Collection::Posts,
        Collection::Stories,
        Collection::Groups,
        Collection::Conversations,
        Collection::Courses,
        Collection::Notices,
        Collection::DepartmentChannels,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Colleges => "colleges",
            Self::Posts => "posts",
            Self::Stories => "stories",
            Self::Groups => "groups",
            Self::Conversations => "conversations",
            Self::Courses => "courses",
            Self::Notices => "notices",
            Self::DepartmentChannels => "departmentChannels",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Server-side filter clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    ArrayContains { field: String, value: Value },
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn array_contains(field: &str, value: impl Into<Value>) -> Self {
        Self::ArrayContains {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq { field, value } => doc.get(field) == Some(value),
            Self::ArrayContains { field, value } => doc
                .get(field)
                .and_then(Value::as_array)
                .map(|items| items.contains(value))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// A live query: one collection plus filters, optionally ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: Collection,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            descending: true,
        });
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Sort `docs` the way the server would deliver them.
    pub fn sort(&self, docs: &mut [Document]) {
        let Some(order) = &self.order_by else {
            return;
        };
        docs.sort_by(|a, b| {
            let ord = compare_values(a.get(&order.field), b.get(&order.field));
            if order.descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Complete replacement value of one collection as seen by one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub collection: Collection,
    pub documents: Vec<Document>,
}

/// A snapshot tagged with the scope epoch its query was opened under.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub epoch: u64,
    pub snapshot: Snapshot,
}

/// Where a store pushes snapshots for one live query.
#[derive(Debug, Clone)]
pub struct SnapshotSink {
    epoch: u64,
    collection: Collection,
    tx: UnboundedSender<Delivery>,
}

impl SnapshotSink {
    pub fn new(epoch: u64, collection: Collection, tx: UnboundedSender<Delivery>) -> Self {
        Self {
            epoch,
            collection,
            tx,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Push a full snapshot. Returns false once the consumer is gone, after which
    /// the store should drop the listener.
    pub fn deliver(&self, documents: Vec<Document>) -> bool {
        self.tx
            .send(Delivery {
                epoch: self.epoch,
                snapshot: Snapshot {
                    collection: self.collection,
                    documents,
                },
            })
            .is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    /// The update chose not to write (e.g. the document is gone).
    Skipped,
}

/// Remote document store as consumed by the core.
///
/// Subscriptions push complete snapshots into the sink, in order, until
/// unsubscribed. Write primitives are single attempts; `run_transaction` fails with
/// [`StoreError::TransactionConflict`] when another writer won and the caller
/// decides whether to retry.
pub trait DocumentStore: Send + Sync {
    fn subscribe(&self, query: Query, sink: SnapshotSink) -> Result<ListenerId, StoreError>;

    fn unsubscribe(&self, listener: ListenerId);

    /// Create a document. A missing `id` is assigned by the store. Returns the id.
    fn create_document(&self, collection: Collection, document: Document)
        -> StoreFuture<'_, String>;

    fn delete_document<'a>(&'a self, collection: Collection, id: &'a str) -> StoreFuture<'a, ()>;

    fn set_field<'a>(
        &'a self,
        collection: Collection,
        id: &'a str,
        field: &'a str,
        value: Value,
    ) -> StoreFuture<'a, ()>;

    /// Add `value` to an array field unless an equal element is present.
    fn append_to_set<'a>(
        &'a self,
        collection: Collection,
        id: &'a str,
        field: &'a str,
        value: Value,
    ) -> StoreFuture<'a, ()>;

    /// Remove every element equal to `value` from an array field.
    fn remove_from_set<'a>(
        &'a self,
        collection: Collection,
        id: &'a str,
        field: &'a str,
        value: Value,
    ) -> StoreFuture<'a, ()>;

    fn run_transaction<'a>(
        &'a self,
        collection: Collection,
        id: &'a str,
        update: &'a TxUpdate<'a>,
    ) -> StoreFuture<'a, TxOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filters() {
        let conversation = doc(json!({
            "id": "c1",
            "collegeId": "A",
            "participantIds": ["u1", "u2"]
        }));

        assert!(Filter::eq("collegeId", "A").matches(&conversation));
        assert!(!Filter::eq("collegeId", "B").matches(&conversation));
        assert!(Filter::array_contains("participantIds", "u2").matches(&conversation));
        assert!(!Filter::array_contains("participantIds", "u3").matches(&conversation));
        assert!(!Filter::array_contains("collegeId", "A").matches(&conversation));
    }

    #[test]
    fn test_order_desc() {
        let query = Query::new(Collection::Posts).order_desc("timestamp");
        let mut docs = vec![
            doc(json!({"id": "a", "timestamp": 1})),
            doc(json!({"id": "b", "timestamp": 3})),
            doc(json!({"id": "c"})),
            doc(json!({"id": "d", "timestamp": 2})),
        ];
        query.sort(&mut docs);

        let ids: Vec<&str> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_collection_names_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_name(collection.name()), Some(collection));
        }
    }
}
