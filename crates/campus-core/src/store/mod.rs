pub mod app_data_store;
pub mod backend;
pub mod memory;

pub use app_data_store::AppDataStore;
pub use backend::{
    Collection, Delivery, Document, DocumentStore, Filter, ListenerId, OrderBy, Query, Snapshot,
    SnapshotSink, StoreFuture, TxOutcome, TxUpdate,
};
pub use memory::MemoryStore;
