use crate::models::LocalNotification;
use crate::scope::Scope;
use crate::store::Collection;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// A collection was replaced by a fresh snapshot
    SnapshotApplied {
        collection: Collection,
        documents: usize,
    },
    LocalNotification(LocalNotification),
    ScopeChanged(Scope),
    /// The identity is frozen - the host must end the session
    SessionTerminated { user_id: String },
}
