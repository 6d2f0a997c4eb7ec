use thiserror::Error;

/// Failures reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A concurrent writer committed first; the transaction was aborted.
    #[error("transaction conflict on {collection}/{id}")]
    TransactionConflict { collection: String, id: String },

    /// Network trouble below the core. The store retries these itself.
    #[error("transient network failure: {0}")]
    TransientNetworkFailure(String),

    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("field {field} of {collection}/{id} is not an array")]
    NotAnArray {
        collection: String,
        id: String,
        field: String,
    },

    #[error("malformed document: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::TransactionConflict { .. })
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    /// A transactional write kept conflicting until the retry budget ran out.
    #[error("write to {target} failed after {attempts} attempts")]
    WriteFailed { target: String, attempts: u32 },

    #[error("no identity is signed in")]
    NotSignedIn,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
