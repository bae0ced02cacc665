//! Error types shared by the engine and services.

/// Failure reported by a shared state store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Failure of an engine or service operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity (`timer`, `message`, `action`).
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The request was malformed or violated a constraint.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The store failed. Not retried at this level.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },
}

impl EngineError {
    /// Build a [`EngineError::NotFound`] for the given entity and id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
