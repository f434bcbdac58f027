use thiserror::Error;

/// Errors that can occur when using an `AnyStore`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The requested key was not found
    #[error("Key not found in store: {0}")]
    KeyNotFound(String),

    /// Attempted to access a value with a type that doesn't match what was stored
    #[error("Type mismatch: requested {expected}, stored {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A mutation was issued from inside a `with`/`get_and_apply` closure
    #[error("Store mutated while a value was borrowed by a read closure")]
    ReentrantMutation,

    /// `detach` was called while the calling thread already held the store
    /// lock and deliveries for the observer were still running
    #[error("Cannot detach an observer with running deliveries while the store lock is held")]
    DetachWhileLocked,
}
