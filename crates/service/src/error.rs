use lockkeeper_core::error::CoreError;

/// Error type for lock and rights operations.
///
/// Wraps [`CoreError`] for domain errors (invalid arguments, denied
/// revocations) and passes store failures through unrecovered.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// A domain-level error from `lockkeeper_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The caller cancelled while waiting on a revocation.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Convenience type alias for service return values.
pub type LockResult<T> = Result<T, LockError>;
