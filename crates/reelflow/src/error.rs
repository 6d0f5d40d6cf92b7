//! Error types for reelflow.

use thiserror::Error;

/// A `Result` alias with [`enum@Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in reelflow operations.
///
/// Every variant carries a stable machine-readable code (see [`Error::code`])
/// so that API collaborators can map failures without parsing messages.
/// Notification failures are deliberately absent: they are logged and
/// swallowed by the engine, never surfaced to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A tenant-scoped entity (video, worker, tenant settings) does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity that was looked up ("video", "worker", ...).
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// A request was rejected before any write (missing field, unknown
    /// status name, malformed filter).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A unique constraint was violated, e.g. a duplicate worker email
    /// within a tenant.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value could not be decoded into its domain type.
    ///
    /// This typically indicates a status string written by a newer (or
    /// mangled) schema version.
    #[error("failed to decode stored {field}: {value}")]
    Decode {
        /// Column or field that held the value.
        field: &'static str,
        /// The offending raw value.
        value: String,
    },

    /// PostgreSQL storage error.
    ///
    /// Preserves the full `sqlx::Error` for matching on specific database
    /// error conditions (connection timeout, constraint violation, etc.).
    #[cfg(feature = "postgres")]
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl Error {
    /// Create a not-found error for a tenant-scoped entity.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Validation(_) => "validation",
            Error::Conflict(_) => "conflict",
            Error::Decode { .. } => "decode",
            #[cfg(feature = "postgres")]
            Error::Store(_) => "store",
        }
    }

    /// Returns `true` if retrying the whole operation may succeed.
    ///
    /// Covers connection-level and timeout failures from the store. The
    /// engine never retries internally; this is a hint for the caller.
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "postgres")]
            Error::Store(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Protocol(_)
            ),
            _ => false,
        }
    }
}

#[cfg(feature = "postgres")]
pub(crate) fn map_db_error(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref db) = e {
        // 23505 = unique_violation
        if db.code().as_deref() == Some("23505") {
            return Error::Conflict(db.message().to_owned());
        }
    }
    Error::Store(e)
}
