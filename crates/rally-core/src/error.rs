use rally_db::DbError;
use thiserror::Error;

/// Domain error taxonomy. Storage-layer failures are wrapped, never
/// re-worded: callers surface them as a generic internal error and the raw
/// driver text only ever reaches the logs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Ownership check failed. Deliberately carries no detail so callers
    /// cannot distinguish it from absence.
    #[error("not found")]
    Forbidden,

    #[error("a campaign with slug '{0}' already exists")]
    DuplicateSlug(String),

    #[error("a donation with this transaction signature already exists")]
    DuplicateSignature(String),

    #[error("storage failure")]
    Storage(#[from] DbError),
}

impl Error {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation { field, reason: reason.into() }
    }
}
