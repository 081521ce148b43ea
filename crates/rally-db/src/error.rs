use rusqlite::ErrorCode;
use thiserror::Error;

/// Storage-layer errors. Raw driver errors are classified on the way in:
/// unique-constraint violations and busy/locked conditions get their own
/// variants because callers branch on them.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("database busy: {0}")]
    Busy(#[source] rusqlite::Error),

    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("storage failure: {0}")]
    Storage(#[source] rusqlite::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

impl DbError {
    /// True for failures worth retrying: the write lock is held elsewhere
    /// and will clear. Constraint violations and malformed statements are
    /// permanent and fail on the first attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_))
    }

    /// The violated constraint name ("table.column") when this is a
    /// unique-constraint failure.
    pub fn unique_constraint(&self) -> Option<&str> {
        match self {
            DbError::UniqueViolation { constraint } => Some(constraint),
            _ => None,
        }
    }

    pub(crate) fn into_exhausted(self, attempts: u32) -> DbError {
        match self {
            DbError::Busy(source) => DbError::Exhausted { attempts, source },
            other => other,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message) => match code.code {
                ErrorCode::ConstraintViolation => {
                    let constraint = message
                        .as_deref()
                        .and_then(|m| m.strip_prefix("UNIQUE constraint failed: "))
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation { constraint }
                }
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => DbError::Busy(err),
                _ => DbError::Storage(err),
            },
            _ => DbError::Storage(err),
        }
    }
}
