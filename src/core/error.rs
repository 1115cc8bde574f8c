/*!
Error types for the log store
*/

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database could not be opened or a statement failed.
    #[error("storage unavailable: {0}")]
    Storage(#[from] rusqlite::Error),
    /// A concurrent writer kept winning the insert race for this module.
    #[error("concurrent write conflict on course module {cmid}")]
    WriteConflict { cmid: i64 },
    /// The event is missing a field the handler requires.
    #[error("malformed event: {0}")]
    MalformedEvent(String),
}

impl StoreError {
    /// True when a rusqlite error is a unique-constraint violation, the
    /// signature of a concurrent insert on the same module.
    pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
