//! Conversions from external infrastructure errors into domain errors.

use bookline_domain::BooklineError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub BooklineError);

impl From<InfraError> for BooklineError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<BooklineError> for InfraError {
    fn from(value: BooklineError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoBookline {
    fn into_bookline(self) -> BooklineError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → BooklineError */
/* -------------------------------------------------------------------------- */

impl IntoBookline for SqlError {
    fn into_bookline(self) -> BooklineError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        BooklineError::Persistence("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        BooklineError::Persistence("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        BooklineError::Persistence("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        BooklineError::Persistence("foreign key constraint violation".into())
                    }
                    _ => BooklineError::Persistence(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                BooklineError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                BooklineError::Persistence(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                BooklineError::Persistence(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                BooklineError::Persistence("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidQuery => BooklineError::Persistence("invalid SQL query".into()),
            other => BooklineError::Persistence(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_bookline())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → BooklineError */
/* -------------------------------------------------------------------------- */

impl IntoBookline for r2d2::Error {
    fn into_bookline(self) -> BooklineError {
        BooklineError::Persistence(format!("connection pool error: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_bookline())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → BooklineError */
/* -------------------------------------------------------------------------- */

impl IntoBookline for serde_json::Error {
    fn into_bookline(self) -> BooklineError {
        BooklineError::Persistence(format!("corrupt persisted payload: {self}"))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(value.into_bookline())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
