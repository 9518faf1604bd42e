//! Conversions from external infrastructure errors into domain errors.

use r2d2::Error as PoolError;
use rusqlite::Error as SqlError;
use timeguard_domain::TimeguardError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TimeguardError);

impl From<InfraError> for TimeguardError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TimeguardError> for InfraError {
    fn from(value: TimeguardError) -> Self {
        InfraError(value)
    }
}

trait IntoTimeguardError {
    fn into_timeguard(self) -> TimeguardError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → TimeguardError */
/* -------------------------------------------------------------------------- */

impl IntoTimeguardError for SqlError {
    fn into_timeguard(self) -> TimeguardError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        TimeguardError::Repository("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        TimeguardError::Repository("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        TimeguardError::Repository("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 275) => {
                        TimeguardError::InvalidInput(format!("check constraint failed: {message}"))
                    }
                    _ => TimeguardError::Repository(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => TimeguardError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                TimeguardError::Repository(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                TimeguardError::Repository(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => TimeguardError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => TimeguardError::Repository(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_timeguard())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → TimeguardError */
/* -------------------------------------------------------------------------- */

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        InfraError(TimeguardError::Repository(format!("connection pool: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → TimeguardError */
/* -------------------------------------------------------------------------- */

impl From<JoinError> for InfraError {
    fn from(value: JoinError) -> Self {
        let message = if value.is_cancelled() {
            "blocking task cancelled".to_string()
        } else {
            format!("blocking task panicked: {value}")
        };
        InfraError(TimeguardError::Internal(message))
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → TimeguardError */
/* -------------------------------------------------------------------------- */

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let mapped = match value.kind() {
            ErrorKind::NotFound => TimeguardError::NotFound(value.to_string()),
            ErrorKind::PermissionDenied => {
                TimeguardError::Platform(format!("permission denied: {value}"))
            }
            ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock => {
                TimeguardError::TransientPlatform(value.to_string())
            }
            _ => TimeguardError::Platform(value.to_string()),
        };
        InfraError(mapped)
    }
}

/// Map any convertible infrastructure error straight to the domain error.
pub(crate) fn to_domain<E>(err: E) -> TimeguardError
where
    InfraError: From<E>,
{
    InfraError::from(err).into()
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
