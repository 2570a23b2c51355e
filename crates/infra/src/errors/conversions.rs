//! Conversions from external infrastructure errors into domain errors.

use ekuatia_domain::EkuatiaError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub EkuatiaError);

impl From<InfraError> for EkuatiaError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<EkuatiaError> for InfraError {
    fn from(value: EkuatiaError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → EkuatiaError */
/* -------------------------------------------------------------------------- */

impl From<SqlError> for InfraError {
    fn from(err: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;

        let domain = match &err {
            SqlError::SqliteFailure(code, message) => match code.code {
                ErrorCode::DatabaseBusy => EkuatiaError::Database("database is busy".into()),
                ErrorCode::DatabaseLocked => EkuatiaError::Database("database is locked".into()),
                ErrorCode::ConstraintViolation => EkuatiaError::Database(format!(
                    "constraint violation: {}",
                    message.clone().unwrap_or_default()
                )),
                _ => EkuatiaError::Database(err.to_string()),
            },
            SqlError::QueryReturnedNoRows => EkuatiaError::NotFound("row not found".into()),
            _ => EkuatiaError::Database(err.to_string()),
        };
        InfraError(domain)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → EkuatiaError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(err: HttpError) -> Self {
        let domain = if err.is_timeout() {
            EkuatiaError::Network(format!("request timed out: {err}"))
        } else if err.is_connect() {
            EkuatiaError::Network(format!("connection failed: {err}"))
        } else if err.is_builder() {
            EkuatiaError::Config(format!("invalid request: {err}"))
        } else {
            EkuatiaError::Network(err.to_string())
        };
        InfraError(domain)
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → EkuatiaError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(err: r2d2::Error) -> Self {
        InfraError(EkuatiaError::Database(format!("connection pool: {err}")))
    }
}
