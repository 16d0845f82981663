use services::common::RepositoryError;
use tokio_postgres::error::SqlState;

/// Convert tokio_postgres::Error to RepositoryError
pub fn map_db_error(err: tokio_postgres::Error) -> RepositoryError {
    if err.is_closed() {
        return RepositoryError::ConnectionFailed("Connection closed".to_string());
    }

    let Some(db_err) = err.as_db_error() else {
        return RepositoryError::DatabaseError(err.into());
    };
    let message = db_err.message();

    match db_err.code() {
        &SqlState::UNIQUE_VIOLATION => RepositoryError::AlreadyExists,
        &SqlState::FOREIGN_KEY_VIOLATION => {
            RepositoryError::ForeignKeyViolation(message.to_string())
        }
        &SqlState::T_R_SERIALIZATION_FAILURE | &SqlState::T_R_DEADLOCK_DETECTED => {
            RepositoryError::TransactionConflict
        }
        &SqlState::CONNECTION_EXCEPTION
        | &SqlState::CONNECTION_DOES_NOT_EXIST
        | &SqlState::CONNECTION_FAILURE => RepositoryError::ConnectionFailed(message.to_string()),
        code => RepositoryError::DatabaseError(anyhow::anyhow!(
            "Database error ({}): {}",
            code.code(),
            message
        )),
    }
}

/// Map a pool checkout failure
pub fn map_pool_error(err: deadpool_postgres::PoolError) -> RepositoryError {
    RepositoryError::PoolError(anyhow::Error::new(err).context("Failed to get database connection"))
}
