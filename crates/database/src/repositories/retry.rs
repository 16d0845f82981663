use services::common::RepositoryError;

pub const MAX_ATTEMPTS: u32 = 3;
pub const INITIAL_BACKOFF_MS: u64 = 100;

/// Errors worth another attempt: the connection or transaction failed, not the statement
pub fn is_transient(err: &RepositoryError) -> bool {
    matches!(
        err,
        RepositoryError::TransactionConflict
            | RepositoryError::ConnectionFailed(_)
            | RepositoryError::PoolError(_)
    )
}

/// Retry a database operation with exponential backoff
#[macro_export]
macro_rules! retry_db {
    ($operation:expr, $block:block) => {{
        use std::time::{Duration, Instant};
        use $crate::repositories::retry::{is_transient, INITIAL_BACKOFF_MS, MAX_ATTEMPTS};

        let mut attempt = 0u32;
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        let start = Instant::now();

        loop {
            attempt += 1;
            let result: Result<_, RepositoryError> = async $block.await;

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(
                            operation = $operation,
                            attempt,
                            duration_ms = start.elapsed().as_millis() as u64,
                            "Database operation succeeded after retry"
                        );
                    }
                    break Ok(value);
                }
                Err(err) if is_transient(&err) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        operation = $operation,
                        attempt,
                        error = %err,
                        backoff_ms,
                        "Database operation failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
                Err(err) => {
                    tracing::error!(
                        operation = $operation,
                        attempt,
                        error = %err,
                        "Database operation failed permanently"
                    );
                    break Err(err);
                }
            }
        }
    }};
}
