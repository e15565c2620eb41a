//! Connection and encoding helpers shared by the Redis adapters.

use guardrail_core::{AppError, AppResult};
use redis::aio::MultiplexedConnection;

pub(crate) async fn connect(client: &redis::Client) -> AppResult<MultiplexedConnection> {
    client
        .get_multiplexed_async_connection()
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))
}

pub(crate) fn storage_error(action: &str, error: redis::RedisError) -> AppError {
    AppError::Unavailable(format!("failed to {action}: {error}"))
}

/// Converts a caller limit into an inclusive `ZRANGE` stop index.
pub(crate) fn range_stop(limit: usize) -> isize {
    isize::try_from(limit).map_or(-1, |limit| limit - 1)
}

/// Converts a caller limit into a `LIMIT offset count` count.
pub(crate) fn limit_count(limit: usize) -> isize {
    isize::try_from(limit).unwrap_or(isize::MAX)
}
