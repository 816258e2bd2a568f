use thiserror::Error;

/// Errors surfaced by the queue.
///
/// A lost claim race is deliberately absent here: the dispatcher re-polls on
/// a failed compare-and-swap and never reports it. Ordinary "no rows
/// affected" outcomes are signalled as `Ok(false)` by the lifecycle calls,
/// not as errors.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("no job with id {0}")]
    NotFound(i64),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, QueueError>;
