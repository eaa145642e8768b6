//! Job store error types.

use thiserror::Error;

use vrec_models::JobId;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Invalid job row {id}: {message}")]
    InvalidRow { id: i64, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DbError {
    pub fn invalid_row(id: i64, message: impl Into<String>) -> Self {
        Self::InvalidRow {
            id,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
