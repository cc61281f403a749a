//! Typed error type for the db crate.

use nodes::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Json(source) => StoreError::Corrupt(source),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
