//! Database error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQL error: {0}")]
    Sqlx(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Referenced row does not exist: {0}")]
    ForeignKey(String),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return DbError::Duplicate(db_err.message().to_string());
            }
            if db_err.is_foreign_key_violation() {
                return DbError::ForeignKey(db_err.message().to_string());
            }
        }
        DbError::Sqlx(err)
    }
}

impl From<scribe_common::ScribeError> for DbError {
    fn from(err: scribe_common::ScribeError) -> Self {
        DbError::InvalidData(err.to_string())
    }
}
