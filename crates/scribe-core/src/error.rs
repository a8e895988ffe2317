use scribe_common::{FieldErrors, ScribeError};
use scribe_db::DbError;
use scribe_llm::LlmError;
use scribe_trials::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Db(DbError),

    #[error("Registry error: {0}")]
    Registry(RegistryError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

impl ServiceError {
    pub fn validation(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::default();
        errors.push(field, message);
        ServiceError::Validation(errors)
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what)   => ServiceError::NotFound(what),
            DbError::Duplicate(what)  => ServiceError::Conflict(what),
            DbError::ForeignKey(what) => ServiceError::NotFound(what),
            other                     => ServiceError::Db(other),
        }
    }
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id)       => ServiceError::NotFound(format!("clinical trial {id}")),
            RegistryError::InvalidPath(path)  => ServiceError::BadRequest(format!("invalid path {path}")),
            other                             => ServiceError::Registry(other),
        }
    }
}

impl From<ScribeError> for ServiceError {
    fn from(err: ScribeError) -> Self {
        match err {
            ScribeError::Validation(fields) => ServiceError::Validation(fields),
            other                           => ServiceError::BadRequest(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
