use scribe_common::ScribeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Outbound request blocked: {0}")]
    Blocked(String),

    #[error("Registry returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Clinical trial with NCT ID {0} not found")]
    NotFound(String),

    #[error("Unexpected registry payload: {0}")]
    Decode(String),

    #[error("Invalid proxy path: {0}")]
    InvalidPath(String),

    #[error("Registry client misconfigured: {0}")]
    Config(String),
}

impl From<ScribeError> for RegistryError {
    fn from(err: ScribeError) -> Self {
        match err {
            ScribeError::Security(msg) => RegistryError::Blocked(msg),
            ScribeError::Http(e)       => RegistryError::Http(e),
            other                      => RegistryError::Config(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
