//! Error types for the population engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable numeric code, used as the process exit status for fatal errors.
    pub fn code(&self) -> i32 {
        match self {
            Error::Config(_) => 10,
            Error::NotFound(_) => 20,
            Error::Validation(_) => 30,
            Error::InvalidState(_) => 40,
            Error::Migration(_) => 50,
            Error::Serialization(_) => 60,
            Error::Io(_) => 70,
        }
    }

    /// Fatal errors abort the run; the rest are reported to the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Migration(_) | Error::InvalidState(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
