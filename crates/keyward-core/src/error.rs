//! Error types for Keyward

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Authentication Errors
    #[error("Bad credentials")]
    InvalidCredentials,

    #[error("Directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Authentication failed")]
    NoProviderSucceeded,

    // Startup Errors
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    // Internal Store Errors
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidCredentials => "invalid_credentials",
            Error::DirectoryUnavailable(_) => "directory_unavailable",
            Error::NoProviderSucceeded => "authentication_failed",
            Error::Configuration(_) => "configuration_error",
            Error::UserAlreadyExists(_) => "user_exists",
            Error::DatabaseError(_) | Error::Io(_) => "internal_error",
        }
    }

    /// Whether this failure says something about the credential itself,
    /// as opposed to the health of a backing service.
    pub fn is_credential_rejection(&self) -> bool {
        matches!(self, Error::InvalidCredentials | Error::NoProviderSucceeded)
    }

    /// Status an outer HTTP layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidCredentials | Error::NoProviderSucceeded => 401,
            Error::UserAlreadyExists(_) => 409,
            Error::DirectoryUnavailable(_) => 503,
            _ => 500,
        }
    }
}
