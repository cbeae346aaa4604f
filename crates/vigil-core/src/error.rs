//! Error types for Vigil authorization

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Result type alias for authorization operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the authorization core
///
/// Everything here is recoverable by the caller. Wrong PINs and lockouts are
/// user-facing, `InvalidState` is a caller protocol violation.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed setup fields or PIN input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Amount is not a positive integer
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// No credential exists yet
    #[error("PIN not set up - run setup first")]
    NotConfigured,

    /// Incorrect PIN, retry allowed
    #[error("Incorrect PIN ({0} attempts remaining)")]
    WrongPin(u32),

    /// Too many incorrect PINs; alert fired and session reset
    #[error("Too many incorrect PIN attempts - session reset and trusted contact alerted")]
    LockedOut,

    /// Operation not valid in the current session state
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Neither the requested nor the fallback rendering could be produced
    #[error("No OTP artifact could be rendered: {0}")]
    ArtifactUnavailable(String),

    /// Persistent state could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Hashing failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
