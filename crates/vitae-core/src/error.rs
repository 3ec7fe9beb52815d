use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("entropy source unavailable")]
    EntropyUnavailable,

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
