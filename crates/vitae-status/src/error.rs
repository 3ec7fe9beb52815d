use thiserror::Error;

/// Errors from status lists and the list registry. Messages carry list ids
/// and indices only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("index {index} out of range for list of {size} entries")]
    IndexOutOfRange { index: u64, size: u64 },

    #[error("status list full: {0}")]
    ListFull(String),

    #[error("unknown status list: {0}")]
    UnknownList(String),

    #[error("status list already registered: {0}")]
    DuplicateList(String),

    #[error("invalid list size {0}: must be positive and a multiple of 8")]
    InvalidSize(u64),

    #[error("bitmap decoding failed: {0}")]
    DecodingFailed(String),
}

pub type StatusResult<T> = Result<T, StatusError>;
