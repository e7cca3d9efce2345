use arrow::error::ArrowError;
use thiserror::Error;

/// Broad class of an [`Error`], used by callers that only care about
/// whether the input was rejected or something went wrong internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Invalid,
    NotFound,
    Internal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    #[error("invalid group key: {0}")]
    InvalidGroupKey(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid time: {0}")]
    InvalidTime(String),

    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidWindow(_)
            | Error::InvalidGroupKey(_)
            | Error::InvalidDuration(_)
            | Error::InvalidTime(_)
            | Error::UnsupportedType(_) => ErrorCode::Invalid,
            Error::ColumnNotFound(_) => ErrorCode::NotFound,
            Error::Arrow(_) => ErrorCode::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
