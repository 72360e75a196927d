use thiserror::Error as ThisError;

/// Errors surfaced by puzzle construction, file parsing and request decoding.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("line {line}: {msg}")]
    Parse { line: usize, msg: String },
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Error {
        Error::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
