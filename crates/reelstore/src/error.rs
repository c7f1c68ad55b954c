//! Error types for reelstore

use std::fmt;
use std::io;

/// Result type alias for reelstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for list storage operations
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(io::Error),

    /// List file is malformed
    Parse(String),

    /// List name contains characters that cannot be used in a file name
    InvalidName(String),

    /// Entry contains a newline or exceeds the entry size limit
    InvalidEntry(String),

    /// Store is closed
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::InvalidName(name) => write!(f, "Invalid list name: {:?}", name),
            Error::InvalidEntry(msg) => write!(f, "Invalid entry: {}", msg),
            Error::Closed => write!(f, "Store is closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        Error::Parse(format!("{:?}", err))
    }
}
