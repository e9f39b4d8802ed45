//! The `errors` module defines the common error types returned by the codec.

use std::error;
use std::fmt;
use std::io;

use super::Result;

/// `Error` enumerates every way an encode or decode call can fail.
#[derive(Debug)]
pub enum Error {
    /// A caller-supplied argument is out of range or otherwise nonsensical.
    InvalidArgument(&'static str),
    /// The byte stream is not a valid SRLA stream (bad magic, version, header field).
    InvalidFormat(&'static str),
    /// The destination buffer is too small to hold the result.
    InsufficientBuffer,
    /// The input byte stream ended before a complete block could be read.
    InsufficientData,
    /// Encode or decode was attempted before the required parameters were set.
    ParameterNotSet,
    /// A block's checksum did not match its payload.
    DataCorruption,
    /// An internal failure that does not fit any of the above.
    Unclassified(&'static str),
    /// An IO error occurred while reading or writing the byte stream.
    IoError(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::InvalidFormat(msg) => write!(f, "invalid format: {}", msg),
            Error::InsufficientBuffer => write!(f, "destination buffer too small"),
            Error::InsufficientData => write!(f, "input data truncated"),
            Error::ParameterNotSet => write!(f, "parameters not set before encode/decode"),
            Error::DataCorruption => write!(f, "checksum mismatch: data corruption detected"),
            Error::Unclassified(msg) => write!(f, "unclassified failure: {}", msg),
            Error::IoError(ref err) => err.fmt(f),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::InsufficientData,
            _ => Error::IoError(err),
        }
    }
}

/// Constructs an `InvalidFormat` error.
pub fn format_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidFormat(desc))
}

/// Constructs an `InvalidArgument` error.
pub fn argument_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidArgument(desc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_non_empty() {
        let variants: Vec<Error> = vec![
            Error::InvalidArgument("x"),
            Error::InvalidFormat("x"),
            Error::InsufficientBuffer,
            Error::InsufficientData,
            Error::ParameterNotSet,
            Error::DataCorruption,
            Error::Unclassified("x"),
        ];
        for v in variants {
            assert!(!format!("{}", v).is_empty());
        }
    }

    #[test]
    fn eof_io_error_converts_to_insufficient_data() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::InsufficientData));
    }
}
