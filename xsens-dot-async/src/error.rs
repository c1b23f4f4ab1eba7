//! Error types for this crate.

use std::fmt::Display;

use xsens_dot::DecodeError;

/// A convenience type alias for a `Result` with an `Error` type.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur in this crate.
#[derive(Debug, Clone)]
pub struct Error {
    data: ErrorData,
}

/// The kind of error that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// The transport could not establish a link to the device.
    ConnectFailed,
    /// A general transport I/O failure.
    Transport,
    /// The link dropped without the session asking for it.
    UnexpectedDisconnect,
    /// The transport did not answer within the session's timeout.
    Timeout,
    /// A fixed-size characteristic had the wrong length.
    LengthMismatch,
    /// A payload could not be decoded.
    Decode,
    /// The device rejected a write.
    RejectedByDevice,
    /// The operation is not valid in the session's current state.
    InvalidState,
    /// The characteristic does not support the operation.
    NotPermitted,
    /// An argument was outside the range the device accepts.
    InvalidArgument,
}

#[derive(Debug, Clone)]
enum ErrorData {
    Decode(DecodeError),
    Custom(ErrorKind, String),
    Simple(ErrorKind),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            ErrorData::Decode(error) => error.fmt(f),
            ErrorData::Custom(kind, message) => write!(f, "{kind}: {message}"),
            ErrorData::Simple(kind) => kind.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.data {
            ErrorData::Decode(error) => Some(error),
            _ => None,
        }
    }
}

impl From<DecodeError> for Error {
    fn from(error: DecodeError) -> Self {
        Error {
            data: ErrorData::Decode(error),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            data: ErrorData::Simple(kind),
        }
    }
}

impl Error {
    /// Creates an error of the given kind with a detail message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            data: ErrorData::Custom(kind, message.into()),
        }
    }

    /// A transport I/O failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// The device refused a write.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RejectedByDevice, message)
    }

    /// The transport could not reach the device.
    pub fn connect_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectFailed, message)
    }

    pub(crate) fn invalid_state(operation: &str, state: impl Display) -> Self {
        Self::new(
            ErrorKind::InvalidState,
            format!("cannot {operation} while the session is {state}"),
        )
    }

    /// If this is a decode failure, returns a reference to the underlying `DecodeError`.
    pub fn get_ref(&self) -> Option<&DecodeError> {
        match &self.data {
            ErrorData::Decode(error) => Some(error),
            _ => None,
        }
    }

    /// If this is a decode failure, returns the underlying `DecodeError`.
    pub fn into_inner(self) -> Option<DecodeError> {
        match self.data {
            ErrorData::Decode(error) => Some(error),
            _ => None,
        }
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> ErrorKind {
        match &self.data {
            ErrorData::Decode(error) if error.is_length_mismatch() => ErrorKind::LengthMismatch,
            ErrorData::Decode(_) => ErrorKind::Decode,
            ErrorData::Custom(kind, _) => *kind,
            ErrorData::Simple(kind) => *kind,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorKind::ConnectFailed => "connect failed",
            ErrorKind::Transport => "transport error",
            ErrorKind::UnexpectedDisconnect => "unexpected disconnect",
            ErrorKind::Timeout => "timed out",
            ErrorKind::LengthMismatch => "length mismatch",
            ErrorKind::Decode => "decode error",
            ErrorKind::RejectedByDevice => "rejected by device",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::NotPermitted => "not permitted",
            ErrorKind::InvalidArgument => "invalid argument",
        })
    }
}
