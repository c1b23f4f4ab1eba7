//! Decode errors for characteristic payloads.

use std::fmt::Display;

pub type Result<T> = std::result::Result<T, DecodeError>;

/// A byte sequence could not be decoded into a characteristic value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    context: &'static str,
    kind: DecodeErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecodeErrorKind {
    /// A fixed-size characteristic was given a buffer of the wrong length.
    LengthMismatch { expected: usize, actual: usize },
    /// A variable-size payload ended before all of its fields were read.
    Truncated { needed: usize, available: usize },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.context, self.kind)
    }
}

impl std::error::Error for DecodeError {}

impl Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeErrorKind::LengthMismatch { expected, actual } => {
                write!(f, "expected {expected} bytes, got {actual}")
            }
            DecodeErrorKind::Truncated { needed, available } => {
                write!(f, "truncated ({needed} bytes needed, {available} available)")
            }
        }
    }
}

impl DecodeError {
    pub(crate) fn length_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Self {
            context,
            kind: DecodeErrorKind::LengthMismatch { expected, actual },
        }
    }

    pub(crate) fn truncated(context: &'static str, needed: usize, available: usize) -> Self {
        Self {
            context,
            kind: DecodeErrorKind::Truncated { needed, available },
        }
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> DecodeErrorKind {
        self.kind
    }

    /// Returns the name of the value that failed to decode.
    pub fn context(&self) -> &'static str {
        self.context
    }

    /// Returns `true` if this is a length mismatch on a fixed-size characteristic.
    pub fn is_length_mismatch(&self) -> bool {
        matches!(self.kind, DecodeErrorKind::LengthMismatch { .. })
    }
}
