//! Error taxonomy for framing and transport failures.

use std::io;

use thiserror::Error;

use crate::response::Response;

/// A frame could not be turned into a message.
#[derive(Debug, Error)]
pub enum FramingError {
    /// Frame is not a valid JSON document of the expected shape.
    #[error("malformed frame: {message}")]
    Malformed {
        /// Parser diagnostic.
        message: String,
        /// Underlying serde error, when there is one.
        #[source]
        source: Option<serde_json::Error>,
    },
    /// Frame exceeds the configured size limit.
    #[error("frame too large: {size} bytes exceeds {max_size} byte limit")]
    TooLarge {
        /// Bytes buffered when the limit was hit.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },
}

impl FramingError {
    /// Creates a malformed frame error from a serde error.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::Malformed {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed frame error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true when the connection cannot continue after this error.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::TooLarge { .. })
    }

    /// Builds the error response sent back to the peer.
    pub fn to_response(&self) -> Response {
        match self {
            Self::Malformed { message, .. } => Response::error(format!("Invalid JSON: {message}")),
            Self::TooLarge { size, max_size } => Response::error(format!(
                "Request too large: {size} bytes exceeds {max_size} byte limit"
            )),
        }
    }
}

/// Socket-level failure, classified by what the peer did.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Nothing was listening at the address.
    #[error("connection refused: {source}")]
    Refused {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The peer reset or aborted the connection.
    #[error("connection reset: {source}")]
    Reset {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The peer stopped reading.
    #[error("broken pipe: {source}")]
    BrokenPipe {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// A read or write deadline elapsed.
    #[error("socket timed out: {source}")]
    Timeout {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Any other I/O failure.
    #[error("socket error: {source}")]
    Other {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Classifies an I/O error by kind.
    pub fn classify(source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused { source },
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => Self::Reset { source },
            io::ErrorKind::BrokenPipe => Self::BrokenPipe { source },
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::Timeout { source },
            _ => Self::Other { source },
        }
    }

    /// Short label suitable for structured log fields.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Refused { .. } => "refused",
            Self::Reset { .. } => "reset",
            Self::BrokenPipe { .. } => "broken_pipe",
            Self::Timeout { .. } => "timeout",
            Self::Other { .. } => "other",
        }
    }

    /// Returns true when a deadline elapsed.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<io::Error> for TransportError {
    fn from(source: io::Error) -> Self {
        Self::classify(source)
    }
}

/// Failure while reading the next frame from a stream.
#[derive(Debug, Error)]
pub enum FrameReadError {
    /// The bytes could not be framed.
    #[error(transparent)]
    Framing(#[from] FramingError),
    /// The socket failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<io::Error> for FrameReadError {
    fn from(source: io::Error) -> Self {
        Self::Transport(TransportError::classify(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(io::ErrorKind::ConnectionRefused, "refused")]
    #[case(io::ErrorKind::ConnectionReset, "reset")]
    #[case(io::ErrorKind::ConnectionAborted, "reset")]
    #[case(io::ErrorKind::BrokenPipe, "broken_pipe")]
    #[case(io::ErrorKind::WouldBlock, "timeout")]
    #[case(io::ErrorKind::TimedOut, "timeout")]
    #[case(io::ErrorKind::PermissionDenied, "other")]
    fn classifies_io_errors(#[case] kind: io::ErrorKind, #[case] label: &str) {
        let error = TransportError::classify(io::Error::from(kind));
        assert_eq!(error.label(), label);
    }

    #[test]
    fn malformed_response_names_invalid_json() {
        let response = FramingError::malformed("eof").to_response();
        assert_eq!(response.message(), Some("Invalid JSON: eof"));
    }

    #[test]
    fn only_oversized_frames_are_fatal() {
        assert!(FramingError::TooLarge { size: 2, max_size: 1 }.is_fatal());
        assert!(!FramingError::malformed("x").is_fatal());
    }
}
