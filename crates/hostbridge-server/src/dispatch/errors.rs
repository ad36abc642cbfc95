//! Error types for command dispatch.

use std::error::Error;

use thiserror::Error;

use hostbridge_protocol::Response;

/// Failure reported by a host command handler.
///
/// Handlers build these directly or convert any error with
/// [`HandlerError::from_error`], which records the source chain as the
/// traceback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    traceback: Option<String>,
}

impl HandlerError {
    /// Creates an error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
        }
    }

    /// Attaches a traceback.
    #[must_use]
    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }

    /// Converts any error, recording its `source()` chain as the traceback.
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut cause = error.source();
        while let Some(current) = cause {
            chain.push(format!("caused by: {current}"));
            cause = current.source();
        }
        let handler_error = Self::new(error.to_string());
        if chain.is_empty() {
            handler_error
        } else {
            handler_error.with_traceback(chain.join("\n"))
        }
    }

    /// Returns the failure description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the traceback, if any.
    pub fn traceback(&self) -> Option<&str> {
        self.traceback.as_deref()
    }
}

/// Errors surfaced by the dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No handler is registered for the command type.
    #[error("Unknown command type: {kind}")]
    UnknownCommand {
        /// The unrecognised command type.
        kind: String,
    },

    /// The handler returned an error.
    #[error("{}", .0.message())]
    Handler(HandlerError),

    /// The handler panicked.
    #[error("Handler for '{kind}' panicked: {message}")]
    Panicked {
        /// The command type whose handler panicked.
        kind: String,
        /// The panic message.
        message: String,
        /// The captured traceback, if any.
        traceback: Option<String>,
    },

    /// Registration attempted to shadow a built-in command type.
    #[error("cannot register handler for built-in command type '{kind}'")]
    Reserved {
        /// The reserved command type.
        kind: String,
    },

    /// Registration used an empty type name.
    #[error("command type must not be empty")]
    EmptyKind,
}

impl DispatchError {
    /// Creates an unknown command error.
    pub fn unknown_command(kind: impl Into<String>) -> Self {
        Self::UnknownCommand { kind: kind.into() }
    }

    /// Creates a reserved name error.
    pub fn reserved(kind: impl Into<String>) -> Self {
        Self::Reserved { kind: kind.into() }
    }

    /// Builds the error response sent back to the client.
    pub fn to_response(&self) -> Response {
        match self {
            Self::Handler(error) => match error.traceback() {
                Some(traceback) => Response::error_with_traceback(error.message(), traceback),
                None => Response::error(error.message()),
            },
            Self::Panicked {
                traceback: Some(traceback),
                ..
            } => Response::error_with_traceback(self.to_string(), traceback.clone()),
            _ => Response::error(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        source: io::Error,
    }

    #[test]
    fn from_error_records_source_chain() {
        let error = Outer {
            source: io::Error::other("disk full"),
        };
        let handler_error = HandlerError::from_error(&error);
        assert_eq!(handler_error.message(), "outer failure");
        assert_eq!(handler_error.traceback(), Some("caused by: disk full"));
    }

    #[test]
    fn unknown_command_response_names_type() {
        let response = DispatchError::unknown_command("bogus").to_response();
        assert_eq!(response, Response::error("Unknown command type: bogus"));
    }

    #[test]
    fn handler_traceback_is_forwarded() {
        let response =
            DispatchError::Handler(HandlerError::new("nope").with_traceback("line 3")).to_response();
        assert_eq!(response, Response::error_with_traceback("nope", "line 3"));
    }
}
