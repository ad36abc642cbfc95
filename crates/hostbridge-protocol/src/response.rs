//! Response envelope returned by the bridge.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Message carried by a heartbeat reply.
pub const HEARTBEAT_MESSAGE: &str = "heartbeat_response";

/// Outcome of a single command, tagged by `status` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// The command completed.
    Success {
        /// Handler result. A present `null` is kept as `Some(Value::Null)`.
        #[serde(
            default,
            deserialize_with = "present_value",
            skip_serializing_if = "Option::is_none"
        )]
        data: Option<Value>,
        /// Informational message, used by heartbeat replies.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Seconds since the Unix epoch, used by heartbeat replies.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },
    /// The command failed.
    Error {
        /// Human-readable failure description.
        message: String,
        /// Captured stack trace, when one was available.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        traceback: Option<String>,
    },
}

fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl Response {
    /// Wraps handler output as a success.
    pub const fn success(data: Value) -> Self {
        Self::Success {
            data: Some(data),
            message: None,
            timestamp: None,
        }
    }

    /// Serialises `payload` into a success, falling back to an error
    /// response when the payload has no JSON representation.
    pub fn from_serializable<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(data) => Self::success(data),
            Err(error) => Self::error(format!("Failed to serialize response: {error}")),
        }
    }

    /// Builds the heartbeat reply stamped with the current time.
    pub fn heartbeat() -> Self {
        Self::Success {
            data: None,
            message: Some(HEARTBEAT_MESSAGE.to_owned()),
            timestamp: Some(unix_timestamp()),
        }
    }

    /// Builds an error without a traceback.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            traceback: None,
        }
    }

    /// Builds an error carrying a traceback.
    pub fn error_with_traceback(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            traceback: Some(traceback.into()),
        }
    }

    /// Returns true for [`Response::Success`].
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the message of either variant, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { message, .. } => message.as_deref(),
            Self::Error { message, .. } => Some(message),
        }
    }

    /// Returns the success payload, if any.
    pub const fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data, .. } => data.as_ref(),
            Self::Error { .. } => None,
        }
    }

    /// Returns true when this is a heartbeat reply.
    pub fn is_heartbeat(&self) -> bool {
        matches!(
            self,
            Self::Success { message: Some(message), .. } if message == HEARTBEAT_MESSAGE
        )
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}
