//! Command envelope sent from the control process to the bridge.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::codec::lossy_text;
use crate::errors::FramingError;

/// Name of the built-in liveness check.
pub const HEARTBEAT: &str = "heartbeat";

/// Name of the built-in status query.
pub const GET_STATUS: &str = "get_status";

/// Legacy alias for [`GET_STATUS`].
pub const GET_SERVER_STATUS: &str = "get_server_status";

/// A single request: a type name plus an open map of parameters.
///
/// Unknown top-level fields are ignored on decode, so clients may attach
/// metadata such as a send timestamp without breaking older servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Command type used for dispatch.
    #[serde(rename = "type")]
    pub kind: String,
    /// Parameters forwarded to the handler.
    #[serde(default, deserialize_with = "params_or_empty")]
    pub params: Map<String, Value>,
    /// Marks health-check traffic so servers can log it quietly.
    #[serde(
        rename = "_health_check",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub health_check: bool,
}

impl Command {
    /// Builds a command with no parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
            health_check: false,
        }
    }

    /// Builds a heartbeat command.
    pub fn heartbeat() -> Self {
        Self::new(HEARTBEAT)
    }

    /// Adds a parameter, replacing any previous value under `key`.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Replaces the parameter map.
    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Flags the command as health-check traffic.
    #[must_use]
    pub const fn as_health_check(mut self) -> Self {
        self.health_check = true;
        self
    }

    /// Decodes one frame into a command.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD before parsing and surrounding
    /// whitespace (including the frame delimiter) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::Malformed`] when the frame is empty or is not a
    /// JSON object carrying a string `type`.
    pub fn parse(frame: &[u8]) -> Result<Self, FramingError> {
        let text = lossy_text(frame);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(FramingError::malformed("empty request line"));
        }
        serde_json::from_str(trimmed).map_err(FramingError::from_json_error)
    }

    /// Returns the normalised type name.
    pub fn kind(&self) -> &str {
        self.kind.trim()
    }
}

fn params_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Map<String, Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
