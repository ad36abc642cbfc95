//! Wire protocol shared by the bridge server and its clients.
//!
//! Requests ([`Command`]) and replies ([`Response`]) travel as
//! newline-delimited JSON. The [`codec`] module owns framing and text
//! sanitisation; [`errors`] classifies what can go wrong below the
//! dispatch layer.

pub mod codec;
mod command;
pub mod errors;
mod response;

pub use codec::{FrameReader, MAX_FRAME_BYTES, decode_response, encode, encode_response};
pub use command::{Command, GET_SERVER_STATUS, GET_STATUS, HEARTBEAT};
pub use errors::{FrameReadError, FramingError, TransportError};
pub use response::{HEARTBEAT_MESSAGE, Response, unix_timestamp};
