//! Newline-delimited JSON framing.
//!
//! Each message is one UTF-8 JSON document followed by a single `\n`. JSON
//! string escaping never emits a raw newline, so the delimiter cannot occur
//! inside a document and readers can split frames without parsing them.

use std::borrow::Cow;
use std::io::{self, Read, Write};

use serde::Serialize;

use crate::errors::{FrameReadError, FramingError};
use crate::response::Response;

/// Byte terminating every frame.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Largest frame accepted by [`FrameReader::new`].
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Encodes a message as a delimited frame.
///
/// # Errors
///
/// Returns the serde error when `message` has no JSON representation.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut frame = serde_json::to_vec(message)?;
    frame.push(FRAME_DELIMITER);
    Ok(frame)
}

/// Encodes a response, substituting an error response if encoding fails.
pub fn encode_response(response: &Response) -> Vec<u8> {
    encode(response).unwrap_or_else(|error| {
        let fallback = format!(
            "{{\"status\":\"error\",\"message\":{}}}\n",
            serde_json::Value::String(format!("Failed to serialize response: {error}"))
        );
        fallback.into_bytes()
    })
}

/// Writes one response frame and flushes.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> io::Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()
}

/// Decodes a frame as a response.
///
/// # Errors
///
/// Returns [`FramingError::Malformed`] when the frame is not a response.
pub fn decode_response(frame: &[u8]) -> Result<Response, FramingError> {
    let text = lossy_text(frame);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FramingError::malformed("empty response line"));
    }
    serde_json::from_str(trimmed).map_err(FramingError::from_json_error)
}

/// Converts raw bytes to text, replacing invalid UTF-8 with U+FFFD.
///
/// Hosts that capture process output should pass it through here before
/// placing it in a response.
pub fn lossy_text(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Splits a byte stream into delimited frames.
///
/// Bytes after a delimiter are kept for the next call. When the peer closes
/// the stream with an undelimited remainder, that remainder is returned as a
/// final frame. Blank frames are skipped.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a delimiter.
    scanned: usize,
    max_frame: usize,
    eof: bool,
}

impl<R: Read> FrameReader<R> {
    /// Wraps `reader` with the default frame limit.
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, MAX_FRAME_BYTES)
    }

    /// Wraps `reader`, rejecting frames longer than `max_frame` bytes.
    pub fn with_limit(reader: R, max_frame: usize) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            scanned: 0,
            max_frame,
            eof: false,
        }
    }

    /// Returns the next frame without its delimiter, or `None` at end of
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::TooLarge`] when a frame exceeds the limit and a
    /// transport error when the underlying read fails (including a read
    /// timeout).
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameReadError> {
        loop {
            if let Some(frame) = self.take_delimited()? {
                if is_blank(&frame) {
                    continue;
                }
                return Ok(Some(frame));
            }

            if self.eof {
                return self.take_remainder();
            }

            self.enforce_limit(self.buffer.len())?;
            self.fill()?;
        }
    }

    fn take_delimited(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        let unscanned = self.buffer.get(self.scanned..).unwrap_or_default();
        let Some(offset) = unscanned.iter().position(|byte| *byte == FRAME_DELIMITER) else {
            self.scanned = self.buffer.len();
            return Ok(None);
        };
        let position = self.scanned + offset;
        self.enforce_limit(position)?;
        self.scanned = 0;
        let mut frame: Vec<u8> = self.buffer.drain(..=position).collect();
        frame.pop();
        if frame.last() == Some(&b'\r') {
            frame.pop();
        }
        Ok(Some(frame))
    }

    fn take_remainder(&mut self) -> Result<Option<Vec<u8>>, FrameReadError> {
        let remainder = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if is_blank(&remainder) {
            return Ok(None);
        }
        self.enforce_limit(remainder.len())?;
        Ok(Some(remainder))
    }

    fn fill(&mut self) -> Result<(), FrameReadError> {
        let mut chunk = [0_u8; READ_CHUNK];
        let read = read_with_retry(&mut self.reader, &mut chunk)?;
        if read == 0 {
            self.eof = true;
        } else {
            self.buffer.extend_from_slice(chunk.get(..read).unwrap_or_default());
        }
        Ok(())
    }

    fn enforce_limit(&self, size: usize) -> Result<(), FramingError> {
        if size > self.max_frame {
            return Err(FramingError::TooLarge {
                size,
                max_size: self.max_frame,
            });
        }
        Ok(())
    }
}

fn read_with_retry<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::errors::TransportError;
    use rstest::rstest;
    use serde_json::{Value, json};
    use std::io::Cursor;

    /// Reader that hands out its input in fixed-size pieces.
    struct Trickle {
        data: Vec<u8>,
        offset: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let remaining = self.data.get(self.offset..).unwrap_or_default();
            let count = remaining.len().min(self.step).min(buf.len());
            buf[..count].copy_from_slice(&remaining[..count]);
            self.offset += count;
            Ok(count)
        }
    }

    /// Reader that hands out its input and then times out.
    struct Stalling {
        data: Vec<u8>,
        offset: usize,
    }

    impl Read for Stalling {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let remaining = self.data.get(self.offset..).unwrap_or_default();
            if remaining.is_empty() {
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
            let count = remaining.len().min(buf.len());
            buf[..count].copy_from_slice(&remaining[..count]);
            self.offset += count;
            Ok(count)
        }
    }

    struct TimingOut;

    impl Read for TimingOut {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        }
    }

    fn frames_of<R: Read>(reader: &mut FrameReader<R>) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame().expect("read frame") {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn encode_appends_single_delimiter() {
        let frame = encode(&Command::new("x").with_param("text", "a\nb")).expect("encode");
        assert_eq!(frame.iter().filter(|b| **b == FRAME_DELIMITER).count(), 1);
        assert_eq!(frame.last(), Some(&FRAME_DELIMITER));
    }

    #[test]
    fn non_finite_floats_encode_as_null() {
        let frame = encode(&Response::Success {
            data: None,
            message: None,
            timestamp: Some(f64::NAN),
        })
        .expect("encode");
        let decoded: Value = serde_json::from_slice(&frame).expect("decode");
        assert_eq!(decoded["timestamp"], Value::Null);
    }

    #[rstest]
    #[case::one_byte(1)]
    #[case::seven_bytes(7)]
    #[case::whole(4096)]
    fn splits_frames_across_partial_reads(#[case] step: usize) {
        let data = b"{\"type\":\"a\"}\n\n{\"type\":\"b\"}\r\n{\"type\":\"c\"}".to_vec();
        let mut reader = FrameReader::new(Trickle {
            data,
            offset: 0,
            step,
        });
        let kinds: Vec<String> = frames_of(&mut reader)
            .iter()
            .map(|frame| Command::parse(frame).expect("parse").kind)
            .collect();
        assert_eq!(kinds, ["a", "b", "c"]);
    }

    #[test]
    fn empty_stream_has_no_frames() {
        let mut reader = FrameReader::new(Cursor::new(b"  \n".to_vec()));
        assert!(reader.next_frame().expect("read").is_none());
    }

    #[test]
    fn undelimited_malformed_remainder_is_still_a_frame() {
        let mut reader = FrameReader::new(Cursor::new(b"{\"type\":".to_vec()));
        let frame = reader.next_frame().expect("read").expect("frame");
        assert!(matches!(
            Command::parse(&frame),
            Err(FramingError::Malformed { .. })
        ));
    }

    #[test]
    fn rejects_oversized_frames() {
        let mut reader = FrameReader::with_limit(Cursor::new(vec![b'x'; 64]), 16);
        assert!(matches!(
            reader.next_frame(),
            Err(FrameReadError::Framing(FramingError::TooLarge { .. }))
        ));
    }

    #[test]
    fn frames_just_under_the_limit_are_delivered() {
        let mut data = vec![b' '; MAX_FRAME_BYTES - 16];
        data[..11].copy_from_slice(b"{\"type\":\"x\"");
        data.extend_from_slice(b"}\n{\"type\":\"y\"}\n");
        let mut reader = FrameReader::new(Cursor::new(data));

        let first = reader.next_frame().expect("read").expect("frame");
        assert_eq!(first.len(), MAX_FRAME_BYTES - 15);
        assert_eq!(Command::parse(&first).expect("parse").kind, "x");
        let second = reader.next_frame().expect("read").expect("frame");
        assert_eq!(Command::parse(&second).expect("parse").kind, "y");
    }

    #[test]
    fn partial_frames_are_not_rescanned() {
        let mut reader = FrameReader::new(Stalling {
            data: vec![b'a'; READ_CHUNK * 3],
            offset: 0,
        });
        assert!(matches!(
            reader.next_frame(),
            Err(FrameReadError::Transport(TransportError::Timeout { .. }))
        ));
        assert_eq!(reader.buffer.len(), READ_CHUNK * 3);
        assert_eq!(reader.scanned, reader.buffer.len());

        reader.reader.data.extend_from_slice(b"\nrest");
        let frame = reader.next_frame().expect("read").expect("frame");
        assert_eq!(frame.len(), READ_CHUNK * 3);
        assert_eq!(reader.scanned, 0);
        assert_eq!(reader.buffer, b"rest");
    }

    #[test]
    fn read_timeouts_surface_as_transport_errors() {
        let mut reader = FrameReader::new(TimingOut);
        assert!(matches!(
            reader.next_frame(),
            Err(FrameReadError::Transport(TransportError::Timeout { .. }))
        ));
    }

    #[rstest]
    #[case::flat(r#"{"type":"run","params":{"b":1,"a":"two"}}"#)]
    #[case::nested(r#"{"params":{"z":{"y":[1,2,{"x":null}]},"a":true},"type":"run"}"#)]
    #[case::unicode(r#"{"type":"run","params":{"text":"héllo\nwörld ✓"}}"#)]
    fn decode_then_encode_preserves_params(#[case] input: &str) {
        let command = Command::parse(input.as_bytes()).expect("decode");
        let frame = encode(&command).expect("encode");
        let original: Value = serde_json::from_str(input).expect("original");
        let round_tripped: Value = serde_json::from_slice(&frame).expect("round trip");
        assert_eq!(round_tripped["params"], original["params"]);
        assert_eq!(round_tripped["type"], original["type"]);
    }

    #[test]
    fn decodes_response_frames() {
        let response = decode_response(b"{\"status\":\"success\",\"data\":[1]}\n").expect("decode");
        assert_eq!(response.data(), Some(&json!([1])));
    }

    #[test]
    fn lossy_text_replaces_invalid_bytes() {
        assert_eq!(lossy_text(&[b'o', b'k', 0xc3]), "ok\u{fffd}");
    }
}
