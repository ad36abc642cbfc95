//! Blocking client helpers for talking to a test server.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use hostbridge_protocol::{Command, Response, decode_response, encode};

/// Sends one command and reads one response.
pub fn exchange(addr: SocketAddr, command: &Command) -> Response {
    let frame = encode(command).expect("encode command");
    exchange_raw(addr, &[frame.as_slice()])
        .pop()
        .expect("one response")
}

/// Writes each frame in turn on one connection, reading a response after
/// each.
pub fn exchange_raw(addr: SocketAddr, frames: &[&[u8]]) -> Vec<Response> {
    let mut stream = TcpStream::connect(addr).expect("connect to server");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("set read timeout");
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    frames
        .iter()
        .map(|frame| {
            stream.write_all(frame).expect("write frame");
            let mut line = String::new();
            reader.read_line(&mut line).expect("read response");
            decode_response(line.as_bytes()).expect("decode response")
        })
        .collect()
}
