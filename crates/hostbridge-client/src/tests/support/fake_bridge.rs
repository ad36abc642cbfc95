//! Loopback server answering each connection according to a [`ReplyMode`].

use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hostbridge_config::Endpoint;
use hostbridge_protocol::{Response, encode};

/// How the fake bridge treats each request.
#[derive(Debug, Clone)]
pub enum ReplyMode {
    /// Answer with this response.
    Reply(Response),
    /// Read the request, then close without answering.
    CloseAfterRead,
    /// Read the request and never answer.
    Silent,
}

/// Single-threaded loopback server; connections are served in turn.
pub struct FakeBridge {
    port: u16,
    accepted: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FakeBridge {
    pub fn start(mode: ReplyMode) -> Self {
        Self::start_on(&Endpoint::loopback(0), mode)
    }

    /// Listens on `endpoint`, which may name a fixed port.
    pub fn start_on(endpoint: &Endpoint, mode: ReplyMode) -> Self {
        let addr = endpoint.resolve().expect("resolve endpoint");
        let listener = TcpListener::bind(addr).expect("bind fake bridge");
        listener.set_nonblocking(true).expect("non-blocking listener");
        let port = listener.local_addr().expect("local addr").port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let thread = {
            let accepted = Arc::clone(&accepted);
            let requests = Arc::clone(&requests);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                while !shutdown.load(Ordering::SeqCst) {
                    match listener.accept() {
                        Ok((stream, _)) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                            serve(stream, &mode, &requests);
                        }
                        Err(error) if error.kind() == ErrorKind::WouldBlock => {
                            thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            })
        };

        Self {
            port,
            accepted,
            requests,
            shutdown,
            thread: Some(thread),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::loopback(self.port)
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Request lines received so far, without their delimiters.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Drop for FakeBridge {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve(stream: TcpStream, mode: &ReplyMode, requests: &Mutex<Vec<String>>) {
    stream.set_nonblocking(false).expect("blocking stream");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout");
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request = String::new();
    if reader.read_line(&mut request).is_err() {
        return;
    }
    requests
        .lock()
        .expect("requests lock")
        .push(request.trim_end().to_owned());
    match mode {
        ReplyMode::Reply(response) => {
            let mut writer = &stream;
            let _ = writer.write_all(&encode(response).expect("encode response"));
        }
        ReplyMode::CloseAfterRead => {}
        ReplyMode::Silent => {
            // Hold the connection until the client gives up.
            let mut rest = Vec::new();
            let _ = reader.read_to_end(&mut rest);
        }
    }
}

/// Endpoint on which nothing is listening.
pub fn refused_endpoint() -> Endpoint {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    Endpoint::loopback(port)
}
