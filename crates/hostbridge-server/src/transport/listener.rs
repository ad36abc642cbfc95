//! Listener implementation for the bridge socket.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use hostbridge_config::Endpoint;

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const JOIN_POLL: Duration = Duration::from_millis(10);

/// Listener bound to a TCP endpoint but not yet accepting.
#[derive(Debug)]
pub(crate) struct BridgeListener {
    endpoint: Endpoint,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BridgeListener {
    pub(crate) fn bind(endpoint: &Endpoint) -> Result<Self, ListenerError> {
        let addr = endpoint.resolve().map_err(|source| ListenerError::Resolve {
            endpoint: endpoint.clone(),
            source,
        })?;
        let listener =
            TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Prepare {
                step: "local address",
                source,
            })?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
            local_addr,
        })
    }

    /// Address actually bound, with any ephemeral port resolved.
    pub(crate) const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::Prepare {
                step: "non-blocking mode",
                source,
            })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name(String::from("hostbridge-acceptor"))
            .spawn(move || run_accept_loop(&self, &shutdown_flag, &handler))
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// How a bounded join ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinOutcome {
    Joined,
    TimedOut,
    Panicked,
}

/// Handle to the background acceptor thread.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Returns true while the acceptor thread is running.
    pub(crate) fn is_alive(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    #[cfg(test)]
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }

    /// Waits up to `timeout` for the acceptor to exit.
    ///
    /// On timeout the thread is detached.
    pub(crate) fn join_timeout(mut self, timeout: Duration) -> JoinOutcome {
        let Some(handle) = self.handle.take() else {
            return JoinOutcome::Joined;
        };
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                return JoinOutcome::TimedOut;
            }
            thread::sleep(JOIN_POLL);
        }
        match handle.join() {
            Ok(()) => JoinOutcome::Joined,
            Err(_) => JoinOutcome::Panicked,
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &BridgeListener,
    shutdown: &AtomicBool,
    handler: &Arc<dyn ConnectionHandler>,
) {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        addr = %listener.local_addr,
        "socket listener active"
    );
    let sequence = AtomicU64::new(0);
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(&listener.listener) {
            Ok(Some((stream, peer))) => {
                last_error = None;
                let id = sequence.fetch_add(1, Ordering::Relaxed);
                spawn_handler(Arc::clone(handler), stream, peer, id);
            }
            Ok(None) => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(target: LISTENER_TARGET, addr = %listener.local_addr, "socket listener stopped");
}

fn spawn_handler(handler: Arc<dyn ConnectionHandler>, stream: TcpStream, peer: SocketAddr, id: u64) {
    let spawned = thread::Builder::new()
        .name(format!("hostbridge-conn-{id}"))
        .spawn(move || handler.handle(stream, peer));
    match spawned {
        Ok(_) => debug!(target: LISTENER_TARGET, peer = %peer, "connection accepted"),
        Err(error) => warn!(
            target: LISTENER_TARGET,
            peer = %peer,
            error = %error,
            "failed to spawn connection thread"
        ),
    }
}

fn accept_connection(listener: &TcpListener) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    match listener.accept() {
        Ok((stream, peer)) => {
            stream.set_nonblocking(false)?;
            Ok(Some((stream, peer)))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}
