//! Per-connection request loop.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use hostbridge_protocol::codec::write_response;
use hostbridge_protocol::{Command, FrameReadError, FrameReader, Response};

use super::LISTENER_TARGET;
use crate::dispatch::DispatchTable;
use crate::scheduler::MainThreadScheduler;
use crate::server::ServerStats;

/// Message returned when a queued command outlives the command timeout.
pub const TIMEOUT_MESSAGE: &str = "Command execution timeout";

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Serves one connection on its own thread. Implementations should avoid
    /// panicking.
    fn handle(&self, stream: TcpStream, peer: SocketAddr);
}

/// Limits applied to each connection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionLimits {
    pub(crate) read_timeout: Duration,
    pub(crate) command_timeout: Duration,
    pub(crate) max_connections: usize,
    pub(crate) max_frame: usize,
}

/// Reads commands from a connection, answers inline types directly and
/// queues the rest for the main thread.
pub(crate) struct BridgeConnectionHandler<H> {
    table: Arc<DispatchTable<H>>,
    scheduler: Arc<MainThreadScheduler<H>>,
    stats: Arc<ServerStats>,
    limits: ConnectionLimits,
}

impl<H: 'static> BridgeConnectionHandler<H> {
    pub(crate) const fn new(
        table: Arc<DispatchTable<H>>,
        scheduler: Arc<MainThreadScheduler<H>>,
        stats: Arc<ServerStats>,
        limits: ConnectionLimits,
    ) -> Self {
        Self {
            table,
            scheduler,
            stats,
            limits,
        }
    }

    fn serve(&self, stream: &TcpStream, peer: SocketAddr) {
        let _guard = match self
            .stats
            .open_connection(stream, peer, self.limits.max_connections)
        {
            Ok(guard) => guard,
            Err(active) => {
                warn!(
                    target: LISTENER_TARGET,
                    peer = %peer,
                    active,
                    "connection rejected at capacity"
                );
                let response = Response::error(format!(
                    "Server at capacity: {active} active connections"
                ));
                let _ = write_response(&mut &*stream, &response);
                return;
            }
        };

        if let Err(error) = stream.set_read_timeout(Some(self.limits.read_timeout)) {
            warn!(target: LISTENER_TARGET, peer = %peer, error = %error, "failed to set read timeout");
        }
        let _ = stream.set_nodelay(true);

        let mut reader = FrameReader::with_limit(stream, self.limits.max_frame);
        loop {
            let frame = match reader.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!(target: LISTENER_TARGET, peer = %peer, "client disconnected");
                    return;
                }
                Err(FrameReadError::Framing(error)) => {
                    warn!(target: LISTENER_TARGET, peer = %peer, error = %error, "unreadable frame");
                    let _ = write_response(&mut &*stream, &error.to_response());
                    return;
                }
                Err(FrameReadError::Transport(error)) if error.is_timeout() => {
                    debug!(target: LISTENER_TARGET, peer = %peer, "idle connection timed out");
                    return;
                }
                Err(FrameReadError::Transport(error)) => {
                    debug!(
                        target: LISTENER_TARGET,
                        peer = %peer,
                        kind = error.label(),
                        error = %error,
                        "connection closed by transport error"
                    );
                    return;
                }
            };

            self.stats.touch(peer);
            let response = match Command::parse(&frame) {
                Ok(command) => self.execute(command, peer),
                Err(error) => {
                    warn!(target: LISTENER_TARGET, peer = %peer, error = %error, "malformed command");
                    error.to_response()
                }
            };

            if let Err(error) = write_response(&mut &*stream, &response) {
                debug!(
                    target: LISTENER_TARGET,
                    peer = %peer,
                    error = %error,
                    "failed to deliver response"
                );
                return;
            }
        }
    }

    fn execute(&self, command: Command, peer: SocketAddr) -> Response {
        self.stats.command_processed();
        let kind = command.kind().to_owned();
        if command.health_check {
            debug!(target: LISTENER_TARGET, kind = %kind, peer = %peer, "health check received");
        } else {
            info!(target: LISTENER_TARGET, kind = %kind, peer = %peer, "command received");
        }

        if let Some(response) = self.table.dispatch_inline(&command) {
            return response;
        }

        let table = Arc::clone(&self.table);
        let handle = match self
            .scheduler
            .schedule(kind.clone(), Box::new(move |host: &mut H| table.dispatch(host, &command)))
        {
            Ok(handle) => handle,
            Err(error) => return Response::error(error.to_string()),
        };

        match handle.wait(self.limits.command_timeout) {
            Some(response) => response,
            None => {
                self.stats.command_timed_out();
                warn!(
                    target: LISTENER_TARGET,
                    peer = %peer,
                    kind = %kind,
                    timeout_ms = self.limits.command_timeout.as_millis(),
                    "command timed out waiting for the main thread"
                );
                Response::error(TIMEOUT_MESSAGE)
            }
        }
    }
}

impl<H: 'static> ConnectionHandler for BridgeConnectionHandler<H> {
    fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        self.serve(&stream, peer);
    }
}
