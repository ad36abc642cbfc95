//! Aggregate connection and command statistics.

use std::collections::HashMap;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

#[derive(Debug, Default)]
struct Details {
    last_client: Option<SocketAddr>,
    last_activity: Option<Instant>,
    last_error: Option<String>,
    started_at: Option<Instant>,
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StatsSnapshot {
    pub(crate) total_connections: u64,
    pub(crate) active_connections: usize,
    pub(crate) rejected_connections: u64,
    pub(crate) commands_processed: u64,
    pub(crate) commands_timed_out: u64,
    pub(crate) last_client: Option<SocketAddr>,
    pub(crate) last_activity: Option<Instant>,
    pub(crate) last_error: Option<String>,
    pub(crate) started_at: Option<Instant>,
}

/// Counters shared by the lifecycle controller and connection threads.
///
/// Numeric counters are atomics; the remaining fields sit behind one mutex.
/// The live-connection registry lets `stop` close sockets still being served.
#[derive(Debug, Default)]
pub(crate) struct ServerStats {
    total_connections: AtomicU64,
    active_connections: AtomicUsize,
    rejected_connections: AtomicU64,
    commands_processed: AtomicU64,
    commands_timed_out: AtomicU64,
    next_connection: AtomicU64,
    details: Mutex<Details>,
    live: Mutex<HashMap<u64, TcpStream>>,
}

impl ServerStats {
    fn details(&self) -> MutexGuard<'_, Details> {
        self.details.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> MutexGuard<'_, HashMap<u64, TcpStream>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears counters and details for a new run.
    ///
    /// The active count tracks live handler threads and is left alone.
    pub(crate) fn reset(&self) {
        self.total_connections.store(0, Ordering::SeqCst);
        self.rejected_connections.store(0, Ordering::SeqCst);
        self.commands_processed.store(0, Ordering::SeqCst);
        self.commands_timed_out.store(0, Ordering::SeqCst);
        *self.details() = Details::default();
    }

    pub(crate) fn mark_started(&self, at: Instant) {
        self.details().started_at = Some(at);
    }

    pub(crate) fn mark_stopped(&self) {
        self.details().started_at = None;
    }

    pub(crate) fn record_error(&self, message: impl Into<String>) {
        self.details().last_error = Some(message.into());
    }

    /// Admits a connection unless `max_active` handlers are already live.
    ///
    /// Returns the active count on rejection.
    pub(crate) fn open_connection(
        self: &Arc<Self>,
        stream: &TcpStream,
        peer: SocketAddr,
        max_active: usize,
    ) -> Result<ConnectionGuard, usize> {
        let admitted = self.active_connections.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |active| (active < max_active).then_some(active + 1),
        );
        if let Err(active) = admitted {
            self.rejected_connections.fetch_add(1, Ordering::SeqCst);
            return Err(active);
        }

        self.total_connections.fetch_add(1, Ordering::SeqCst);
        self.touch(peer);
        let id = self.next_connection.fetch_add(1, Ordering::SeqCst);
        if let Ok(clone) = stream.try_clone() {
            self.live().insert(id, clone);
        }
        Ok(ConnectionGuard {
            stats: Arc::clone(self),
            id,
        })
    }

    /// Records client activity.
    pub(crate) fn touch(&self, peer: SocketAddr) {
        let mut details = self.details();
        details.last_client = Some(peer);
        details.last_activity = Some(Instant::now());
    }

    pub(crate) fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn command_timed_out(&self) {
        self.commands_timed_out.fetch_add(1, Ordering::SeqCst);
    }

    /// Shuts down the read half of every live connection, returning how
    /// many were closed.
    ///
    /// Handlers blocked on a read see end of stream and exit; replies still
    /// being written are delivered.
    pub(crate) fn close_all(&self) -> usize {
        let streams: Vec<TcpStream> = self.live().drain().map(|(_, stream)| stream).collect();
        for stream in &streams {
            // Already-closed peers report NotConnected; nothing left to do.
            let _ = stream.shutdown(Shutdown::Read);
        }
        streams.len()
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        let details = self.details();
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::SeqCst),
            active_connections: self.active_connections.load(Ordering::SeqCst),
            rejected_connections: self.rejected_connections.load(Ordering::SeqCst),
            commands_processed: self.commands_processed.load(Ordering::SeqCst),
            commands_timed_out: self.commands_timed_out.load(Ordering::SeqCst),
            last_client: details.last_client,
            last_activity: details.last_activity,
            last_error: details.last_error.clone(),
            started_at: details.started_at,
        }
    }
}

/// Keeps a connection counted as active until dropped.
#[derive(Debug)]
pub(crate) struct ConnectionGuard {
    stats: Arc<ServerStats>,
    id: u64,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.stats.live().remove(&self.id);
        let _ = self.stats.active_connections.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |active| active.checked_sub(1),
        );
    }
}
