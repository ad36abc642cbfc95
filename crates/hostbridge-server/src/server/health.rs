//! Liveness evaluation and verdict caching.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::ServerState;
use super::stats::StatsSnapshot;

/// Why a health verdict came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBasis {
    /// The server is not in the running state.
    NotRunning,
    /// The acceptor thread has exited while the server claims to run.
    AcceptorExited,
    /// A client was active within the freshness window.
    RecentActivity,
    /// No recent activity, but commands have been served this run.
    CommandHistory,
    /// Running with no traffic yet.
    Fresh,
}

impl HealthBasis {
    /// Returns true for the healthy bases.
    pub const fn is_healthy(self) -> bool {
        matches!(
            self,
            Self::RecentActivity | Self::CommandHistory | Self::Fresh
        )
    }
}

/// A computed health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthVerdict {
    /// Reason for the verdict.
    pub basis: HealthBasis,
    /// When the verdict was computed.
    pub checked_at: Instant,
}

impl HealthVerdict {
    /// Returns true when the server is considered healthy.
    pub const fn healthy(&self) -> bool {
        self.basis.is_healthy()
    }
}

/// Evaluates server health from its state and statistics.
pub(crate) fn evaluate(
    state: ServerState,
    acceptor_alive: bool,
    stats: &StatsSnapshot,
    now: Instant,
    activity_window: Duration,
) -> HealthBasis {
    if state != ServerState::Running {
        return HealthBasis::NotRunning;
    }
    if !acceptor_alive {
        return HealthBasis::AcceptorExited;
    }
    let recent = stats
        .last_activity
        .is_some_and(|at| now.saturating_duration_since(at) <= activity_window);
    if recent {
        HealthBasis::RecentActivity
    } else if stats.commands_processed > 0 || stats.total_connections > 0 {
        HealthBasis::CommandHistory
    } else {
        HealthBasis::Fresh
    }
}

/// Holds the last verdict for a bounded time.
#[derive(Debug)]
pub(crate) struct HealthCache {
    ttl: Duration,
    last: Option<HealthVerdict>,
}

impl HealthCache {
    pub(crate) const fn new(ttl: Duration) -> Self {
        Self { ttl, last: None }
    }

    /// Returns the cached verdict while fresh, otherwise computes and stores
    /// a new one.
    pub(crate) fn get_or_refresh(
        &mut self,
        now: Instant,
        force_refresh: bool,
        compute: impl FnOnce() -> HealthBasis,
    ) -> HealthVerdict {
        if !force_refresh
            && let Some(verdict) = self.last
            && now.saturating_duration_since(verdict.checked_at) < self.ttl
        {
            return verdict;
        }
        let verdict = HealthVerdict {
            basis: compute(),
            checked_at: now,
        };
        self.last = Some(verdict);
        verdict
    }

    pub(crate) fn invalidate(&mut self) {
        self.last = None;
    }
}
