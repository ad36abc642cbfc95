//! Connection statistics kept by the client.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Samples reported in [`Performance::recent_response_times_ms`].
const RECENT_SAMPLES: usize = 10;

/// Last observed state of the link to the bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Nothing has been sent yet.
    #[default]
    Unknown,
    /// The last exchange completed.
    Connected,
    /// The last exchange failed at the transport.
    Disconnected,
    /// The bridge answered a health check with an error.
    Error,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        };
        formatter.write_str(label)
    }
}

/// Formats `at` as RFC 3339, falling back to Unix seconds.
pub(crate) fn timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

#[expect(
    clippy::float_arithmetic,
    reason = "timings are reported in fractional milliseconds"
)]
fn millis(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 100_000.0).round() / 100.0
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "counters stay far below 2^52 and the rate is a display value"
)]
fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Counters and link state visible through [`crate::BridgeClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Link state after the latest exchange.
    pub status: LinkStatus,
    /// RFC 3339 time of the latest successful heartbeat.
    pub last_heartbeat: Option<String>,
    /// RFC 3339 time of the latest successful command of any kind.
    pub last_successful_command: Option<String>,
    /// Description of the latest failure.
    pub last_error: Option<String>,
    /// Exchanges attempted.
    pub connection_attempts: u64,
    /// Exchanges that produced a response.
    pub successful_connections: u64,
    /// Exchanges that failed.
    pub failed_connections: u64,
    /// Response times currently held in the window.
    pub recorded_responses: usize,
}

/// Attempt counters with the derived success rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStats {
    /// Exchanges attempted.
    pub total_attempts: u64,
    /// Exchanges that produced a response.
    pub successful: u64,
    /// Exchanges that failed.
    pub failed: u64,
    /// Successful exchanges per attempt, as a percentage.
    pub success_rate: f64,
}

/// Round-trip timings in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// Mean over the recorded window.
    pub avg_response_time_ms: f64,
    /// Latest timings, oldest first.
    pub recent_response_times_ms: Vec<f64>,
    /// Timings held in the window.
    pub total_recorded_responses: usize,
}

/// Statistics report returned by [`crate::BridgeClient::statistics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Link state after the latest exchange.
    pub current_status: LinkStatus,
    /// RFC 3339 time of the latest successful heartbeat.
    pub last_heartbeat: Option<String>,
    /// RFC 3339 time of the latest successful command.
    pub last_successful_command: Option<String>,
    /// Attempt counters.
    pub connection_stats: ConnectionStats,
    /// Timing summary.
    pub performance: Performance,
    /// RFC 3339 time the report was built.
    pub generated_at: String,
}

/// Mutable monitor state guarded by the client.
#[derive(Debug)]
pub(crate) struct ConnectionMonitor {
    status: LinkStatus,
    connection_attempts: u64,
    successful_connections: u64,
    failed_connections: u64,
    last_heartbeat: Option<OffsetDateTime>,
    last_successful_command: Option<OffsetDateTime>,
    last_error: Option<String>,
    response_times: VecDeque<Duration>,
    history: usize,
}

impl ConnectionMonitor {
    pub(crate) fn new(history: usize) -> Self {
        Self {
            status: LinkStatus::Unknown,
            connection_attempts: 0,
            successful_connections: 0,
            failed_connections: 0,
            last_heartbeat: None,
            last_successful_command: None,
            last_error: None,
            response_times: VecDeque::with_capacity(history),
            history,
        }
    }

    pub(crate) fn record_attempt(&mut self) {
        self.connection_attempts += 1;
    }

    pub(crate) fn record_success(&mut self, elapsed: Duration, at: OffsetDateTime) {
        self.successful_connections += 1;
        self.last_successful_command = Some(at);
        self.status = LinkStatus::Connected;
        if self.history == 0 {
            return;
        }
        if self.response_times.len() == self.history {
            self.response_times.pop_front();
        }
        self.response_times.push_back(elapsed);
    }

    pub(crate) fn record_failure(&mut self, error: String) {
        self.failed_connections += 1;
        self.status = LinkStatus::Disconnected;
        self.last_error = Some(error);
    }

    pub(crate) fn record_heartbeat(&mut self, at: OffsetDateTime) {
        self.last_heartbeat = Some(at);
        self.status = LinkStatus::Connected;
    }

    pub(crate) fn record_check_error(&mut self, error: String) {
        self.status = LinkStatus::Error;
        self.last_error = Some(error);
    }

    /// Zeroes counters and timing history; link state and timestamps stay.
    pub(crate) fn reset(&mut self) {
        self.connection_attempts = 0;
        self.successful_connections = 0;
        self.failed_connections = 0;
        self.response_times.clear();
    }

    pub(crate) fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            status: self.status,
            last_heartbeat: self.last_heartbeat.map(timestamp),
            last_successful_command: self.last_successful_command.map(timestamp),
            last_error: self.last_error.clone(),
            connection_attempts: self.connection_attempts,
            successful_connections: self.successful_connections,
            failed_connections: self.failed_connections,
            recorded_responses: self.response_times.len(),
        }
    }

    pub(crate) fn statistics(&self, now: OffsetDateTime) -> Statistics {
        let success_rate = percentage(self.successful_connections, self.connection_attempts);
        let avg_response_time_ms = if self.response_times.is_empty() {
            0.0
        } else {
            let total: Duration = self.response_times.iter().sum();
            let samples = u32::try_from(self.response_times.len()).unwrap_or(u32::MAX);
            millis(total / samples)
        };
        let skip = self.response_times.len().saturating_sub(RECENT_SAMPLES);
        Statistics {
            current_status: self.status,
            last_heartbeat: self.last_heartbeat.map(timestamp),
            last_successful_command: self.last_successful_command.map(timestamp),
            connection_stats: ConnectionStats {
                total_attempts: self.connection_attempts,
                successful: self.successful_connections,
                failed: self.failed_connections,
                success_rate,
            },
            performance: Performance {
                avg_response_time_ms,
                recent_response_times_ms: self
                    .response_times
                    .iter()
                    .skip(skip)
                    .copied()
                    .map(millis)
                    .collect(),
                total_recorded_responses: self.response_times.len(),
            },
            generated_at: timestamp(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    #[test]
    fn history_is_bounded() {
        let mut monitor = ConnectionMonitor::new(3);
        for millis in 1..=5 {
            monitor.record_success(Duration::from_millis(millis), now());
        }
        let stats = monitor.statistics(now());
        assert_eq!(stats.performance.total_recorded_responses, 3);
        assert_eq!(
            stats.performance.recent_response_times_ms,
            vec![3.0, 4.0, 5.0]
        );
        assert!((stats.performance.avg_response_time_ms - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn recent_samples_are_the_last_ten() {
        let mut monitor = ConnectionMonitor::new(50);
        for millis in 1..=15 {
            monitor.record_success(Duration::from_millis(millis), now());
        }
        let recent = monitor.statistics(now()).performance.recent_response_times_ms;
        assert_eq!(recent.len(), 10);
        assert_eq!(recent.first(), Some(&6.0));
    }

    #[rstest]
    #[case::no_attempts(0, 0, 0.0)]
    #[case::all_good(4, 4, 100.0)]
    #[case::retried(4, 1, 25.0)]
    fn success_rate_is_a_percentage(
        #[case] attempts: u64,
        #[case] successes: u64,
        #[case] expected: f64,
    ) {
        let mut monitor = ConnectionMonitor::new(50);
        for _ in 0..attempts {
            monitor.record_attempt();
        }
        for _ in 0..successes {
            monitor.record_success(Duration::from_millis(1), now());
        }
        let rate = monitor.statistics(now()).connection_stats.success_rate;
        assert!((rate - expected).abs() < f64::EPSILON, "rate {rate}");
    }

    #[test]
    fn reset_keeps_link_state() {
        let mut monitor = ConnectionMonitor::new(50);
        monitor.record_attempt();
        monitor.record_failure("refused".to_owned());
        monitor.reset();

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.connection_attempts, 0);
        assert_eq!(snapshot.failed_connections, 0);
        assert_eq!(snapshot.status, LinkStatus::Disconnected);
        assert_eq!(snapshot.last_error.as_deref(), Some("refused"));
    }

    #[test]
    fn timestamps_are_rfc3339() {
        assert_eq!(timestamp(now()), "1970-01-01T00:00:00Z");
    }
}
