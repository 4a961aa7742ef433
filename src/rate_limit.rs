//! Per-client admission control over a dynamic sliding window.
//!
//! Every client owns a virtual slot cursor: each admitted request pushes the
//! cursor forward by `interval / max_requests`. A request is admitted only if
//! the cursor still ends within one `interval` of the present. An idle client
//! has its cursor pulled back to "now", so unused capacity is never banked
//! beyond a single interval. Overrunning the window bans the client for
//! `ban_timeout`.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::ConfigError;

/// Construction-time throttle settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleSettings {
    /// Requests admitted in any rolling `interval`. Must be non-zero.
    pub max_requests_per_interval: u32,
    pub interval: Duration,
    /// How long a client stays blocked after overrunning its window.
    pub ban_timeout: Duration,
}

/// Result of asking for access. Being blocked is a normal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Admitted,
    Blocked { until: DateTime<Utc> },
}

impl AccessDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, AccessDecision::Blocked { .. })
    }

    pub fn blocked_until(&self) -> Option<DateTime<Utc>> {
        match self {
            AccessDecision::Admitted => None,
            AccessDecision::Blocked { until } => Some(*until),
        }
    }
}

// Per-client throttling state, only touched under its own mutex
#[derive(Debug)]
struct ClientTracker {
    // end of the capacity already reserved by this client
    slot_end: DateTime<Utc>,
    block_until: Option<DateTime<Utc>>,
}

impl Default for ClientTracker {
    fn default() -> Self {
        Self {
            slot_end: DateTime::<Utc>::MIN_UTC,
            block_until: None,
        }
    }
}

impl ClientTracker {
    fn request(&mut self, now: DateTime<Utc>, window: &Window) -> AccessDecision {
        if let Some(until) = self.block_until.filter(|until| now < *until) {
            return AccessDecision::Blocked { until };
        }

        if self.slot_end < now {
            self.slot_end = now;
        }
        self.slot_end = saturating_add(self.slot_end, window.slot_length);

        if self.slot_end > saturating_add(now, window.interval) {
            let until = saturating_add(now, window.ban_timeout);
            self.block_until = Some(until);
            return AccessDecision::Blocked { until };
        }

        AccessDecision::Admitted
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    slot_length: TimeDelta,
    interval: TimeDelta,
    ban_timeout: TimeDelta,
}

impl Window {
    fn from_settings(settings: &ThrottleSettings) -> Result<Self, ConfigError> {
        if settings.max_requests_per_interval == 0 {
            return Err(ConfigError::ZeroMaxRequests);
        }
        let max = i64::from(settings.max_requests_per_interval);

        let interval = TimeDelta::from_std(settings.interval)
            .map_err(|_| ConfigError::DurationOutOfRange("throttle interval"))?;
        // bans longer than TimeDelta can express just mean "forever"
        let ban_timeout = TimeDelta::from_std(settings.ban_timeout).unwrap_or(TimeDelta::MAX);

        let slot_length = match interval.num_nanoseconds() {
            Some(nanos) => TimeDelta::nanoseconds(nanos / max),
            None => TimeDelta::milliseconds(interval.num_milliseconds() / max),
        };

        Ok(Self {
            slot_length,
            interval,
            ban_timeout,
        })
    }
}

fn saturating_add(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Decides, per client key, whether a request may proceed.
///
/// Trackers are created lazily and kept for the life of the limiter. Each one
/// has its own lock, so clients never contend with each other.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    window: Window,
    trackers: DashMap<String, Arc<Mutex<ClientTracker>>>,
}

impl RateLimiter {
    /// Fails with [`ConfigError::ZeroMaxRequests`] if
    /// `max_requests_per_interval` is zero, and with
    /// [`ConfigError::DurationOutOfRange`] if `interval` exceeds what
    /// `chrono::TimeDelta` can hold (roughly 292 million years). A ban timeout
    /// that long is accepted and treated as permanent.
    pub fn new(settings: &ThrottleSettings, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let window = Window::from_settings(settings)?;
        debug!(
            max_requests = settings.max_requests_per_interval,
            slot_length_ms = window.slot_length.num_milliseconds(),
            "rate limiter configured"
        );

        Ok(Self {
            clock,
            window,
            trackers: DashMap::new(),
        })
    }

    /// Reserve a slot for `client`, or report until when it is blocked.
    pub fn request_access(&self, client: &str) -> AccessDecision {
        let tracker = self.tracker(client);
        let mut tracker = tracker.lock().unwrap_or_else(PoisonError::into_inner);

        let now = self.clock.now();
        let was_blocked = tracker.block_until.is_some_and(|until| now < until);
        let decision = tracker.request(now, &self.window);

        if let AccessDecision::Blocked { until } = decision {
            if !was_blocked {
                info!(client, %until, "client exceeded its request window, banned");
            }
        }
        decision
    }

    /// Number of clients seen so far.
    pub fn tracked_clients(&self) -> usize {
        self.trackers.len()
    }

    fn tracker(&self, client: &str) -> Arc<Mutex<ClientTracker>> {
        // shard guards are released before the tracker lock is taken
        if let Some(tracker) = self.trackers.get(client) {
            return Arc::clone(tracker.value());
        }
        let tracker = self
            .trackers
            .entry(client.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(ClientTracker::default())));
        Arc::clone(tracker.value())
    }
}
