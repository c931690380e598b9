//! Per-connection WebSocket message rate limiting.
//!
//! A sliding window keyed by connection id, generalized from the login
//! rate limiter shape: bounded key count, periodic TTL sweep so a burst
//! of short-lived connections doesn't grow the table unboundedly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

const WINDOW: Duration = Duration::from_secs(60);
const MAX_TRACKED_CONNECTIONS: usize = 10_000;
const SWEEP_INTERVAL_CALLS: u64 = 200;

/// Tracks message counts per connection over a rolling one-minute window.
pub struct ConnectionRateLimiter {
    attempts: Mutex<HashMap<Uuid, Vec<Instant>>>,
    max_per_minute: u32,
    call_count: AtomicU64,
}

impl ConnectionRateLimiter {
    /// Build a limiter allowing `max_per_minute` messages per connection.
    #[must_use]
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_per_minute,
            call_count: AtomicU64::new(0),
        }
    }

    /// Record one message from `connection_id`. Returns `true` if it is
    /// allowed, `false` if the connection is over its budget for this
    /// window.
    pub fn check(&self, connection_id: Uuid) -> bool {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        let count = self.call_count.fetch_add(1, Ordering::Relaxed);
        if count.is_multiple_of(SWEEP_INTERVAL_CALLS) || attempts.len() > MAX_TRACKED_CONNECTIONS / 2 {
            attempts.retain(|_, timestamps| {
                timestamps.retain(|t| now.duration_since(*t) < WINDOW);
                !timestamps.is_empty()
            });
        }

        if attempts.len() >= MAX_TRACKED_CONNECTIONS && !attempts.contains_key(&connection_id) {
            return false;
        }

        let entry = attempts.entry(connection_id).or_default();
        entry.retain(|t| now.duration_since(*t) < WINDOW);

        if entry.len() >= self.max_per_minute as usize {
            return false;
        }
        entry.push(now);
        true
    }

    /// Drop a connection's tracked state once it closes.
    pub fn forget(&self, connection_id: Uuid) {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        attempts.remove(&connection_id);
    }
}
