//! Per-IP brute-force lockout for password verification.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

const MAX_FAILURES: u32 = 5;
const WINDOW: Duration = Duration::from_secs(15 * 60);

struct Entry {
    failures: u32,
    window_start: Instant,
}

/// Tracks failed password attempts per source IP and rejects further
/// attempts, including ones with a correct password, once the window's
/// failure budget is exhausted.
#[derive(Default)]
pub struct LockoutTable {
    entries: DashMap<IpAddr, Entry>,
}

impl LockoutTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `ip` is currently locked out. Returns the seconds
    /// remaining if so.
    #[must_use]
    pub fn check(&self, ip: IpAddr) -> Option<u64> {
        let entry = self.entries.get(&ip)?;
        if entry.failures < MAX_FAILURES {
            return None;
        }
        let elapsed = entry.window_start.elapsed();
        if elapsed >= WINDOW {
            None
        } else {
            Some((WINDOW - elapsed).as_secs().max(1))
        }
    }

    /// Record a failed attempt from `ip`.
    pub fn record_failure(&self, ip: IpAddr) {
        let mut entry = self.entries.entry(ip).or_insert_with(|| Entry {
            failures: 0,
            window_start: Instant::now(),
        });
        if entry.window_start.elapsed() >= WINDOW {
            entry.failures = 0;
            entry.window_start = Instant::now();
        }
        entry.failures += 1;
    }

    /// Clear the failure counter for `ip` after a successful login.
    pub fn record_success(&self, ip: IpAddr) {
        self.entries.remove(&ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
    }

    #[test]
    fn under_threshold_is_not_locked_out() {
        let table = LockoutTable::new();
        for _ in 0..4 {
            table.record_failure(ip());
        }
        assert!(table.check(ip()).is_none());
    }

    #[test]
    fn fifth_failure_locks_out() {
        let table = LockoutTable::new();
        for _ in 0..5 {
            table.record_failure(ip());
        }
        assert!(table.check(ip()).is_some());
    }

    #[test]
    fn success_clears_counter() {
        let table = LockoutTable::new();
        for _ in 0..5 {
            table.record_failure(ip());
        }
        assert!(table.check(ip()).is_some());
        table.record_success(ip());
        assert!(table.check(ip()).is_none());
    }

    #[test]
    fn different_ips_are_independent() {
        let table = LockoutTable::new();
        let other = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        for _ in 0..5 {
            table.record_failure(ip());
        }
        assert!(table.check(ip()).is_some());
        assert!(table.check(other).is_none());
    }
}
