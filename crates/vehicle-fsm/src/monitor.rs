//! Link Liveness

use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Tracks when a link was last heard from
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    name: &'static str,
    timeout: Duration,
    last_seen: Instant,
    timed_out: bool,
}

impl LinkMonitor {
    /// Create a monitor whose silence starts counting at `now`
    pub fn new(name: &'static str, timeout: Duration, now: Instant) -> Self {
        Self {
            name,
            timeout,
            last_seen: now,
            timed_out: false,
        }
    }

    /// Record traffic at `now`
    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
        if self.timed_out {
            info!("{} link restored", self.name);
            self.timed_out = false;
        }
    }

    /// Silence has exceeded the timeout
    pub fn is_stale(&self, now: Instant) -> bool {
        self.elapsed(now) > self.timeout
    }

    /// Check at `now`; true only on the first check that finds the link stale
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.is_stale(now) || self.timed_out {
            return false;
        }
        warn!(
            "{} link silent for {:?} (timeout {:?})",
            self.name,
            self.elapsed(now),
            self.timeout
        );
        self.timed_out = true;
        true
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
