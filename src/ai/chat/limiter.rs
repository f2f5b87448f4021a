//! Per-client request throttling.
//!
//! Each identity (usually a client address) gets a window holding
//! the instants of its recently admitted requests. A request is
//! admitted when fewer than `max_requests` of those fall inside the
//! trailing `window`. With `max_requests = 1` this is a plain
//! cooldown between requests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RatePolicy {
    pub max_requests: usize,
    pub window: Duration,
}

impl RatePolicy {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            // A zero limit would lock everyone out forever
            max_requests: max_requests.max(1),
            window,
        }
    }

    pub fn cooldown(window: Duration) -> Self {
        Self::new(1, window)
    }
}

pub struct RateLimiter {
    policy: RatePolicy,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(policy: RatePolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: RatePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> RatePolicy {
        self.policy
    }

    /// Check whether `identity` may make a request right now and, if
    /// so, record it. The check and the update happen under the same
    /// lock so two racing requests from one identity can't both get
    /// through.
    pub fn admit(&self, identity: &str) -> bool {
        let now = self.clock.now();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let window = windows.entry(identity.to_string()).or_default();

        while let Some(oldest) = window.front() {
            if now.saturating_duration_since(*oldest) >= self.policy.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.policy.max_requests {
            tracing::debug!("Throttled request from {}", identity);
            return false;
        }

        window.push_back(now);
        true
    }

    /// Drop windows with no requests inside the trailing window.
    /// Returns the number of identities removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = windows.len();
        windows.retain(|_, window| {
            window
                .back()
                .is_some_and(|last| now.saturating_duration_since(*last) < self.policy.window)
        });
        before - windows.len()
    }

    /// Number of identities currently tracked
    pub fn tracked(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Periodically sweep stale windows so memory stays bounded by the
/// number of recently active clients.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    let period = limiter.policy().window.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                tracing::debug!("Swept {} stale rate limit windows", removed);
            }
        }
    })
}
