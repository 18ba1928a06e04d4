//! Per-identity sliding-window admission control for the write path.

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Sliding-window rate limiter keyed by client identity.
///
/// Each identity maps to the timestamps of its recently admitted requests.
/// A request is admitted when fewer than `max_requests` timestamps remain
/// after dropping those at least `window` old. Rejected attempts are not
/// recorded.
pub struct SlidingWindowLimiter {
    windows: DashMap<String, VecDeque<DateTime<Utc>>>,
    max_requests: usize,
    window: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: std::time::Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window: Duration::from_std(window).unwrap_or(Duration::MAX),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Admit or reject a request from `identity` at `now`.
    ///
    /// Prune, capacity check and append all happen under the identity's map
    /// entry lock, so concurrent requests from one client cannot overshoot.
    pub fn admit(&self, identity: &str, now: DateTime<Utc>) -> bool {
        let mut entry = self.windows.entry(identity.to_owned()).or_default();
        let timestamps = entry.value_mut();

        prune(timestamps, now, self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Seconds a rejected client should wait before retrying.
    pub fn retry_after_secs(&self) -> u64 {
        self.window.num_seconds().max(0) as u64
    }

    /// Number of requests currently counted against `identity`.
    pub fn in_window(&self, identity: &str, now: DateTime<Utc>) -> usize {
        self.windows
            .get(identity)
            .map(|ts| ts.iter().filter(|&&t| now - t < self.window).count())
            .unwrap_or(0)
    }

    /// Drop identities whose windows have fully expired.
    pub fn cleanup(&self, now: DateTime<Utc>) {
        let window = self.window;
        self.windows.retain(|_identity, timestamps| {
            prune(timestamps, now, window);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    /// Periodically run [`cleanup`](Self::cleanup) so idle identities do not
    /// accumulate. Abort the returned handle on shutdown.
    pub fn start_cleanup_task(
        self: Arc<Self>,
        clock: Arc<dyn Clock>,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tick.tick().await; // skip first immediate tick
            loop {
                tick.tick().await;
                let before = self.tracked_identities();
                self.cleanup(clock.now());
                tracing::debug!(
                    before,
                    after = self.tracked_identities(),
                    "rate window cleanup"
                );
            }
        })
    }
}

/// Drop timestamps from the front until the oldest is strictly younger than
/// `window`. A timestamp exactly `window` old is evicted.
fn prune(timestamps: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) {
    while let Some(&front) = timestamps.front() {
        if now - front >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
