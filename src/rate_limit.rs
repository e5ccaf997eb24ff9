use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

/// Per-sender sliding-window admission control.
///
/// Each sender keeps the timestamps of admitted requests inside the trailing
/// window. Entries older than the window are purged lazily on the next check.
/// The per-key shard lock of `DashMap` keeps concurrent checks for different
/// senders independent.
pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    admins: HashSet<String>,
    windows: DashMap<String, VecDeque<DateTime<Utc>>>,
}

impl RateLimiter {
    pub fn new(max_per_hour: u32, admins: impl IntoIterator<Item = String>) -> Self {
        Self::with_window(max_per_hour, Duration::hours(1), admins)
    }

    pub fn with_window(
        max_per_window: u32,
        window: Duration,
        admins: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            max_per_window,
            window,
            admins: admins.into_iter().collect(),
            windows: DashMap::new(),
        }
    }

    /// Admit or deny one request from `sender` at `now`.
    ///
    /// A denied request is not recorded, so it does not extend the penalty.
    pub fn admit(&self, sender: &str, now: DateTime<Utc>) -> bool {
        if self.admins.contains(sender) {
            return true;
        }

        let mut entry = self.windows.entry(sender.to_string()).or_default();
        let window = entry.value_mut();
        Self::purge(window, now - self.window);

        if window.len() >= self.max_per_window as usize {
            debug!(sender, count = window.len(), "request denied by rate limiter");
            return false;
        }

        window.push_back(now);
        true
    }

    /// Requests `sender` may still make in the current window.
    pub fn remaining(&self, sender: &str, now: DateTime<Utc>) -> u32 {
        if self.admins.contains(sender) {
            return self.max_per_window;
        }
        let cutoff = now - self.window;
        let used = self
            .windows
            .get(sender)
            .map(|w| w.iter().filter(|t| **t > cutoff).count())
            .unwrap_or(0);
        self.max_per_window.saturating_sub(used as u32)
    }

    /// Drop senders whose windows are empty after purging. Returns how many.
    pub fn forget_idle(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            Self::purge(window, cutoff);
            !window.is_empty()
        });
        before - self.windows.len()
    }

    fn purge(window: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
        while window.front().is_some_and(|t| *t <= cutoff) {
            window.pop_front();
        }
    }
}
