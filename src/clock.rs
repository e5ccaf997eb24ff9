//! Source of wall-clock timestamps for sessions, jobs and stats.
//!
//! [`Clock::new`] reads the system clock, so session idle time and job age
//! follow host suspend and NTP steps. `Utc::now()` ignores
//! `tokio::time::pause`, so tests use [`Clock::follow_tokio`] instead: it
//! captures a UTC origin once and adds the elapsed `tokio::time::Instant`,
//! which means timestamps advance together with `sleep`/`interval`.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    /// `None` reads the system clock.
    anchor: Option<(DateTime<Utc>, Instant)>,
}

impl Clock {
    pub fn new() -> Self {
        Self { anchor: None }
    }

    /// A clock driven by tokio's (pausable) time.
    #[cfg(test)]
    pub fn follow_tokio() -> Self {
        Self {
            anchor: Some((Utc::now(), Instant::now())),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let Some((origin_utc, origin)) = self.anchor else {
            return Utc::now();
        };
        let elapsed = Instant::now().saturating_duration_since(origin);
        match chrono::Duration::from_std(elapsed) {
            Ok(delta) => origin_utc + delta,
            Err(_) => origin_utc,
        }
    }
}
