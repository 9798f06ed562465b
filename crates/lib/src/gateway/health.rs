//! Short-lived cache for the backend health probe.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default freshness window for a probe result.
pub const DEFAULT_HEALTH_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
struct Entry {
    available: bool,
    checked_at: Instant,
}

/// Last probe result and when it was taken. Positive and negative results are cached alike.
#[derive(Debug)]
pub struct HealthCache {
    ttl: Duration,
    entry: Mutex<Option<Entry>>,
}

impl Default for HealthCache {
    fn default() -> Self {
        Self::new(DEFAULT_HEALTH_TTL)
    }
}

impl HealthCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached result if it was taken less than `ttl` before `now`.
    pub fn fresh(&self, now: Instant) -> Option<bool> {
        let g = self.entry.lock().unwrap_or_else(|e| e.into_inner());
        let entry = (*g)?;
        let age = now.checked_duration_since(entry.checked_at)?;
        (age < self.ttl).then_some(entry.available)
    }

    pub fn record(&self, available: bool, now: Instant) {
        let mut g = self.entry.lock().unwrap_or_else(|e| e.into_inner());
        *g = Some(Entry {
            available,
            checked_at: now,
        });
    }

    pub fn invalidate(&self) {
        let mut g = self.entry.lock().unwrap_or_else(|e| e.into_inner());
        *g = None;
    }
}
