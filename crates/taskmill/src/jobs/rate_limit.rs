use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Best-effort per-type dispatch throttle.
///
/// Tracks the last successful claim per job type for one dispatcher
/// instance. Not persisted and not shared across processes: a restart
/// forgets the history, and two worker processes each get the full rate.
/// That limitation is accepted; the throttle is advisory.
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_dispatch: HashMap<String, DateTime<Utc>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            last_dispatch: HashMap::new(),
        }
    }

    /// True while the type's rate window is still open, i.e. dispatching now
    /// would exceed one claim per `rate_secs`.
    pub fn is_throttled(&self, job_type: &str, rate_secs: i64, now: DateTime<Utc>) -> bool {
        match self.last_dispatch.get(job_type) {
            Some(last) => now < *last + Duration::seconds(rate_secs),
            None => false,
        }
    }

    pub fn record(&mut self, job_type: &str, now: DateTime<Utc>) {
        self.last_dispatch.insert(job_type.to_string(), now);
    }
}
