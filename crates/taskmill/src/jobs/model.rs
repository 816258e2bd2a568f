use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row of the jobs table.
///
/// A job is *active* while `completed` is NULL. Within the active set it is
/// either unclaimed (`fetched` NULL), held by a worker (`fetched` recent), or
/// stale and waiting to be reclaimed (`fetched` older than the claiming
/// capability's timeout). "Exhausted" is not a stored flag: a row with
/// `failed >= retries + 1` for every advertised capability simply stops
/// matching the candidate predicate.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Job {
    pub id: i64,
    pub job_type: String,
    pub data: Vec<u8>,
    pub task_group: Option<String>,
    pub reference: Option<String>,

    pub not_before: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub fetched: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,

    pub progress: f64,
    pub failed: i64,
    pub failure_message: Option<String>,
    pub worker_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub data: Vec<u8>,
    pub not_before: Option<DateTime<Utc>>,
    pub task_group: Option<String>,
    pub reference: Option<String>,
}

/// What a worker advertises, per job type, when polling for work.
///
/// `timeout_secs` bounds how long a claim is honored before the job becomes
/// reclaimable; `retries` is the extra-attempt budget (0 means exactly one
/// attempt); `rate_secs`, when set, throttles dispatch of this type to at
/// most one claim per interval *within the polling process*.
#[derive(Debug, Clone)]
pub struct Capability {
    pub job_type: String,
    pub timeout_secs: i64,
    pub retries: i64,
    pub rate_secs: Option<i64>,
}

impl Capability {
    pub fn new(job_type: impl Into<String>, timeout_secs: i64, retries: i64) -> Self {
        Self {
            job_type: job_type.into(),
            timeout_secs,
            retries,
            rate_secs: None,
        }
    }

    pub fn with_rate(mut self, rate_secs: i64) -> Self {
        self.rate_secs = Some(rate_secs);
        self
    }
}

/// Narrow projection for reference lookups (status reporting only).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobProgress {
    pub id: i64,
    pub reference: Option<String>,
    pub progress: f64,
    pub failure_message: Option<String>,
    pub completed: Option<DateTime<Utc>>,
}

impl JobProgress {
    pub fn status(&self) -> &'static str {
        if self.completed.is_some() {
            "completed"
        } else if self.failure_message.is_some() {
            "failed"
        } else {
            "active"
        }
    }
}

/// Progress values are stored clamped to [0, 1] and rounded to 2 decimals.
pub fn normalize_progress(progress: f64) -> f64 {
    (progress.clamp(0.0, 1.0) * 100.0).round() / 100.0
}
