use crate::jobs::error::Result;
use crate::jobs::identity::WorkerIdentity;
use crate::jobs::model::{Capability, Job};
use crate::jobs::rate_limit::RateLimiter;
use crate::jobs::repo::JobsRepo;
use chrono::Utc;

/// The allocation engine: one instance per polling worker.
///
/// Owns the worker identity and the per-type rate limiter outright, so two
/// dispatchers never share throttle state unless the caller wires them to
/// the same instance. The shared jobs table is the only cross-process
/// resource; correctness under concurrent polling rests entirely on the
/// store's conditional claim.
pub struct Dispatcher {
    jobs: JobsRepo,
    identity: WorkerIdentity,
    limiter: RateLimiter,
}

impl Dispatcher {
    pub fn new(jobs: JobsRepo) -> Self {
        Self {
            jobs,
            identity: WorkerIdentity::new(),
            limiter: RateLimiter::new(),
        }
    }

    pub fn worker_key(&mut self) -> &str {
        self.identity.key()
    }

    pub fn clear_worker_key(&mut self) {
        self.identity.clear_key();
    }

    /// Select and claim the single best eligible job, or None if nothing
    /// matches right now.
    ///
    /// Types whose rate window is still open are left out of the candidate
    /// query entirely. When the conditional claim loses a race against
    /// another worker the engine re-queries with a fresh `now` instead of
    /// handing out a row it does not own; each lost race means some other
    /// worker claimed that job, so the loop cannot spin without the system
    /// as a whole making progress.
    pub async fn request_job(
        &mut self,
        capabilities: &[Capability],
        group: Option<&str>,
    ) -> Result<Option<Job>> {
        loop {
            let now = Utc::now();

            let admissible: Vec<&Capability> = capabilities
                .iter()
                .filter(|cap| match cap.rate_secs {
                    Some(rate) => !self.limiter.is_throttled(&cap.job_type, rate, now),
                    None => true,
                })
                .collect();

            if admissible.is_empty() {
                return Ok(None);
            }

            let Some(candidate) = self.jobs.find_candidate(&admissible, group, now).await? else {
                return Ok(None);
            };

            let key = self.identity.key();
            if let Some(job) = self.jobs.claim(&candidate, key, now).await? {
                self.limiter.record(&job.job_type, now);
                return Ok(Some(job));
            }
        }
    }
}
