// crates/taskmill/src/jobs/repo.rs

use crate::jobs::error::{QueueError, Result};
use crate::jobs::model::{normalize_progress, Capability, Job, JobProgress, NewJob};
use chrono::{DateTime, Duration, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

#[derive(Clone)]
pub struct JobsRepo {
    pool: SqlitePool,
}

impl JobsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ----------------------------
    // Enqueue
    // ----------------------------

    pub async fn create_job(&self, job: NewJob) -> Result<Job> {
        if job.job_type.trim().is_empty() {
            return Err(QueueError::InvalidJob("job_type must not be empty".into()));
        }

        let created = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (
                job_type, data, task_group, reference,
                not_before, created,
                progress, failed
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0)
            RETURNING *
            "#,
        )
        .bind(&job.job_type)
        .bind(&job.data)
        .bind(job.task_group.as_deref())
        .bind(job.reference.as_deref())
        .bind(job.not_before)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn enqueue_now(&self, job_type: &str, data: Vec<u8>) -> Result<Job> {
        self.create_job(NewJob {
            job_type: job_type.to_string(),
            data,
            not_before: None,
            task_group: None,
            reference: None,
        })
        .await
    }

    pub async fn enqueue_in(&self, job_type: &str, data: Vec<u8>, delay_secs: i64) -> Result<Job> {
        self.create_job(NewJob {
            job_type: job_type.to_string(),
            data,
            not_before: Some(Utc::now() + Duration::seconds(delay_secs)),
            task_group: None,
            reference: None,
        })
        .await
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    pub async fn require_job(&self, id: i64) -> Result<Job> {
        self.get_job(id).await?.ok_or(QueueError::NotFound(id))
    }

    /// Status projection for caller-supplied references. A reference is an
    /// opaque label, not a key, so this can match several rows.
    pub async fn progress_by_reference(&self, reference: &str) -> Result<Vec<JobProgress>> {
        let rows = sqlx::query_as::<_, JobProgress>(
            r#"
            SELECT id, reference, progress, failure_message, completed
            FROM jobs
            WHERE reference = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(reference)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ----------------------------
    // Allocation: candidate query + atomic claim
    // ----------------------------

    /// Find the single best claimable job for the given capability list.
    ///
    /// One predicate per capability, OR-ed together: matching type, schedule
    /// ripe (`not_before` absent or past), unclaimed or stale-claimed
    /// (`fetched` older than that capability's timeout), retry budget not
    /// exhausted (`failed < retries + 1`). Duplicate capability entries are
    /// redundant but harmless.
    ///
    /// Every row the predicate admits is already ripe, so the
    /// earliest-eligible-first policy collapses to FIFO by id.
    pub async fn find_candidate(
        &self,
        capabilities: &[&Capability],
        group: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>> {
        if capabilities.is_empty() {
            return Ok(None);
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM jobs WHERE completed IS NULL");

        if let Some(group) = group {
            qb.push(" AND task_group = ");
            qb.push_bind(group);
        }

        qb.push(" AND (");
        for (i, cap) in capabilities.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            let stale_before = now - Duration::seconds(cap.timeout_secs);

            qb.push("(job_type = ");
            qb.push_bind(&cap.job_type);
            qb.push(" AND (not_before IS NULL OR not_before < ");
            qb.push_bind(now);
            qb.push(") AND (fetched IS NULL OR fetched < ");
            qb.push_bind(stale_before);
            qb.push(") AND failed < ");
            qb.push_bind(cap.retries + 1);
            qb.push(")");
        }
        qb.push(") ORDER BY id ASC LIMIT 1");

        let job = qb
            .build_query_as::<Job>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    /// Claim `candidate` for `worker_key`, atomically.
    ///
    /// Compare-and-swap on `fetched`: the update only lands if the row is
    /// still active and `fetched` still holds the value the candidate query
    /// observed. A stale `fetched` (timeout reclaim) bumps `failed` and
    /// stamps the failure message in the same statement, so a losing racer
    /// can neither steal the claim nor double-count the failure.
    ///
    /// Returns the claimed row, or None if another worker won the race.
    pub async fn claim(
        &self,
        candidate: &Job,
        worker_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>> {
        let claimed = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET fetched = ?1,
                worker_key = ?2,
                failed = failed + (CASE WHEN fetched IS NOT NULL THEN 1 ELSE 0 END),
                failure_message = CASE
                    WHEN fetched IS NOT NULL THEN 'Restart after timeout'
                    ELSE failure_message
                END
            WHERE id = ?3
              AND completed IS NULL
              AND fetched IS ?4
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(worker_key)
        .bind(candidate.id)
        .bind(candidate.fetched)
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed)
    }

    // ----------------------------
    // Lifecycle transitions
    // ----------------------------

    /// Record caller-reported completion fraction. Rejects non-positive ids
    /// locally, before touching the store.
    pub async fn update_progress(&self, id: i64, progress: f64) -> Result<bool> {
        if id <= 0 {
            return Ok(false);
        }

        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET progress = ?1
            WHERE id = ?2 AND completed IS NULL
            "#,
        )
        .bind(normalize_progress(progress))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    /// Idempotent: calling again just refreshes the completion timestamp.
    pub async fn mark_done(&self, id: i64) -> Result<bool> {
        let res = sqlx::query("UPDATE jobs SET completed = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected() > 0)
    }

    /// Count one failed attempt. Without a message the previous
    /// failure_message is kept. Does not complete the job: it stays
    /// reclaimable until the retry budget runs out.
    pub async fn mark_failed(&self, id: i64, message: Option<&str>) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET failed = failed + 1,
                failure_message = COALESCE(?1, failure_message)
            WHERE id = ?2 AND completed IS NULL
            "#,
        )
        .bind(message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }
}
