use crate::jobs::error::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct MaintenanceRepo {
    pool: SqlitePool,
}

impl MaintenanceRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Administrative recovery: put every active job back to a clean pending
    /// state, wiping claims, progress and failure history. Completed jobs
    /// are untouched. Returns number of rows reset.
    pub async fn reset(&self) -> Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET fetched = NULL,
                progress = 0,
                failed = 0,
                worker_key = NULL,
                failure_message = NULL
            WHERE completed IS NULL
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    /// Delete completed jobs whose completion is older than the cutoff.
    /// Active rows are never touched, retry-exhausted ones included.
    pub async fn clean_old_jobs(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE completed IS NOT NULL
              AND completed < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    /// Collapse groups of identical unclaimed pending jobs (same type,
    /// payload and task group) down to one row.
    ///
    /// Policy: the oldest row (minimum id) survives and the newer duplicates
    /// are deleted, so the job that FIFO dispatch would run first is the one
    /// kept. Claimed or completed rows never participate.
    pub async fn remove_duplicate_pending(&self) -> Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE id IN (
                SELECT j.id
                FROM jobs j
                JOIN (
                    SELECT job_type, data, task_group, MIN(id) AS keep_id
                    FROM jobs
                    WHERE completed IS NULL AND fetched IS NULL
                    GROUP BY job_type, data, task_group
                    HAVING COUNT(*) > 1
                ) dup
                  ON j.job_type = dup.job_type
                 AND j.data = dup.data
                 AND j.task_group IS dup.task_group
                WHERE j.completed IS NULL
                  AND j.fetched IS NULL
                  AND j.id <> dup.keep_id
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }
}

/// Convenience: compute cutoff like "now - N days"
pub fn cutoff_days(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

/// Convenience: compute cutoff like "now - N seconds"
pub fn cutoff_seconds(secs: i64) -> DateTime<Utc> {
    Utc::now() - Duration::seconds(secs)
}
