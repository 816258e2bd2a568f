use crate::jobs::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Per-type averages over finished jobs, in seconds.
///
/// turnaround = completed - created, runtime = completed - fetched,
/// fetch_delay = fetched - created. Rows completed without ever being
/// claimed only count toward turnaround.
#[derive(Debug, Serialize)]
pub struct TypeStats {
    pub job_type: String,
    pub finished: i64,
    pub avg_turnaround_secs: f64,
    pub avg_runtime_secs: f64,
    pub avg_fetch_delay_secs: f64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PendingStats {
    pub job_type: String,
    pub unclaimed: i64,
    pub claimed: i64,
}

#[derive(Clone)]
pub struct StatsRepo {
    pool: SqlitePool,
}

impl StatsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of active jobs, optionally restricted to one type.
    pub async fn get_length(&self, job_type: Option<&str>) -> Result<i64> {
        let count: i64 = match job_type {
            Some(jt) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM jobs WHERE completed IS NULL AND job_type = ?1",
                )
                .bind(jt)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE completed IS NULL")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    pub async fn get_types(&self) -> Result<Vec<String>> {
        let types: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT job_type FROM jobs ORDER BY job_type")
                .fetch_all(&self.pool)
                .await?;
        Ok(types)
    }

    /// Aggregates the three timestamps of every finished job in process
    /// rather than in SQL, to keep date arithmetic out of the store layer.
    pub async fn get_stats(&self) -> Result<Vec<TypeStats>> {
        type FinishedRow = (
            String,
            DateTime<Utc>,
            Option<DateTime<Utc>>,
            DateTime<Utc>,
        );

        let rows: Vec<FinishedRow> = sqlx::query_as(
            r#"
            SELECT job_type, created, fetched, completed
            FROM jobs
            WHERE completed IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        #[derive(Default)]
        struct Acc {
            finished: i64,
            turnaround_secs: f64,
            fetched_count: i64,
            runtime_secs: f64,
            fetch_delay_secs: f64,
        }

        let mut by_type: BTreeMap<String, Acc> = BTreeMap::new();
        for (job_type, created, fetched, completed) in rows {
            let acc = by_type.entry(job_type).or_default();
            acc.finished += 1;
            acc.turnaround_secs += secs_between(created, completed);
            if let Some(fetched) = fetched {
                acc.fetched_count += 1;
                acc.runtime_secs += secs_between(fetched, completed);
                acc.fetch_delay_secs += secs_between(created, fetched);
            }
        }

        let stats = by_type
            .into_iter()
            .map(|(job_type, acc)| TypeStats {
                job_type,
                finished: acc.finished,
                avg_turnaround_secs: acc.turnaround_secs / acc.finished as f64,
                avg_runtime_secs: if acc.fetched_count > 0 {
                    acc.runtime_secs / acc.fetched_count as f64
                } else {
                    0.0
                },
                avg_fetch_delay_secs: if acc.fetched_count > 0 {
                    acc.fetch_delay_secs / acc.fetched_count as f64
                } else {
                    0.0
                },
            })
            .collect();

        Ok(stats)
    }

    /// Active jobs per type, split into unclaimed and claimed.
    pub async fn get_pending_stats(&self) -> Result<Vec<PendingStats>> {
        let rows: Vec<PendingStats> = sqlx::query_as(
            r#"
            SELECT
                job_type,
                SUM(CASE WHEN fetched IS NULL THEN 1 ELSE 0 END) AS unclaimed,
                SUM(CASE WHEN fetched IS NOT NULL THEN 1 ELSE 0 END) AS claimed
            FROM jobs
            WHERE completed IS NULL
            GROUP BY job_type
            ORDER BY job_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn secs_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}
