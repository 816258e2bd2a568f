use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration as StdDuration;

/// Fresh in-memory store per test. A single pooled connection owns the
/// database, so it must never be recycled for the test's lifetime.
pub async fn setup_db() -> SqlitePool {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:").expect("sqlite options");

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None::<StdDuration>)
        .max_lifetime(None::<StdDuration>)
        .connect_with(opts)
        .await
        .expect("failed to open in-memory sqlite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    pool
}

#[allow(dead_code)]
pub async fn insert_job(pool: &SqlitePool, job_type: &str) -> i64 {
    insert_job_with(pool, job_type, None, None).await
}

#[allow(dead_code)]
pub async fn insert_job_with(
    pool: &SqlitePool,
    job_type: &str,
    not_before_offset_secs: Option<i64>,
    task_group: Option<&str>,
) -> i64 {
    let not_before: Option<DateTime<Utc>> =
        not_before_offset_secs.map(|secs| Utc::now() + Duration::seconds(secs));

    sqlx::query_scalar(
        r#"
        INSERT INTO jobs (job_type, data, task_group, not_before, created, progress, failed)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, 0)
        RETURNING id
        "#,
    )
    .bind(job_type)
    .bind(b"{}".to_vec())
    .bind(task_group)
    .bind(not_before)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .expect("failed to insert job")
}

/// Pretend a claim happened `secs` ago, so timeout paths run without sleeps.
#[allow(dead_code)]
pub async fn backdate_fetched(pool: &SqlitePool, id: i64, secs: i64) {
    sqlx::query("UPDATE jobs SET fetched = ?1 WHERE id = ?2")
        .bind(Utc::now() - Duration::seconds(secs))
        .bind(id)
        .execute(pool)
        .await
        .expect("failed to backdate fetched");
}

#[allow(dead_code)]
pub async fn backdate_not_before(pool: &SqlitePool, id: i64, secs: i64) {
    sqlx::query("UPDATE jobs SET not_before = ?1 WHERE id = ?2")
        .bind(Utc::now() - Duration::seconds(secs))
        .bind(id)
        .execute(pool)
        .await
        .expect("failed to backdate not_before");
}

#[allow(dead_code)]
pub async fn fetch_job_row(
    pool: &SqlitePool,
    id: i64,
) -> (Option<DateTime<Utc>>, i64, Option<String>, Option<String>) {
    sqlx::query_as("SELECT fetched, failed, failure_message, worker_key FROM jobs WHERE id = ?1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("failed to read job row")
}
