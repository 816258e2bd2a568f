use std::env;

use taskmill::db;
use taskmill::jobs::{cutoff_days, JobsRepo, MaintenanceRepo, StatsRepo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "taskmillctl <command>\n\
             Commands:\n\
             - enqueue <job_type> [payload-json] [delay-secs]\n\
             - seed <n>\n\
             - show <id>\n\
             - progress <reference>\n\
             - length [job_type]\n\
             - types\n\
             - stats\n\
             - pending\n\
             - reset\n\
             - clean <days>\n\
             - dedupe\n\
             \n\
             Uses TASKMILL_DATABASE_URL or DATABASE_URL (default sqlite://taskmill.db).\n"
        );
        std::process::exit(2);
    }

    dotenvy::dotenv().ok();
    let url = env::var("TASKMILL_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .unwrap_or_else(|_| "sqlite://taskmill.db".to_string());

    let pool = db::make_pool(&url).await?;
    db::run_migrations(&pool).await?;

    let jobs = JobsRepo::new(pool.clone());
    let stats = StatsRepo::new(pool.clone());
    let maintenance = MaintenanceRepo::new(pool.clone());

    match args[1].as_str() {
        "enqueue" => {
            let job_type = args.get(2).expect("usage: taskmillctl enqueue <job_type>");
            let payload = args.get(3).cloned().unwrap_or_else(|| "{}".to_string());
            let delay: Option<i64> = args.get(4).and_then(|s| s.parse().ok());

            // Validate the payload is JSON before it goes in as bytes.
            let value: serde_json::Value = serde_json::from_str(&payload)?;
            let data = serde_json::to_vec(&value)?;

            let job = match delay {
                Some(secs) => jobs.enqueue_in(job_type, data, secs).await?,
                None => jobs.enqueue_now(job_type, data).await?,
            };
            println!("+ enqueued {} id={}", job.job_type, job.id);
        }
        "seed" => {
            let n: i64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
            for i in 0..n {
                let job_type = if i % 2 == 0 { "demo_ok" } else { "fail_me" };
                let job = jobs.enqueue_now(job_type, b"{}".to_vec()).await?;
                println!("+ inserted job {} id={}", job_type, job.id);
            }
        }
        "show" => {
            let id: i64 = args
                .get(2)
                .and_then(|s| s.parse().ok())
                .expect("usage: taskmillctl show <id>");
            let job = jobs.require_job(id).await?;
            println!(
                "JOB: id={} type={} group={:?} reference={:?} created={} not_before={:?} \
                 fetched={:?} completed={:?} progress={} failed={} failure_message={:?} worker_key={:?}",
                job.id,
                job.job_type,
                job.task_group,
                job.reference,
                job.created,
                job.not_before,
                job.fetched,
                job.completed,
                job.progress,
                job.failed,
                job.failure_message,
                job.worker_key
            );
        }
        "progress" => {
            let reference = args
                .get(2)
                .expect("usage: taskmillctl progress <reference>");
            let rows = jobs.progress_by_reference(reference).await?;
            if rows.is_empty() {
                println!("no jobs with reference {reference}");
            }
            for row in rows {
                println!(
                    "{} | id={} progress={:.2} status={} failure={:?}",
                    reference,
                    row.id,
                    row.progress,
                    row.status(),
                    row.failure_message
                );
            }
        }
        "length" => {
            let job_type = args.get(2).map(|s| s.as_str());
            let length = stats.get_length(job_type).await?;
            println!("active jobs: {length}");
        }
        "types" => {
            for job_type in stats.get_types().await? {
                println!("{job_type}");
            }
        }
        "stats" => {
            for s in stats.get_stats().await? {
                println!(
                    "{}: finished={} avg_turnaround={:.1}s avg_runtime={:.1}s avg_fetch_delay={:.1}s",
                    s.job_type,
                    s.finished,
                    s.avg_turnaround_secs,
                    s.avg_runtime_secs,
                    s.avg_fetch_delay_secs
                );
            }
        }
        "pending" => {
            for p in stats.get_pending_stats().await? {
                println!(
                    "{}: unclaimed={} claimed={}",
                    p.job_type, p.unclaimed, p.claimed
                );
            }
        }
        "reset" => {
            let n = maintenance.reset().await?;
            println!("reset {n} active jobs");
        }
        "clean" => {
            let days: i64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(7);
            let n = maintenance.clean_old_jobs(cutoff_days(days)).await?;
            println!("deleted {n} completed jobs older than {days} days");
        }
        "dedupe" => {
            let n = maintenance.remove_duplicate_pending().await?;
            println!("deleted {n} duplicate pending jobs");
        }
        other => {
            eprintln!("Unknown command: {other}");
            std::process::exit(2);
        }
    }

    Ok(())
}
