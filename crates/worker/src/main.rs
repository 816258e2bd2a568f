use rand::Rng;
use std::time::Duration;
use taskmill::config::Config;
use taskmill::db;
use taskmill::jobs::{cutoff_days, Dispatcher, JobsRepo, MaintenanceRepo};

mod handlers;
use handlers::{build_registry, JobContext, JobError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env()?;

    println!(
        "taskmill worker starting... db={} group={} poll_interval_ms={} retention_days={} maintenance_interval_secs={}",
        cfg.database_url,
        cfg.task_group.clone().unwrap_or_else(|| "any".to_string()),
        cfg.poll_interval_ms,
        cfg.retention_days,
        cfg.maintenance_interval_secs
    );

    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let jobs_repo = JobsRepo::new(pool.clone());
    let maintenance_repo = MaintenanceRepo::new(pool.clone());

    let registry = build_registry();
    let capabilities = registry.capabilities();

    let mut dispatcher = Dispatcher::new(jobs_repo.clone());
    let worker_key = dispatcher.worker_key().to_string();

    let ctx = JobContext {
        jobs: jobs_repo.clone(),
        worker_key: worker_key.clone(),
    };

    // ---- Maintenance task ----
    let maintenance_handle = {
        let maintenance = maintenance_repo.clone();
        let retention_days = cfg.retention_days;
        let interval = Duration::from_secs(cfg.maintenance_interval_secs);
        tokio::spawn(async move {
            loop {
                match maintenance.clean_old_jobs(cutoff_days(retention_days)).await {
                    Ok(n) if n > 0 => println!("[maintenance] deleted {n} old completed jobs"),
                    Ok(_) => {}
                    Err(e) => eprintln!("[maintenance] clean error: {e}"),
                }

                match maintenance.remove_duplicate_pending().await {
                    Ok(n) if n > 0 => println!("[maintenance] deleted {n} duplicate pending jobs"),
                    Ok(_) => {}
                    Err(e) => eprintln!("[maintenance] dedupe error: {e}"),
                }

                tokio::time::sleep(interval).await;
            }
            #[allow(unreachable_code)]
            Ok::<(), anyhow::Error>(())
        })
    };

    // ---- Worker loop task ----
    let task_group = cfg.task_group.clone();
    let poll_interval_ms = cfg.poll_interval_ms;
    let poll_jitter_ms = cfg.poll_jitter_ms;

    let worker_handle = tokio::spawn(async move {
        loop {
            let claimed = dispatcher
                .request_job(&capabilities, task_group.as_deref())
                .await?;

            let Some(job) = claimed else {
                // Idle: back off with jitter so a fleet of workers does not
                // poll in lockstep.
                let jitter = {
                    let mut rng = rand::thread_rng();
                    rng.gen_range(0..=poll_jitter_ms)
                };
                tokio::time::sleep(Duration::from_millis(poll_interval_ms + jitter)).await;
                continue;
            };

            println!(
                "[{}] claimed job id={} type={} failed={}",
                worker_key, job.id, job.job_type, job.failed
            );

            let result: Result<(), JobError> = match registry.handler_for(&job.job_type) {
                Some(entry) => entry.run(&job, &ctx).await,
                None => Err(JobError::new(format!(
                    "no handler for job_type={}",
                    job.job_type
                ))),
            };

            match result {
                Ok(()) => {
                    jobs_repo.mark_done(job.id).await?;
                    println!("[{}] finished job id={}", worker_key, job.id);
                }
                Err(err) => {
                    jobs_repo.mark_failed(job.id, Some(&err.message)).await?;
                    println!(
                        "[{}] failed job id={} message={}",
                        worker_key, job.id, err.message
                    );
                }
            }
        }

        #[allow(unreachable_code)]
        Ok::<(), anyhow::Error>(())
    });

    tokio::select! {
        res = worker_handle => res??,
        res = maintenance_handle => res??,
    }

    Ok(())
}
