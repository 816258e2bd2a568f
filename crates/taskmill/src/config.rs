/// Central runtime configuration, loaded from environment variables into a
/// typed struct. Capabilities are not configured here: each worker builds
/// its own list from the handlers it registers.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub task_group: Option<String>,
    pub poll_interval_ms: u64,
    pub poll_jitter_ms: u64,
    pub retention_days: i64,
    pub maintenance_interval_secs: u64,
    pub migrate_on_startup: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env_or_fallback("TASKMILL_DATABASE_URL", "DATABASE_URL")
            .unwrap_or_else(|| "sqlite://taskmill.db".to_string());

        let task_group = env_or_fallback("TASKMILL_TASK_GROUP", "TASK_GROUP");

        let poll_interval_ms = env_or_fallback("TASKMILL_POLL_INTERVAL_MS", "POLL_INTERVAL_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);

        let poll_jitter_ms = env_or_fallback("TASKMILL_POLL_JITTER_MS", "POLL_JITTER_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(250);

        let retention_days = env_or_fallback("TASKMILL_RETENTION_DAYS", "RETENTION_DAYS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(7);

        let maintenance_interval_secs =
            env_or_fallback("TASKMILL_MAINTENANCE_INTERVAL_SECS", "MAINTENANCE_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

        let migrate_on_startup = env_bool("TASKMILL_MIGRATE_ON_STARTUP").unwrap_or(true);

        Ok(Self {
            database_url,
            task_group,
            poll_interval_ms,
            poll_jitter_ms,
            retention_days,
            maintenance_interval_secs,
            migrate_on_startup,
        })
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
