pub mod dispatch;
pub mod error;
pub mod identity;
pub mod model;
pub mod rate_limit;
pub mod repo;

pub mod maintenance;
pub use maintenance::{cutoff_days, cutoff_seconds, MaintenanceRepo};

pub mod stats;
pub use stats::{PendingStats, StatsRepo, TypeStats};

pub use dispatch::Dispatcher;
pub use error::QueueError;
pub use identity::WorkerIdentity;
pub use model::{Capability, Job, JobProgress, NewJob};
pub use rate_limit::RateLimiter;
pub use repo::JobsRepo;
