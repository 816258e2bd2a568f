use serde::Deserialize;
use std::{collections::HashMap, pin::Pin, sync::Arc, time::Duration};
use taskmill::jobs::{Capability, Job, JobsRepo};
use tokio::time::timeout;

pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
type HandlerFn = dyn for<'a> Fn(&'a Job, &'a JobContext) -> BoxFuture<'a, Result<(), JobError>>
    + Send
    + Sync;

#[derive(Debug)]
pub struct JobError {
    pub message: String,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct JobContext {
    pub jobs: JobsRepo,
    pub worker_key: String,
}

#[derive(Clone)]
pub struct HandlerEntry {
    pub handler: Arc<HandlerFn>,
    pub capability: Capability,
}

/// Maps a job type to its handler and the capability the worker advertises
/// for it. The capability list handed to the dispatcher is derived from the
/// registrations, so a worker can never claim a type it cannot run.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerEntry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, capability: Capability, handler: F)
    where
        F: for<'a> Fn(&'a Job, &'a JobContext) -> BoxFuture<'a, Result<(), JobError>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(
            capability.job_type.clone(),
            HandlerEntry {
                handler: Arc::new(handler),
                capability,
            },
        );
    }

    pub fn handler_for(&self, job_type: &str) -> Option<HandlerEntry> {
        self.handlers.get(job_type).cloned()
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.handlers
            .values()
            .map(|entry| entry.capability.clone())
            .collect()
    }
}

impl HandlerEntry {
    /// Run the handler under the capability's own timeout. Past that window
    /// the claim is reclaimable by other workers anyway, so a local result
    /// arriving later would be reporting on a job this worker no longer owns.
    pub async fn run(&self, job: &Job, ctx: &JobContext) -> Result<(), JobError> {
        let window = Duration::from_secs(self.capability.timeout_secs.max(0) as u64);
        let fut = (self.handler)(job, ctx);

        match timeout(window, fut).await {
            Ok(inner) => inner,
            Err(_) => Err(JobError::new(format!(
                "handler timeout after {}s",
                self.capability.timeout_secs
            ))),
        }
    }
}

#[derive(Deserialize)]
struct EmailSendPayload {
    user_id: i64,
    template: Option<String>,
}

fn parse_payload<T: for<'de> Deserialize<'de>>(job: &Job) -> Result<T, JobError> {
    serde_json::from_slice(&job.data).map_err(|e| JobError::new(e.to_string()))
}

fn boxed<'a, T>(fut: impl std::future::Future<Output = T> + Send + 'a) -> BoxFuture<'a, T> {
    Box::pin(fut)
}

pub fn build_registry() -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();

    // Demo handlers. Replace these with your real handlers.
    registry.register(Capability::new("demo_ok", 5, 2), |job, ctx| {
        boxed(async move {
            let _ = ctx.jobs.update_progress(job.id, 0.5).await;
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(())
        })
    });

    registry.register(Capability::new("fail_me", 5, 1), |_job, _ctx| {
        boxed(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Err(JobError::new("simulated failure"))
        })
    });

    // Example handler with payload validation and a dispatch rate cap.
    registry.register(
        Capability::new("email_send", 10, 3).with_rate(1),
        |job, _ctx| {
            boxed(async move {
                let payload: EmailSendPayload = parse_payload(job)?;
                let _ = payload.user_id;
                let _ = payload.template;
                Ok(())
            })
        },
    );

    Arc::new(registry)
}
