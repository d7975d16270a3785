pub mod build;
pub mod manifest;
pub mod paths;
pub mod sync;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::github::CodeHost;
use crate::store::Store;

/// A unit of background work dispatched by the web tier.
#[derive(Debug, Clone)]
pub enum Job {
    Build { repository_id: String },
    Synchronize { username: String },
}

impl Job {
    fn describe(&self) -> String {
        match self {
            Self::Build { repository_id } => format!("build {repository_id}"),
            Self::Synchronize { username } => format!("synchronize {username}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "detail")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded(String),
    Failed(String),
}

/// Shared map of task handles to their last observed status, queryable from
/// the REST layer.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<HashMap<Uuid, TaskStatus>>>,
}

impl TaskRegistry {
    fn set(&self, id: Uuid, status: TaskStatus) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, status);
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<TaskStatus> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }
}

/// One lock per repository ID. A build holds its repository's lock across the
/// stage/publish steps so two concurrent builds of the same repository cannot
/// interleave remove-then-write on the same output directory.
#[derive(Clone, Default)]
pub struct RepoLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RepoLocks {
    #[must_use]
    pub fn for_repository(&self, id: &str) -> Arc<Mutex<()>> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(id.to_string())
            .or_default()
            .clone()
    }
}

pub struct WorkerContext {
    pub store: Arc<dyn Store>,
    pub host: Arc<dyn CodeHost>,
    pub config: ServerConfig,
    pub registry: TaskRegistry,
    pub locks: RepoLocks,
}

/// Handle for enqueuing background jobs. Enqueue is fire-and-forget: the
/// caller gets a task ID, not a completion result.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<(Uuid, Job)>,
    registry: TaskRegistry,
}

impl JobQueue {
    /// Spawns the dispatcher on the current runtime and returns the enqueue
    /// handle.
    pub fn start(ctx: WorkerContext) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = ctx.registry.clone();
        tokio::spawn(dispatch(Arc::new(ctx), rx));
        Self { tx, registry }
    }

    pub fn enqueue(&self, job: Job) -> Uuid {
        let id = Uuid::new_v4();
        self.registry.set(id, TaskStatus::Pending);
        if self.tx.send((id, job)).is_err() {
            error!("Job queue dispatcher is gone; task {} will not run", id);
            self.registry
                .set(id, TaskStatus::Failed("dispatcher unavailable".to_string()));
        }
        id
    }

    #[must_use]
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }
}

async fn dispatch(ctx: Arc<WorkerContext>, mut rx: mpsc::UnboundedReceiver<(Uuid, Job)>) {
    while let Some((id, job)) = rx.recv().await {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            ctx.registry.set(id, TaskStatus::Running);
            let worker_ctx = ctx.clone();
            let worker_job = job.clone();
            let outcome =
                tokio::task::spawn_blocking(move || run_job(&worker_ctx, &worker_job)).await;

            let status = match outcome {
                Ok(Ok(detail)) => {
                    info!("Task {} ({}) finished: {}", id, job.describe(), detail);
                    TaskStatus::Succeeded(detail)
                }
                Ok(Err(e)) => {
                    error!("Task {} ({}) failed: {}", id, job.describe(), e);
                    TaskStatus::Failed(e.to_string())
                }
                Err(e) => {
                    error!("Task {} ({}) panicked: {}", id, job.describe(), e);
                    TaskStatus::Failed("worker panicked".to_string())
                }
            };
            ctx.registry.set(id, status);
        });
    }
}

fn run_job(ctx: &WorkerContext, job: &Job) -> Result<String> {
    match job {
        Job::Build { repository_id } => {
            let repo = ctx
                .store
                .get_repository(repository_id)?
                .ok_or(Error::NotFound)?;

            let lock = ctx.locks.for_repository(&repo.id);
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

            let report = build::build(
                ctx.store.as_ref(),
                ctx.host.as_ref(),
                &ctx.config,
                &repo,
            )?;
            Ok(format!(
                "built {}, skipped {}, pruned {}",
                report.built.len(),
                report.skipped.len(),
                report.pruned
            ))
        }
        Job::Synchronize { username } => {
            let report = sync::synchronize(
                ctx.store.as_ref(),
                ctx.host.as_ref(),
                &ctx.config,
                username,
            )?;
            Ok(format!(
                "seen {}, created {}, removed {}",
                report.seen, report.created, report.removed
            ))
        }
    }
}
