//! The coordinator process: serves the [`Scheduler`] over a Unix socket and
//! runs the background loop that reclaims stalled tasks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tokio::net::UnixListener;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::rpc::proto::{Empty, Metadata, MetadataRequest, Progress, Task, TaskRequest};
use crate::rpc::{self, Coordinator, CoordinatorServer};
use crate::scheduler::{Assignment, Completion, Scheduler};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub socket: PathBuf,
    pub n_reduce: u32,
    /// A running task older than this is handed to another worker.
    pub stall_timeout: Duration,
    /// How often stalled tasks are looked for. Also bounds how quickly the
    /// coordinator notices the job is done.
    pub reclaim_interval: Duration,
    /// How long to keep answering `Exit` after the job is done, so that
    /// polling workers learn about it before the socket disappears.
    pub exit_grace: Duration,
}

/// gRPC front for a shared [`Scheduler`].
#[derive(Debug, Clone)]
pub struct CoordinatorService {
    scheduler: Arc<Mutex<Scheduler>>,
}

impl CoordinatorService {
    pub fn new(scheduler: Arc<Mutex<Scheduler>>) -> Self {
        Self { scheduler }
    }

    fn scheduler(&self) -> MutexGuard<'_, Scheduler> {
        lock(&self.scheduler)
    }
}

fn lock(scheduler: &Mutex<Scheduler>) -> MutexGuard<'_, Scheduler> {
    scheduler.lock().unwrap_or_else(|e| e.into_inner())
}

#[tonic::async_trait]
impl Coordinator for CoordinatorService {
    async fn get_metadata(
        &self,
        _request: Request<MetadataRequest>,
    ) -> Result<Response<Metadata>, Status> {
        let meta = self.scheduler().metadata();
        Ok(Response::new(meta.into()))
    }

    async fn get_task(&self, request: Request<TaskRequest>) -> Result<Response<Task>, Status> {
        let worker = request.into_inner().worker;
        let assignment = self.scheduler().get_task(Instant::now());

        if let Assignment::Run(spec) = &assignment {
            info!(
                "assigned {} task {} ({}) to {} [generation {}]",
                spec.kind, spec.id, spec.payload, worker, spec.generation
            );
        }
        Ok(Response::new(assignment.into()))
    }

    async fn complete_task(&self, request: Request<Task>) -> Result<Response<Empty>, Status> {
        let task = request.into_inner();
        let kind = rpc::runnable_kind(task.kind)?;

        let outcome = self
            .scheduler()
            .complete_task(kind, task.task_id)
            .map_err(|e| Status::invalid_argument(format!("{e:#}")))?;

        if outcome == Completion::Ignored {
            debug!(
                "late report for {} task {} [generation {}]",
                kind, task.task_id, task.generation
            );
        }
        Ok(Response::new(Empty {}))
    }

    async fn get_progress(&self, _request: Request<Empty>) -> Result<Response<Progress>, Status> {
        let progress = self.scheduler().progress();
        Ok(Response::new(progress.into()))
    }
}

/// Ticks every `interval`, reclaiming stalled tasks, and returns once the
/// job is done.
pub async fn watch(scheduler: Arc<Mutex<Scheduler>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let done = {
            let mut scheduler = lock(&scheduler);
            scheduler.reclaim_stalled(Instant::now());
            scheduler.is_job_done()
        };
        if done {
            return;
        }
    }
}

/// Runs a whole job: one map task per entry of `files` and
/// `config.n_reduce` reduce tasks. Returns once every task is done and the
/// exit grace period has passed.
pub async fn run(files: Vec<String>, config: &CoordinatorConfig) -> Result<()> {
    if config.n_reduce == 0 {
        bail!("the number of reduce tasks must be at least 1");
    }

    let n_map = files.len();
    let scheduler = Arc::new(Mutex::new(Scheduler::new(
        files,
        config.n_reduce,
        config.stall_timeout,
    )));

    let listener = bind(&config.socket)?;
    info!(
        "coordinator listening on {} ({} map, {} reduce, stall timeout {:?})",
        config.socket.display(),
        n_map,
        config.n_reduce,
        config.stall_timeout
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::builder()
            .add_service(CoordinatorServer::new(CoordinatorService::new(Arc::clone(
                &scheduler,
            ))))
            .serve_with_incoming_shutdown(UnixListenerStream::new(listener), async move {
                let _ = stop_rx.await;
            }),
    );

    let finished = tokio::select! {
        _ = watch(Arc::clone(&scheduler), config.reclaim_interval) => true,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            false
        }
    };

    if finished {
        info!("job done, exiting in {:?}", config.exit_grace);
        tokio::time::sleep(config.exit_grace).await;
    } else {
        warn!("interrupted, shutting down before the job is done");
    }

    let _ = stop_tx.send(());
    let served = server.await;
    remove_socket(&config.socket);
    served.context("coordinator server task failed")??;

    if !finished {
        bail!("coordinator interrupted");
    }
    Ok(())
}

/// Binds `socket`, replacing a stale socket file left by an earlier run.
fn bind(socket: &Path) -> Result<UnixListener> {
    match fs::remove_file(socket) {
        Ok(()) => debug!("removed stale socket {}", socket.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("failed to remove {}", socket.display()));
        }
    }
    UnixListener::bind(socket).with_context(|| format!("failed to bind {}", socket.display()))
}

fn remove_socket(socket: &Path) {
    if let Err(e) = fs::remove_file(socket) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("failed to remove socket {}: {}", socket.display(), e);
        }
    }
}
