//! Wire types and transport for the coordinator service.
//!
//! Messages are generated from `proto/mapreduce.proto`. The service is served
//! over a Unix-domain socket, so the client side needs a custom connector:
//! the endpoint URI is a placeholder and never resolved.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tonic::Status;
use tower::service_fn;

use crate::scheduler::{self, Assignment, Metadata, Progress};

pub mod proto {
    tonic::include_proto!("mapreduce");
}

pub use proto::coordinator_client::CoordinatorClient;
pub use proto::coordinator_server::{Coordinator, CoordinatorServer};

/// Opens a channel to the coordinator listening on `socket`.
pub async fn connect(socket: impl AsRef<Path>) -> Result<CoordinatorClient<Channel>> {
    let path: PathBuf = socket.as_ref().to_path_buf();
    let display = path.display().to_string();

    let channel = Endpoint::try_from("http://[::]:50051")?
        .connect_with_connector(service_fn(move |_: Uri| UnixStream::connect(path.clone())))
        .await
        .with_context(|| format!("failed to connect to coordinator at {display}"))?;

    Ok(CoordinatorClient::new(channel))
}

impl From<Assignment> for proto::Task {
    fn from(assignment: Assignment) -> Self {
        match assignment {
            Assignment::Run(spec) => proto::Task {
                kind: proto::TaskKind::from(spec.kind) as i32,
                task_id: spec.id,
                payload: spec.payload,
                generation: spec.generation,
            },
            Assignment::Wait => proto::Task {
                kind: proto::TaskKind::Wait as i32,
                ..Default::default()
            },
            Assignment::Exit => proto::Task {
                kind: proto::TaskKind::Exit as i32,
                ..Default::default()
            },
        }
    }
}

impl From<scheduler::TaskKind> for proto::TaskKind {
    fn from(kind: scheduler::TaskKind) -> Self {
        match kind {
            scheduler::TaskKind::Map => proto::TaskKind::Map,
            scheduler::TaskKind::Reduce => proto::TaskKind::Reduce,
        }
    }
}

/// The runnable task kind carried in a completion report.
///
/// Anything but map or reduce (including values this build doesn't know)
/// is rejected as `INVALID_ARGUMENT`.
pub fn runnable_kind(kind: i32) -> Result<scheduler::TaskKind, Status> {
    match proto::TaskKind::try_from(kind) {
        Ok(proto::TaskKind::Map) => Ok(scheduler::TaskKind::Map),
        Ok(proto::TaskKind::Reduce) => Ok(scheduler::TaskKind::Reduce),
        Ok(other) => Err(Status::invalid_argument(format!(
            "task kind {} cannot be completed",
            other.as_str_name()
        ))),
        Err(_) => Err(Status::invalid_argument(format!("unknown task kind {kind}"))),
    }
}

impl From<Metadata> for proto::Metadata {
    fn from(meta: Metadata) -> Self {
        proto::Metadata {
            map_count: meta.n_map,
            reduce_count: meta.n_reduce,
        }
    }
}

impl From<Progress> for proto::Progress {
    fn from(p: Progress) -> Self {
        proto::Progress {
            map_total: p.map_total,
            map_done: p.map_done,
            map_running: p.map_running,
            reduce_total: p.reduce_total,
            reduce_done: p.reduce_done,
            reduce_running: p.reduce_running,
            done: p.is_done(),
        }
    }
}
