use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use minimr::cmd::worker::Args;
use minimr::worker::{self, WorkerConfig};
use minimr::{utils, workload};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = WorkerConfig {
        socket: args.socket.unwrap_or_else(utils::coordinator_sock),
        dir: args.dir,
        wait: Duration::from_millis(args.wait_ms),
        workload: workload::named(&args.workload)?,
        aux: args.args,
        name: format!("worker-{}", std::process::id()),
    };

    worker::run(config).await
}
