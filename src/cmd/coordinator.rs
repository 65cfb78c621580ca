use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::coordinator::CoordinatorConfig;
use crate::utils;

#[derive(Parser, Debug)]
#[command(version, about = "Coordinate a MapReduce job", long_about = None)]
pub struct Args {
    /// Input files or glob patterns, one map task per file
    #[clap(value_parser)]
    pub files: Vec<String>,
    /// Number of reduce tasks
    #[clap(short = 'r', long, default_value_t = 10)]
    pub n_reduce: u32,
    /// Seconds before a running task is handed to another worker
    #[clap(short, long, default_value_t = 10)]
    pub timeout: u64,
    /// [OPT] Unix socket to listen on (default /var/tmp/minimr-<user>.sock)
    #[clap(short, long)]
    pub socket: Option<PathBuf>,
    /// How often to look for stalled tasks, in milliseconds
    #[clap(long, default_value_t = 500)]
    pub reclaim_interval_ms: u64,
    /// Seconds to keep answering workers after the job is done
    #[clap(long, default_value_t = 3)]
    pub grace: u64,
}

impl Args {
    pub fn config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            socket: self.socket.clone().unwrap_or_else(utils::coordinator_sock),
            n_reduce: self.n_reduce,
            stall_timeout: Duration::from_secs(self.timeout),
            reclaim_interval: Duration::from_millis(self.reclaim_interval_ms),
            exit_grace: Duration::from_secs(self.grace),
        }
    }
}
